// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The host text editor seam.
//!
//! The engine never owns document buffers. It reads and mutates them through
//! [`HostEditor`], and learns about user edits from [`ChangeEvent`]s the
//! host reports. [`MemoryHost`] keeps buffers in memory and queues a change
//! notification for every mutation, the way a real editor reports edits
//! after the fact.

use std::collections::HashMap;
use std::ops::Range;

use ropey::Rope;
use tracing::debug;

use crate::protocol::{DocId, Selection};

/// A change notification from the host editor.
///
/// `length` characters starting at `offset` were replaced by `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub offset: usize,
    pub length: usize,
    pub text: String,
}

impl ChangeEvent {
    /// A pure insertion.
    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        ChangeEvent {
            offset,
            length: 0,
            text: text.into(),
        }
    }

    /// A pure deletion.
    pub fn delete(offset: usize, length: usize) -> Self {
        ChangeEvent {
            offset,
            length,
            text: String::new(),
        }
    }
}

/// Operations the engine needs from the editor hosting the documents.
///
/// All offsets are in characters.
pub trait HostEditor {
    /// Current text of a document, or `None` if it is not open.
    fn text(&self, doc_id: &str) -> Option<String>;

    /// Replaces `range` of a document with `text`.
    fn replace(&mut self, doc_id: &str, range: Range<usize>, text: &str);

    /// The local selection in a document.
    fn selection(&self, doc_id: &str) -> Selection;

    /// Shows another collaborator's selection. Advisory only.
    fn show_peer_selection(&mut self, doc_id: &str, client_id: &str, selection: Selection);

    /// Drains the change notifications queued since the last call.
    ///
    /// Every mutation produces one, whether it came from the user or from
    /// [`HostEditor::replace`].
    fn take_notifications(&mut self) -> Vec<(DocId, ChangeEvent)>;
}

/// In-memory host editor.
///
/// Buffers are ropes, indexed by character like the engine's offsets.
#[derive(Debug, Default)]
pub struct MemoryHost {
    docs: HashMap<DocId, Rope>,
    selections: HashMap<DocId, Selection>,
    peers: HashMap<(DocId, String), Selection>,
    notifications: Vec<(DocId, ChangeEvent)>,
}

impl MemoryHost {
    pub fn new() -> Self {
        MemoryHost::default()
    }

    /// Opens a document with the given text, without a notification.
    pub fn open(&mut self, doc_id: &str, contents: &str) {
        self.docs.insert(doc_id.to_string(), Rope::from_str(contents));
    }

    /// Closes a document.
    pub fn close(&mut self, doc_id: &str) {
        self.docs.remove(doc_id);
        self.selections.remove(doc_id);
        self.peers.retain(|(doc, _), _| doc != doc_id);
    }

    /// Applies a user edit and returns its notification.
    ///
    /// The notification is also queued, like any other mutation.
    pub fn edit(&mut self, doc_id: &str, offset: usize, length: usize, text: &str) -> ChangeEvent {
        self.replace(doc_id, offset..offset + length, text);
        ChangeEvent {
            offset,
            length,
            text: text.to_string(),
        }
    }

    /// Sets the local selection of a document.
    pub fn set_selection(&mut self, doc_id: &str, selection: Selection) {
        self.selections.insert(doc_id.to_string(), selection);
    }

    /// Last selection shown for a collaborator.
    pub fn peer_selection(&self, doc_id: &str, client_id: &str) -> Option<Selection> {
        self.peers
            .get(&(doc_id.to_string(), client_id.to_string()))
            .copied()
    }

    /// Ids of the open documents.
    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }
}

impl HostEditor for MemoryHost {
    fn text(&self, doc_id: &str) -> Option<String> {
        self.docs.get(doc_id).map(Rope::to_string)
    }

    fn replace(&mut self, doc_id: &str, range: Range<usize>, with: &str) {
        let Some(doc) = self.docs.get_mut(doc_id) else {
            debug!("replace on closed document {}", doc_id);
            return;
        };
        let len = doc.len_chars();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        doc.remove(start..end);
        doc.insert(start, with);
        self.notifications.push((
            doc_id.to_string(),
            ChangeEvent {
                offset: start,
                length: end - start,
                text: with.to_string(),
            },
        ));
    }

    fn selection(&self, doc_id: &str) -> Selection {
        self.selections.get(doc_id).copied().unwrap_or_default()
    }

    fn show_peer_selection(&mut self, doc_id: &str, client_id: &str, selection: Selection) {
        self.peers
            .insert((doc_id.to_string(), client_id.to_string()), selection);
    }

    fn take_notifications(&mut self) -> Vec<(DocId, ChangeEvent)> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
