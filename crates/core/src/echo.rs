// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Suppression of change notifications caused by our own mutations.
//!
//! When the engine writes into the host editor the editor reports the
//! change back like any other edit, possibly later. Each mutation is
//! registered here first; the matching notification is swallowed instead
//! of being recorded as a new local edit.
//!
//! Entries expire after a number of event-loop batches (see
//! [`EchoSuppressor::advance`]) so notifications that never arrive cannot
//! pile up.

use std::ops::Range;

use crate::host::ChangeEvent;
use crate::protocol::DocId;

/// A mutation the engine applied to the host document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoEntry {
    pub doc_id: DocId,
    /// Affected character range, in document coordinates at mutation time.
    pub range: Range<usize>,
    /// Batch number after which the entry is dropped.
    pub expires_at: u64,
}

impl EchoEntry {
    fn covers(&self, doc_id: &str, event: &ChangeEvent) -> bool {
        self.doc_id == doc_id
            && self.range.start <= event.offset
            && event.offset + event.length <= self.range.end
    }
}

/// Short-lived registry of engine-applied mutations.
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    entries: Vec<EchoEntry>,
    batch: u64,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        EchoSuppressor::default()
    }

    /// Remembers a mutation for the next `ttl` batches.
    pub fn register(&mut self, doc_id: &str, range: Range<usize>, ttl: u32) {
        self.entries.push(EchoEntry {
            doc_id: doc_id.to_string(),
            range,
            expires_at: self.batch + u64::from(ttl),
        });
    }

    /// Returns true if `event` was caused by a registered mutation.
    ///
    /// The matching entry is consumed.
    pub fn should_ignore(&mut self, doc_id: &str, event: &ChangeEvent) -> bool {
        match self.entries.iter().position(|e| e.covers(doc_id, event)) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Marks the end of an event-loop batch and drops expired entries.
    pub fn advance(&mut self) {
        self.batch += 1;
        let batch = self.batch;
        self.entries.retain(|e| e.expires_at >= batch);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "echo_tests.rs"]
mod tests;
