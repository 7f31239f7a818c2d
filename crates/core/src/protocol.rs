// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-relay communication.
//!
//! Every message travels inside a [`Frame`]. Clients number their frames
//! with `seq`; the relay reports the highest `seq` it has processed in
//! `ack`. Message bodies are `{"type": ..., "data": {...}}` objects.
//!
//! - Client joins documents, sends edits and cursor moves
//! - Relay answers joins with snapshots, broadcasts accepted edits and
//!   orders a resync when an edit cannot be applied

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::run::Run;

/// Identifies a collaboration document (a workspace-relative path).
pub type DocId = String;

/// A selection as `[startLine, startCol, endLine, endCol, isReversed]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectionTuple", into = "SelectionTuple")]
pub struct Selection {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub reversed: bool,
}

type SelectionTuple = (u32, u32, u32, u32, bool);

impl Selection {
    /// A collapsed selection (plain cursor).
    pub fn cursor(line: u32, col: u32) -> Self {
        Selection {
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
            reversed: false,
        }
    }
}

impl From<SelectionTuple> for Selection {
    fn from((start_line, start_col, end_line, end_col, reversed): SelectionTuple) -> Self {
        Selection {
            start_line,
            start_col,
            end_line,
            end_col,
            reversed,
        }
    }
}

impl From<Selection> for SelectionTuple {
    fn from(s: Selection) -> Self {
        (s.start_line, s.start_col, s.end_line, s.end_col, s.reversed)
    }
}

/// An edit to one document, described against the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditUpdate {
    pub doc_id: DocId,
    pub op: Vec<Run>,
    pub rev_num: u64,
    pub selection: Selection,
}

/// An edit relayed from another (or the same) client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEdit {
    #[serde(flatten)]
    pub edit: EditUpdate,
    /// Client that produced the edit.
    pub origin_id: String,
}

/// Messages sent from client to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Request the full text and revision of a document.
    ///
    /// Sent on first open and again to resync after divergence.
    JoinDoc { doc_id: DocId },

    /// Stop receiving updates for a document.
    LeaveDoc { doc_id: DocId },

    /// A batch of local edits.
    EditUpdate(EditUpdate),

    /// The local selection moved.
    CursorUpdate { doc_id: DocId, selection: Selection },
}

/// Messages sent from relay to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// First message on every connection.
    Connect { client_id: String },

    /// Snapshot answering a `JOIN_DOC` request.
    JoinDoc {
        doc_id: DocId,
        contents: String,
        rev_num: u64,
    },

    /// An accepted edit, broadcast to every client that joined the document.
    EditUpdate(RemoteEdit),

    /// Another client's selection moved.
    CursorUpdate {
        doc_id: DocId,
        client_id: String,
        selection: Selection,
    },

    /// The relay could not apply an edit; the client must rejoin.
    SyncCommit { doc_id: DocId },

    /// Error message.
    Error { message: String },
}

impl ClientMessage {
    /// Creates a JoinDoc message.
    pub fn join_doc(doc_id: impl Into<DocId>) -> Self {
        ClientMessage::JoinDoc {
            doc_id: doc_id.into(),
        }
    }

    /// Creates a LeaveDoc message.
    pub fn leave_doc(doc_id: impl Into<DocId>) -> Self {
        ClientMessage::LeaveDoc {
            doc_id: doc_id.into(),
        }
    }

    /// The document this message refers to.
    pub fn doc_id(&self) -> &str {
        match self {
            ClientMessage::JoinDoc { doc_id }
            | ClientMessage::LeaveDoc { doc_id }
            | ClientMessage::CursorUpdate { doc_id, .. } => doc_id,
            ClientMessage::EditUpdate(edit) => &edit.doc_id,
        }
    }
}

impl ServerMessage {
    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// The document this message refers to, if any.
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            ServerMessage::JoinDoc { doc_id, .. }
            | ServerMessage::CursorUpdate { doc_id, .. }
            | ServerMessage::SyncCommit { doc_id } => Some(doc_id),
            ServerMessage::EditUpdate(remote) => Some(&remote.edit.doc_id),
            ServerMessage::Connect { .. } | ServerMessage::Error { .. } => None,
        }
    }
}

/// Transport envelope carrying sequence and acknowledgment numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<T>,
}

impl<T> Frame<T> {
    /// A numbered frame carrying `body`.
    pub fn numbered(seq: u64, body: T) -> Self {
        Frame {
            seq: Some(seq),
            ack: None,
            d: Some(body),
        }
    }

    /// A frame carrying `body` without a sequence number.
    pub fn body(body: T) -> Self {
        Frame {
            seq: None,
            ack: None,
            d: Some(body),
        }
    }

    /// A bare acknowledgment.
    pub fn ack(ack: u64) -> Self {
        Frame {
            seq: None,
            ack: Some(ack),
            d: None,
        }
    }

    /// Sets the acknowledgment number.
    pub fn with_ack(mut self, ack: Option<u64>) -> Self {
        self.ack = ack;
        self
    }
}

impl<T: Serialize> Frame<T> {
    /// Serializes the frame to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T: DeserializeOwned> Frame<T> {
    /// Deserializes the frame from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
