// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-document synchronization state.

use crate::protocol::Selection;
use crate::run::Run;

/// What one client knows about a shared document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSession {
    /// Revision last reported by the relay.
    pub revision: u64,
    /// Text the far end is believed to have.
    pub remote_text: String,
    /// Text the host editor currently shows.
    pub local_text: String,
}

impl SyncSession {
    /// Creates a session from a full snapshot.
    pub fn new(contents: impl Into<String>, revision: u64) -> Self {
        let mut session = SyncSession::default();
        session.reset(contents, revision);
        session
    }

    /// Replaces both text snapshots and the revision.
    pub fn reset(&mut self, contents: impl Into<String>, revision: u64) {
        let contents = contents.into();
        self.remote_text = contents.clone();
        self.local_text = contents;
        self.revision = revision;
    }

    /// Returns true when both sides are believed to hold the same text.
    pub fn is_converged(&self) -> bool {
        self.remote_text == self.local_text
    }
}

/// An edit handed to the transport and not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Transport sequence number the edit went out with.
    pub seq: u64,
    /// The runs that were sent.
    pub op: Vec<Run>,
    /// Local selection at send time.
    pub selection: Selection,
}

/// Position of a document in the send/receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    /// Nothing pending in either direction.
    Idle,
    /// Local edits recorded, nothing in flight.
    LocalPending,
    /// An edit awaits acknowledgment.
    InFlight,
    /// Waiting for a full snapshot (first join or divergence repair).
    Resyncing,
}
