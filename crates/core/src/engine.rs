// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The edit-synchronization engine.
//!
//! One [`SyncEngine`] lives for one connection. It owns a session per
//! joined document and moves each through the send/receive cycle:
//!
//! ```text
//! Idle ──local edit──► LocalPending ──flush──► InFlight ──ack──► Idle
//!   ▲                                                           │
//!   └──────── snapshot ◄── Resyncing ◄── delete mismatch ◄──────┘ (any state)
//! ```
//!
//! Outgoing edits are gated by acknowledgments: at most one edit per
//! document is in flight, and local changes made meanwhile are merged into
//! the next one. Incoming edits are checked against the text this client
//! last agreed on with the relay; any disagreement throws the document away
//! and rejoins it from a full snapshot.
//!
//! Handlers run on a single event loop. The host editor is borrowed per
//! call so the engine can be dropped on disconnect while documents stay
//! open.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::delta::DeltaList;
use crate::echo::EchoSuppressor;
use crate::error::{Error, Result};
use crate::host::{ChangeEvent, HostEditor};
use crate::outbox::{FrameQueue, Outbox};
use crate::protocol::{
    ClientMessage, DocId, EditUpdate, Frame, RemoteEdit, Selection, ServerMessage,
};
use crate::run::Run;
use crate::session::{DocState, PendingSend, SyncSession};
use crate::text;

/// When recorded local edits are handed to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Send as soon as nothing is in flight.
    #[default]
    Immediate,
    /// Send at the end of each event-loop batch, coalescing bursts.
    EndOfBatch,
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Batches an echo entry survives.
    pub echo_ttl: u32,
    pub flush: FlushPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            echo_ttl: 4,
            flush: FlushPolicy::Immediate,
        }
    }
}

/// Observable outcome of an engine handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The relay assigned our client id.
    Connected { client_id: String },
    /// A snapshot replaced the document; it is in sync again.
    Synced { doc_id: DocId, rev_num: u64 },
    /// A remote edit was applied.
    Applied { doc_id: DocId, rev_num: u64 },
    /// Our own edit came back from the relay and was discarded.
    Reflected { doc_id: DocId },
    /// A change notification was caused by the engine itself.
    Suppressed { doc_id: DocId },
    /// The document diverged and a snapshot was requested.
    Resyncing { doc_id: DocId },
    /// A local edit was recorded but not sent yet.
    Recorded { doc_id: DocId },
    /// Pending edits were sent.
    Sent { doc_id: DocId, seq: u64 },
    /// The relay acknowledged frames up to `seq`.
    Acked { seq: u64 },
    /// Another collaborator's selection moved.
    PeerCursor { doc_id: DocId, client_id: String },
    /// The relay reported an error.
    ServerError { message: String },
    /// Nothing to do.
    Ignored,
}

/// Everything the engine tracks for one document.
#[derive(Debug, Default)]
struct DocSlot {
    session: SyncSession,
    delta: DeltaList,
    pending: Option<PendingSend>,
    resyncing: bool,
}

impl DocSlot {
    fn state(&self) -> DocState {
        if self.resyncing {
            DocState::Resyncing
        } else if self.pending.is_some() {
            DocState::InFlight
        } else if !self.delta.is_empty() {
            DocState::LocalPending
        } else {
            DocState::Idle
        }
    }
}

/// One document mutation planned from a remote edit.
#[derive(Debug, PartialEq, Eq)]
struct Mutation {
    range: Range<usize>,
    text: String,
}

/// Per-connection synchronization engine.
pub struct SyncEngine<O: Outbox = FrameQueue> {
    config: EngineConfig,
    client_id: Option<String>,
    docs: HashMap<DocId, DocSlot>,
    echo: EchoSuppressor,
    outbox: O,
}

impl SyncEngine<FrameQueue> {
    /// Creates an engine buffering frames in a [`FrameQueue`].
    pub fn new(config: EngineConfig) -> Self {
        Self::with_outbox(config, FrameQueue::new())
    }
}

impl<O: Outbox> SyncEngine<O> {
    /// Creates an engine sending through a custom outbox.
    pub fn with_outbox(config: EngineConfig, outbox: O) -> Self {
        SyncEngine {
            config,
            client_id: None,
            docs: HashMap::new(),
            echo: EchoSuppressor::new(),
            outbox,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Our client id, once the relay has assigned one.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut O {
        &mut self.outbox
    }

    /// Session of a joined document.
    pub fn session(&self, doc_id: &str) -> Option<&SyncSession> {
        self.docs.get(doc_id).map(|slot| &slot.session)
    }

    /// Unsent local edits of a document.
    pub fn delta(&self, doc_id: &str) -> Option<&DeltaList> {
        self.docs.get(doc_id).map(|slot| &slot.delta)
    }

    /// The unacknowledged edit of a document.
    pub fn pending(&self, doc_id: &str) -> Option<&PendingSend> {
        self.docs.get(doc_id).and_then(|slot| slot.pending.as_ref())
    }

    pub fn state(&self, doc_id: &str) -> Option<DocState> {
        self.docs.get(doc_id).map(DocSlot::state)
    }

    /// Ids of the joined documents.
    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.docs.keys().map(String::as_str)
    }

    /// Number of live echo entries.
    pub fn echo_entries(&self) -> usize {
        self.echo.len()
    }

    /// Starts collaborating on a document.
    ///
    /// Local changes are ignored until the snapshot arrives.
    pub fn join(&mut self, doc_id: &str) {
        let slot = self.docs.entry(doc_id.to_string()).or_default();
        slot.resyncing = true;
        slot.delta.clear();
        self.outbox.send(ClientMessage::join_doc(doc_id));
        debug!("joining {}", doc_id);
    }

    /// Stops collaborating on a document.
    pub fn leave(&mut self, doc_id: &str) {
        if self.docs.remove(doc_id).is_some() {
            self.outbox.send(ClientMessage::leave_doc(doc_id));
            debug!("left {}", doc_id);
        }
    }

    /// Handles a change notification from the host editor.
    pub fn on_change(
        &mut self,
        host: &mut impl HostEditor,
        doc_id: &str,
        change: &ChangeEvent,
    ) -> EngineEvent {
        if self.echo.should_ignore(doc_id, change) {
            debug!("suppressed echo in {} at {}", doc_id, change.offset);
            return EngineEvent::Suppressed {
                doc_id: doc_id.to_string(),
            };
        }

        let Some(slot) = self.docs.get(doc_id) else {
            return EngineEvent::Ignored;
        };
        if slot.resyncing {
            debug!("dropping local change to {} while resyncing", doc_id);
            return EngineEvent::Ignored;
        }

        let end = change.offset + change.length;
        let deleted = text::slice(&slot.session.local_text, change.offset..end).to_string();
        if text::char_len(&deleted) != change.length {
            warn!(
                "change at {}..{} is outside the known text of {}; resyncing",
                change.offset, end, doc_id
            );
            return self.resync(doc_id);
        }

        self.on_local_change(host, doc_id, change.offset, &deleted, &change.text)
    }

    /// Records a local edit and sends it if nothing is in flight.
    ///
    /// `retain` is the offset of the edit in the local text, `delete` the
    /// text removed there and `insert` the text put in its place.
    pub fn on_local_change(
        &mut self,
        host: &mut impl HostEditor,
        doc_id: &str,
        retain: usize,
        delete: &str,
        insert: &str,
    ) -> EngineEvent {
        let Some(slot) = self.docs.get_mut(doc_id) else {
            return EngineEvent::Ignored;
        };
        if slot.resyncing {
            return EngineEvent::Ignored;
        }

        slot.delta.record(retain, delete, insert);
        let removed = retain..retain + text::char_len(delete);
        text::splice(&mut slot.session.local_text, removed, insert);

        if slot.pending.is_none() && self.config.flush == FlushPolicy::Immediate {
            return self.flush(host, doc_id);
        }
        EngineEvent::Recorded {
            doc_id: doc_id.to_string(),
        }
    }

    /// Sends the recorded edits of a document.
    ///
    /// Does nothing while an edit is in flight or nothing changed.
    pub fn flush(&mut self, host: &mut impl HostEditor, doc_id: &str) -> EngineEvent {
        let Some(slot) = self.docs.get_mut(doc_id) else {
            return EngineEvent::Ignored;
        };
        if slot.resyncing || slot.pending.is_some() {
            return EngineEvent::Ignored;
        }
        if slot.delta.is_empty() {
            slot.delta.clear();
            return EngineEvent::Ignored;
        }

        let op = slot.delta.finalize(text::char_len(&slot.session.remote_text));
        slot.session.revision += 1;
        let selection = host.selection(doc_id);
        let seq = self.outbox.send(ClientMessage::EditUpdate(EditUpdate {
            doc_id: doc_id.to_string(),
            op: op.clone(),
            rev_num: slot.session.revision,
            selection,
        }));
        debug!("sent {} runs for {} as seq {}", op.len(), doc_id, seq);

        slot.pending = Some(PendingSend { seq, op, selection });
        slot.delta.clear();
        slot.session.remote_text = slot.session.local_text.clone();

        EngineEvent::Sent {
            doc_id: doc_id.to_string(),
            seq,
        }
    }

    /// Handles a transport acknowledgment.
    ///
    /// Every document whose in-flight edit is covered by `seq` is released
    /// and flushed again. Repeating an ack has no further effect.
    pub fn on_ack(&mut self, host: &mut impl HostEditor, seq: u64) -> EngineEvent {
        let mut released = Vec::new();
        for (doc_id, slot) in &mut self.docs {
            if slot.pending.as_ref().is_some_and(|p| seq >= p.seq) {
                slot.pending = None;
                released.push(doc_id.clone());
            }
        }
        for doc_id in released {
            self.flush(host, &doc_id);
        }
        EngineEvent::Acked { seq }
    }

    /// Handles one frame from the relay: the ack first, then the body.
    pub fn on_frame(
        &mut self,
        host: &mut impl HostEditor,
        frame: Frame<ServerMessage>,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if let Some(ack) = frame.ack {
            events.push(self.on_ack(host, ack));
        }
        if let Some(msg) = frame.d {
            events.push(self.on_message(host, msg));
        }
        events
    }

    /// Dispatches one relay message.
    pub fn on_message(&mut self, host: &mut impl HostEditor, msg: ServerMessage) -> EngineEvent {
        match msg {
            ServerMessage::Connect { client_id } => {
                info!("connected as {}", client_id);
                self.client_id = Some(client_id.clone());
                EngineEvent::Connected { client_id }
            }
            ServerMessage::JoinDoc {
                doc_id,
                contents,
                rev_num,
            } => self.on_snapshot(host, &doc_id, &contents, rev_num),
            ServerMessage::EditUpdate(remote) => self.on_remote_edit(host, remote),
            ServerMessage::CursorUpdate {
                doc_id,
                client_id,
                selection,
            } => {
                if self.client_id.as_deref() == Some(client_id.as_str())
                    || !self.docs.contains_key(&doc_id)
                {
                    return EngineEvent::Ignored;
                }
                host.show_peer_selection(&doc_id, &client_id, selection);
                EngineEvent::PeerCursor { doc_id, client_id }
            }
            ServerMessage::SyncCommit { doc_id } => {
                warn!("relay rejected an edit to {}; resyncing", doc_id);
                self.resync(&doc_id)
            }
            ServerMessage::Error { message } => {
                warn!("relay error: {}", message);
                EngineEvent::ServerError { message }
            }
        }
    }

    /// Applies an edit relayed from a collaborator.
    ///
    /// The whole op list is validated before the document is touched. A
    /// Delete whose text differs from what this client last agreed on means
    /// the copies diverged: nothing is applied and a snapshot is requested.
    pub fn on_remote_edit(&mut self, host: &mut impl HostEditor, remote: RemoteEdit) -> EngineEvent {
        let RemoteEdit { edit, origin_id } = remote;
        let doc_id = edit.doc_id;

        if self.client_id.as_deref() == Some(origin_id.as_str()) {
            debug!("discarding reflected edit to {}", doc_id);
            return EngineEvent::Reflected { doc_id };
        }

        let Some(slot) = self.docs.get_mut(&doc_id) else {
            warn!("edit for unknown document {}", doc_id);
            return EngineEvent::Ignored;
        };
        slot.session.revision = edit.rev_num;
        if slot.resyncing {
            debug!("dropping edit to {} while resyncing", doc_id);
            return EngineEvent::Ignored;
        }
        let Some(current) = host.text(&doc_id) else {
            warn!("document {} is not open in the editor", doc_id);
            return EngineEvent::Ignored;
        };

        match plan_mutations(&slot.session.remote_text, &current, &edit.op) {
            Ok(plan) => {
                for mutation in plan {
                    self.echo
                        .register(&doc_id, mutation.range.clone(), self.config.echo_ttl);
                    host.replace(&doc_id, mutation.range, &mutation.text);
                }
                host.show_peer_selection(&doc_id, &origin_id, edit.selection);

                let now = host.text(&doc_id).unwrap_or_default();
                slot.session.remote_text = now.clone();
                slot.session.local_text = now;
                debug!("applied rev {} from {} to {}", edit.rev_num, origin_id, doc_id);

                EngineEvent::Applied {
                    doc_id,
                    rev_num: edit.rev_num,
                }
            }
            Err(e) => {
                warn!("edit from {} diverges from {}: {}", origin_id, doc_id, e);
                self.resync(&doc_id)
            }
        }
    }

    /// Requests a full snapshot for a document.
    ///
    /// Unsent local edits are discarded; the snapshot supersedes them.
    pub fn resync(&mut self, doc_id: &str) -> EngineEvent {
        let Some(slot) = self.docs.get_mut(doc_id) else {
            return EngineEvent::Ignored;
        };
        slot.delta.clear();
        if !slot.resyncing {
            slot.resyncing = true;
            self.outbox.send(ClientMessage::join_doc(doc_id));
        }
        EngineEvent::Resyncing {
            doc_id: doc_id.to_string(),
        }
    }

    /// Installs a full snapshot, from a first join or a resync.
    pub fn on_snapshot(
        &mut self,
        host: &mut impl HostEditor,
        doc_id: &str,
        contents: &str,
        rev_num: u64,
    ) -> EngineEvent {
        let Some(slot) = self.docs.get_mut(doc_id) else {
            debug!("snapshot for {} which was not joined", doc_id);
            return EngineEvent::Ignored;
        };
        let Some(current) = host.text(doc_id) else {
            warn!("document {} is not open in the editor", doc_id);
            return EngineEvent::Ignored;
        };

        if current != contents {
            let range = 0..text::char_len(&current);
            self.echo
                .register(doc_id, range.clone(), self.config.echo_ttl);
            host.replace(doc_id, range, contents);
        }

        slot.session.reset(contents, rev_num);
        slot.delta.clear();
        slot.resyncing = false;
        info!("{} in sync at rev {}", doc_id, rev_num);

        EngineEvent::Synced {
            doc_id: doc_id.to_string(),
            rev_num,
        }
    }

    /// Sends the local selection of a document.
    ///
    /// Skipped while our own mutations are still echoing, since the host
    /// selection then reflects the engine's writes rather than the user.
    pub fn cursor_update(&mut self, host: &impl HostEditor, doc_id: &str) -> Option<u64> {
        let slot = self.docs.get(doc_id)?;
        if slot.resyncing || !self.echo.is_empty() {
            return None;
        }
        let selection: Selection = host.selection(doc_id);
        Some(self.outbox.send(ClientMessage::CursorUpdate {
            doc_id: doc_id.to_string(),
            selection,
        }))
    }

    /// Marks the end of an event-loop batch.
    ///
    /// Ages echo entries and, with [`FlushPolicy::EndOfBatch`], sends every
    /// document that has recorded edits and nothing in flight.
    pub fn end_of_batch(&mut self, host: &mut impl HostEditor) -> Vec<EngineEvent> {
        self.echo.advance();
        if self.config.flush != FlushPolicy::EndOfBatch {
            return Vec::new();
        }

        let ready: Vec<DocId> = self
            .docs
            .iter()
            .filter(|(_, slot)| slot.state() == DocState::LocalPending)
            .map(|(doc_id, _)| doc_id.clone())
            .collect();
        ready
            .into_iter()
            .map(|doc_id| self.flush(host, &doc_id))
            .collect()
    }

    /// Drops all per-document state after the connection is lost.
    ///
    /// Nothing is carried across a reconnect; documents are rejoined from
    /// fresh snapshots.
    pub fn disconnect(&mut self) {
        info!("disconnected; dropping {} sessions", self.docs.len());
        self.docs.clear();
        self.echo.clear();
        self.client_id = None;
    }
}

/// Turns an op list into document mutations, checking every Delete
/// against `remote_text`.
///
/// Run positions refer to the document before the op list; the returned
/// ranges are shifted to where each mutation lands when applied in order.
/// Anything past the last run is deleted, since an op list covers the
/// whole document.
fn plan_mutations(remote_text: &str, current: &str, op: &[Run]) -> Result<Vec<Mutation>> {
    let doc_len = text::char_len(current);
    let remote_len = text::char_len(remote_text);
    let mut plan = Vec::new();
    let mut cursor: usize = 0;
    let mut inserted = 0;
    let mut deleted = 0;

    for run in op {
        let live = cursor + inserted - deleted;
        match run {
            Run::Retain(n) => {
                let end = cursor.saturating_add(*n);
                if end > remote_len {
                    return Err(Error::LengthMismatch {
                        consumed: end,
                        base: remote_len,
                    });
                }
                cursor = end;
            }
            Run::Insert(t) => {
                plan.push(Mutation {
                    range: live..live,
                    text: t.clone(),
                });
                inserted += text::char_len(t);
            }
            Run::Delete(t) => {
                let len = text::char_len(t);
                let expected = text::slice(remote_text, cursor..cursor + len);
                if expected != t {
                    return Err(Error::DeleteMismatch {
                        offset: cursor,
                        expected: expected.to_string(),
                        actual: t.clone(),
                    });
                }
                plan.push(Mutation {
                    range: live..live + len,
                    text: String::new(),
                });
                deleted += len;
                cursor += len;
            }
        }
    }

    if cursor < doc_len {
        let live = cursor + inserted - deleted;
        plan.push(Mutation {
            range: live..live + (doc_len - cursor),
            text: String::new(),
        });
    }
    Ok(plan)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
