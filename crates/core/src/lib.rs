// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! td-core: Edit synchronization for tandem
//!
//! This crate provides the delta merge, wire protocol, echo suppression and
//! per-connection sync engine shared by the tandem client and the td-remote
//! relay. It does no I/O; frames are queued in an [`Outbox`] and documents
//! are reached through a [`HostEditor`].

pub mod delta;
pub mod echo;
pub mod engine;
pub mod error;
pub mod host;
pub mod outbox;
pub mod protocol;
pub mod run;
pub mod session;
pub mod text;

pub use delta::DeltaList;
pub use echo::EchoSuppressor;
pub use engine::{EngineConfig, EngineEvent, FlushPolicy, SyncEngine};
pub use error::{Error, Result};
pub use host::{ChangeEvent, HostEditor, MemoryHost};
pub use outbox::{FrameQueue, Outbox};
pub use protocol::{
    ClientMessage, DocId, EditUpdate, Frame, RemoteEdit, Selection, ServerMessage,
};
pub use run::Run;
pub use session::{DocState, PendingSend, SyncSession};
