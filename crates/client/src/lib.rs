// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem - Collaborative text editing client.
//!
//! Binds documents held by a host editor to a td-remote relay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Client    │────►│  Transport  │────►│    Relay    │
//! │(CollabClient│◄────│   (trait)   │◄────│ (td-remote) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!     │     │
//!     ▼     ▼
//! ┌────────┐ ┌─────────────┐
//! │  Host  │ │ SyncEngine  │  (one per connection)
//! │ Editor │ │  (td-core)  │
//! └────────┘ └─────────────┘
//! ```
//!
//! # Features
//!
//! - WebSocket connection to the relay
//! - Automatic reconnect with exponential backoff
//! - Documents rejoined from fresh snapshots after every reconnect
//! - Injectable transport trait for testing

mod client;
pub mod config;
mod transport;

pub use client::{CollabClient, ConnectionState, SyncConfig, SyncError, SyncResult};
pub use config::{Config, ConfigError};
pub use transport::{Transport, TransportError, TransportResult, WebSocketTransport};

#[cfg(test)]
mod client_tests;

#[cfg(test)]
mod transport_tests;
