// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Collaboration client for communicating with td-remote.
//!
//! Provides a high-level interface for:
//! - Connecting to the relay
//! - Joining and leaving documents
//! - Feeding local edits to the engine and relaying remote ones
//! - Automatic reconnection with exponential backoff

use std::collections::BTreeSet;
use std::time::Duration;

use td_core::{
    ChangeEvent, DocId, EngineConfig, EngineEvent, HostEditor, MemoryHost, SyncEngine,
};
use tracing::{debug, info, warn};

use super::transport::{Transport, TransportError, WebSocketTransport};

/// Configuration for the collaboration client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// URL of the relay.
    pub url: String,
    /// Maximum reconnection attempts.
    pub max_retries: u32,
    /// Maximum delay between reconnection attempts (seconds).
    pub max_delay_secs: u64,
    /// Initial delay for exponential backoff (milliseconds).
    pub initial_delay_ms: u64,
    /// Engine tuning for every connection.
    pub engine: EngineConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            url: "ws://localhost:7890".to_string(),
            max_retries: 10,
            max_delay_secs: 30,
            initial_delay_ms: 100,
            engine: EngineConfig::default(),
        }
    }
}

/// Error type for collaboration client operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Engine error.
    #[error(transparent)]
    Core(#[from] td_core::Error),

    /// Not connected.
    #[error("not connected to relay")]
    NotConnected,

    /// The relay refused a request.
    #[error("relay error: {0}")]
    Rejected(String),

    /// Max retries exceeded.
    #[error("max reconnection retries exceeded")]
    MaxRetriesExceeded,
}

/// Result type for collaboration client operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// State of the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected to the relay.
    Connected,
    /// Reconnecting after disconnect.
    Reconnecting { attempt: u32 },
}

/// Binds a host editor to a relay connection.
///
/// The engine lives for one connection. Documents opened through the client
/// are remembered and rejoined after every reconnect.
pub struct CollabClient<T: Transport = WebSocketTransport, H: HostEditor = MemoryHost> {
    /// Configuration.
    config: SyncConfig,
    /// Transport layer.
    transport: T,
    /// Editor holding the documents.
    host: H,
    /// Engine for the current connection.
    engine: SyncEngine,
    /// Documents to keep joined.
    open_docs: BTreeSet<DocId>,
    /// Connection state.
    state: ConnectionState,
}

impl<H: HostEditor> CollabClient<WebSocketTransport, H> {
    /// Create a new client with the default WebSocket transport.
    pub fn new(config: SyncConfig, host: H) -> Self {
        Self::with_transport(config, WebSocketTransport::new(), host)
    }
}

impl<T: Transport, H: HostEditor> CollabClient<T, H> {
    /// Create a new client with a custom transport (for testing).
    pub fn with_transport(config: SyncConfig, transport: T, host: H) -> Self {
        let engine = SyncEngine::new(config.engine);
        CollabClient {
            config,
            transport,
            host,
            engine,
            open_docs: BTreeSet::new(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_connected()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Documents that are joined on every connection.
    pub fn open_documents(&self) -> impl Iterator<Item = &str> {
        self.open_docs.iter().map(String::as_str)
    }

    /// Connect to the relay and join every open document.
    pub async fn connect(&mut self) -> SyncResult<()> {
        self.state = ConnectionState::Connecting;

        match self.transport.connect(&self.config.url).await {
            Ok(()) => self.on_connected().await,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e.into())
            }
        }
    }

    /// Connect with exponential backoff retry.
    pub async fn connect_with_retry(&mut self) -> SyncResult<()> {
        let mut attempt = 0;
        let mut delay_ms = self.config.initial_delay_ms;

        loop {
            attempt += 1;
            self.state = ConnectionState::Reconnecting { attempt };

            match self.transport.connect(&self.config.url).await {
                Ok(()) => return self.on_connected().await,
                Err(_) if attempt >= self.config.max_retries => {
                    self.state = ConnectionState::Disconnected;
                    return Err(SyncError::MaxRetriesExceeded);
                }
                Err(e) => {
                    debug!("connect attempt {} failed: {}", attempt, e);
                    // Exponential backoff
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, self.config.max_delay_secs * 1000);
                }
            }
        }
    }

    /// Disconnect from the relay.
    ///
    /// Documents stay open in the host and are rejoined on the next connect.
    pub async fn disconnect(&mut self) -> SyncResult<()> {
        self.transport.disconnect().await?;
        self.connection_lost();
        Ok(())
    }

    /// Start collaborating on a document already open in the host.
    pub async fn open(&mut self, doc_id: &str) -> SyncResult<()> {
        if self.host.text(doc_id).is_none() {
            return Err(td_core::Error::UnknownDocument(doc_id.to_string()).into());
        }
        if self.open_docs.insert(doc_id.to_string()) && self.is_connected() {
            self.engine.join(doc_id);
            self.pump().await?;
        }
        Ok(())
    }

    /// Stop collaborating on a document.
    pub async fn close(&mut self, doc_id: &str) -> SyncResult<()> {
        if self.open_docs.remove(doc_id) && self.is_connected() {
            self.engine.leave(doc_id);
            self.pump().await?;
        }
        Ok(())
    }

    /// Apply a user edit to the host and synchronize it.
    pub async fn local_change(&mut self, doc_id: &str, change: ChangeEvent) -> SyncResult<()> {
        let range = change.offset..change.offset + change.length;
        self.host.replace(doc_id, range, &change.text);
        self.settle();
        self.pump().await
    }

    /// Send the local selection of a document.
    pub async fn cursor_update(&mut self, doc_id: &str) -> SyncResult<bool> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let sent = self.engine.cursor_update(&self.host, doc_id).is_some();
        self.pump().await?;
        Ok(sent)
    }

    /// Receive and apply one frame from the relay.
    ///
    /// Returns the outcome of the frame body, or of its ack for a bare
    /// ack. Returns `None` if the connection is closed.
    pub async fn recv(&mut self) -> SyncResult<Option<EngineEvent>> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        match self.transport.recv().await {
            Ok(Some(frame)) => {
                let mut events = self.engine.on_frame(&mut self.host, frame);
                self.settle();
                self.pump().await?;
                Ok(Some(events.pop().unwrap_or(EngineEvent::Ignored)))
            }
            Ok(None) => {
                info!("relay closed the connection");
                self.connection_lost();
                Ok(None)
            }
            Err(e) => {
                warn!("connection lost: {}", e);
                self.connection_lost();
                Err(e.into())
            }
        }
    }

    async fn on_connected(&mut self) -> SyncResult<()> {
        self.state = ConnectionState::Connected;
        self.engine = SyncEngine::new(self.config.engine);
        info!("connected to {}", self.config.url);
        for doc_id in &self.open_docs {
            self.engine.join(doc_id);
        }
        self.pump().await
    }

    fn connection_lost(&mut self) {
        self.engine.disconnect();
        self.state = ConnectionState::Disconnected;
    }

    /// Feeds queued host notifications to the engine and closes the batch.
    fn settle(&mut self) {
        for (doc_id, change) in self.host.take_notifications() {
            self.engine.on_change(&mut self.host, &doc_id, &change);
        }
        self.engine.end_of_batch(&mut self.host);
    }

    /// Writes queued frames to the transport.
    async fn pump(&mut self) -> SyncResult<()> {
        if !self.is_connected() {
            // Nothing survives a disconnect; frames are rebuilt on rejoin
            self.engine.outbox_mut().drain();
            return Ok(());
        }
        for frame in self.engine.outbox_mut().drain() {
            if let Err(e) = self.transport.send(frame).await {
                warn!("send failed: {}", e);
                self.connection_lost();
                return Err(e.into());
            }
        }
        Ok(())
    }
}
