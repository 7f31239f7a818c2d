// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the canonical text of every joined document for thread-safe
//! access, and the broadcast channel that fans accepted edits out to
//! connections.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use td_core::delta;
use td_core::protocol::{DocId, EditUpdate, RemoteEdit, Selection, ServerMessage};

/// Errors from document operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid document id: '{0}'\n  hint: ids are relative paths without '..'")]
    InvalidDocId(String),

    #[error("document not joined: {0}")]
    NotJoined(String),

    #[error("failed to load {path}: {source}")]
    Load {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Edit(#[from] td_core::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Canonical copy of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub revision: u64,
}

/// A message for every connection that joined `doc_id`.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub doc_id: DocId,
    pub msg: ServerMessage,
}

/// Shared server state containing the canonical documents.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    /// Canonical documents (protected by mutex for writes).
    docs: Mutex<HashMap<DocId, Document>>,
    /// Directory documents are seeded from on first join.
    root: Option<PathBuf>,
    /// Counter for client ids.
    next_client: AtomicU64,
    /// Broadcast channel for notifying clients of accepted edits.
    broadcast_tx: broadcast::Sender<Broadcast>,
}

impl ServerState {
    /// Creates a new server state, seeding documents from `root` if given.
    pub fn new(root: Option<PathBuf>) -> Self {
        // Create broadcast channel with reasonable buffer
        let (broadcast_tx, _) = broadcast::channel(1024);

        ServerState {
            inner: Arc::new(ServerStateInner {
                docs: Mutex::new(HashMap::new()),
                root,
                next_client: AtomicU64::new(1),
                broadcast_tx,
            }),
        }
    }

    /// Assigns the id of a new connection.
    pub fn next_client_id(&self) -> String {
        let n = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
        format!("c{}", n)
    }

    /// Returns the text and revision of a document, loading it on first use.
    ///
    /// A document missing from memory is read from `root/<doc_id>`, or
    /// starts empty when there is no such file.
    pub async fn join(&self, doc_id: &str) -> Result<Document> {
        validate_doc_id(doc_id)?;

        let mut docs = self.inner.docs.lock().await;
        if let Some(doc) = docs.get(doc_id) {
            return Ok(doc.clone());
        }

        let text = match &self.inner.root {
            Some(root) => load(&root.join(doc_id)).await?,
            None => String::new(),
        };
        info!("opened {} ({} chars)", doc_id, text.chars().count());
        let doc = Document { text, revision: 0 };
        docs.insert(doc_id.to_string(), doc.clone());
        Ok(doc)
    }

    /// Applies an edit to the canonical text and broadcasts it.
    ///
    /// The edit must apply strictly: every Delete must match the canonical
    /// text and the runs must cover the whole document. Returns the new
    /// revision.
    pub async fn apply_edit(&self, origin_id: &str, edit: EditUpdate) -> Result<u64> {
        let mut docs = self.inner.docs.lock().await;
        let doc = docs
            .get_mut(&edit.doc_id)
            .ok_or_else(|| StateError::NotJoined(edit.doc_id.clone()))?;

        doc.text = delta::apply(&doc.text, &edit.op)?;
        doc.revision += 1;
        let revision = doc.revision;
        debug!("{} rev {} from {}", edit.doc_id, revision, origin_id);

        let doc_id = edit.doc_id.clone();
        let msg = ServerMessage::EditUpdate(RemoteEdit {
            edit: EditUpdate {
                rev_num: revision,
                ..edit
            },
            origin_id: origin_id.to_string(),
        });
        // No subscribers is fine
        let _ = self.inner.broadcast_tx.send(Broadcast { doc_id, msg });

        Ok(revision)
    }

    /// Broadcasts a collaborator's selection.
    pub fn cursor(&self, client_id: &str, doc_id: &str, selection: Selection) {
        let msg = ServerMessage::CursorUpdate {
            doc_id: doc_id.to_string(),
            client_id: client_id.to_string(),
            selection,
        };
        let _ = self.inner.broadcast_tx.send(Broadcast {
            doc_id: doc_id.to_string(),
            msg,
        });
    }

    /// Returns the canonical copy of a loaded document.
    pub async fn document(&self, doc_id: &str) -> Option<Document> {
        self.inner.docs.lock().await.get(doc_id).cloned()
    }

    /// Subscribe to broadcast messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.inner.broadcast_tx.subscribe()
    }
}

/// Accepts relative paths made only of normal components.
fn validate_doc_id(doc_id: &str) -> Result<()> {
    let path = Path::new(doc_id);
    let valid = !doc_id.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StateError::InvalidDocId(doc_id.to_string()))
    }
}

async fn load(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(StateError::Load {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
