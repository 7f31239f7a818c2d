// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, message routing, and broadcast fanout.
//!
//! Every connection is assigned a client id and greeted with `CONNECT`.
//! Client frames are acknowledged by sequence number: the reply to a frame
//! carries its ack, and a frame with no reply gets a bare ack. Broadcasts
//! reach only the connections that joined the document.

use std::collections::HashMap;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use td_core::protocol::{ClientMessage, DocId, Frame, ServerMessage};

use crate::state::{Broadcast, ServerState, StateError};

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Per-connection session.
pub(crate) struct Session {
    pub(crate) client_id: String,
    /// Joined documents and the revision of the snapshot sent for each.
    pub(crate) joined: HashMap<DocId, u64>,
    /// Highest sequence number received.
    pub(crate) last_seq: Option<u64>,
}

impl Session {
    /// Whether a broadcast should be forwarded to this connection.
    ///
    /// Edits already contained in the snapshot sent at join are skipped.
    pub(crate) fn wants(&self, b: &Broadcast) -> bool {
        let Some(&joined_at) = self.joined.get(&b.doc_id) else {
            return false;
        };
        match &b.msg {
            ServerMessage::EditUpdate(remote) => remote.edit.rev_num > joined_at,
            _ => true,
        }
    }

    /// `SYNC_COMMIT` frames for every joined document, sent once broadcasts
    /// to this connection were dropped.
    pub(crate) fn resync_all(&self) -> Vec<Frame<ServerMessage>> {
        let mut doc_ids: Vec<&DocId> = self.joined.keys().collect();
        doc_ids.sort();
        doc_ids
            .into_iter()
            .map(|doc_id| {
                Frame::body(ServerMessage::SyncCommit {
                    doc_id: doc_id.clone(),
                })
                .with_ack(self.last_seq)
            })
            .collect()
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // Subscribe before greeting so no broadcast is missed after a join
    let mut broadcast_rx = state.subscribe();

    let mut session = Session {
        client_id: state.next_client_id(),
        joined: HashMap::new(),
        last_seq: None,
    };
    info!("{} connected as {}", peer_addr, session.client_id);

    let hello = Frame::body(ServerMessage::Connect {
        client_id: session.client_id.clone(),
    });
    ws_sink.send(Message::Text(hello.to_json()?.into())).await?;

    loop {
        tokio::select! {
            // Handle incoming frames from client
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_frame(&text, &state, &mut session).await {
                            ws_sink.send(Message::Text(reply.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", session.client_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Ignore other message types (Binary, Pong, Frame)
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", session.client_id);
                        break;
                    }
                }
            }

            // Handle broadcast messages to send to client
            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(b) if session.wants(&b) => {
                        let frame = Frame::body(b.msg).with_ack(session.last_seq);
                        if let Err(e) = ws_sink.send(Message::Text(frame.to_json()?.into())).await {
                            warn!("Failed to send broadcast to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages; resyncing", session.client_id, n);
                        for frame in session.resync_all() {
                            ws_sink.send(Message::Text(frame.to_json()?.into())).await?;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client frame and return the frame to send back, if any.
async fn handle_client_frame(
    text: &str,
    state: &ServerState,
    session: &mut Session,
) -> Option<Frame<ServerMessage>> {
    let frame: Frame<ClientMessage> = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("undecodable frame from {}: {}", session.client_id, e);
            return Some(Frame::body(ServerMessage::error(e.to_string())));
        }
    };
    if let Some(seq) = frame.seq {
        session.last_seq = Some(session.last_seq.map_or(seq, |last| last.max(seq)));
    }

    let reply = match frame.d {
        Some(msg) => handle_client_message(msg, state, session).await,
        None => None,
    };

    match (reply, frame.seq) {
        (Some(msg), _) => Some(Frame::body(msg).with_ack(session.last_seq)),
        (None, Some(seq)) => Some(Frame::ack(seq)),
        (None, None) => None,
    }
}

/// Process a client message and return an optional direct reply.
async fn handle_client_message(
    msg: ClientMessage,
    state: &ServerState,
    session: &mut Session,
) -> Option<ServerMessage> {
    debug!("Received from {}: {:?}", session.client_id, msg);

    match msg {
        ClientMessage::JoinDoc { doc_id } => match state.join(&doc_id).await {
            Ok(doc) => {
                session.joined.insert(doc_id.clone(), doc.revision);
                Some(ServerMessage::JoinDoc {
                    doc_id,
                    contents: doc.text,
                    rev_num: doc.revision,
                })
            }
            Err(e) => {
                warn!("join of {} by {} failed: {}", doc_id, session.client_id, e);
                Some(ServerMessage::error(e.to_string()))
            }
        },

        ClientMessage::LeaveDoc { doc_id } => {
            session.joined.remove(&doc_id);
            None
        }

        ClientMessage::EditUpdate(edit) => {
            let doc_id = edit.doc_id.clone();
            if !session.joined.contains_key(&doc_id) {
                return Some(ServerMessage::error(
                    StateError::NotJoined(doc_id).to_string(),
                ));
            }
            // The accepted edit reaches the sender through the broadcast
            match state.apply_edit(&session.client_id, edit).await {
                Ok(_) => None,
                Err(e) => {
                    warn!(
                        "rejected edit to {} from {}: {}",
                        doc_id, session.client_id, e
                    );
                    Some(ServerMessage::SyncCommit { doc_id })
                }
            }
        }

        ClientMessage::CursorUpdate { doc_id, selection } => {
            if session.joined.contains_key(&doc_id) {
                state.cursor(&session.client_id, &doc_id, selection);
            }
            None
        }
    }
}
