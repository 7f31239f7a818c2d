// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the transport module.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::transport::{Transport, TransportError, TransportResult, WebSocketTransport};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use td_core::protocol::{ClientMessage, Frame, ServerMessage};

/// Mock transport for testing without real sockets.
pub struct MockTransport {
    connected: bool,
    /// Frames that will be returned by recv().
    incoming: Arc<Mutex<VecDeque<Frame<ServerMessage>>>>,
    /// Frames that were sent via send().
    outgoing: Arc<Mutex<Vec<Frame<ClientMessage>>>>,
    /// Number of connect attempts that fail before one succeeds.
    failing_connects: u32,
    /// Number of connect calls made.
    connect_calls: u32,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            connected: false,
            incoming: Arc::new(Mutex::new(VecDeque::new())),
            outgoing: Arc::new(Mutex::new(Vec::new())),
            failing_connects: 0,
            connect_calls: 0,
        }
    }

    /// Add a frame that will be returned by recv().
    pub fn queue_incoming(&self, frame: Frame<ServerMessage>) {
        self.incoming.lock().unwrap().push_back(frame);
    }

    /// Add a message body that will be returned by recv().
    pub fn queue_message(&self, msg: ServerMessage) {
        self.queue_incoming(Frame::body(msg));
    }

    /// Get all frames that were sent.
    pub fn get_outgoing(&self) -> Vec<Frame<ClientMessage>> {
        self.outgoing.lock().unwrap().clone()
    }

    /// Get the bodies of all frames that were sent.
    pub fn sent_messages(&self) -> Vec<ClientMessage> {
        self.get_outgoing()
            .into_iter()
            .filter_map(|frame| frame.d)
            .collect()
    }

    /// Forget the frames sent so far.
    pub fn clear_outgoing(&self) {
        self.outgoing.lock().unwrap().clear();
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_connects(&mut self, n: u32) {
        self.failing_connects = n;
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        _url: &str,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connect_calls += 1;
            if self.failing_connects > 0 {
                self.failing_connects -= 1;
                Err(TransportError::ConnectionFailed("mock failure".into()))
            } else {
                self.connected = true;
                Ok(())
            }
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(
        &mut self,
        frame: Frame<ClientMessage>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let outgoing = Arc::clone(&self.outgoing);
        Box::pin(async move {
            outgoing.lock().unwrap().push(frame);
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<Frame<ServerMessage>>>> + Send + '_>>
    {
        let incoming = Arc::clone(&self.incoming);
        Box::pin(async move {
            let frame = incoming.lock().unwrap().pop_front();
            if frame.is_none() {
                self.connected = false;
            }
            Ok(frame)
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[tokio::test]
async fn test_mock_transport_connect() {
    let mut transport = MockTransport::new();
    assert!(!transport.is_connected());

    transport.connect("ws://localhost:1234").await.unwrap();
    assert!(transport.is_connected());

    transport.disconnect().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_mock_transport_send_recv() {
    let mut transport = MockTransport::new();
    transport.connect("ws://localhost:1234").await.unwrap();

    transport
        .send(Frame::numbered(1, ClientMessage::join_doc("a")))
        .await
        .unwrap();

    let outgoing = transport.get_outgoing();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].seq, Some(1));

    transport.queue_incoming(Frame::ack(1));

    let received = transport.recv().await.unwrap();
    assert_eq!(received, Some(Frame::ack(1)));

    // No more frames
    let received = transport.recv().await.unwrap();
    assert!(received.is_none());
}

#[tokio::test]
async fn test_mock_transport_connect_fail() {
    let mut transport = MockTransport::new();
    transport.fail_connects(1);

    let result = transport.connect("ws://localhost:1234").await;
    assert!(result.is_err());
    assert!(!transport.is_connected());

    transport.connect("ws://localhost:1234").await.unwrap();
    assert!(transport.is_connected());
}

#[tokio::test]
async fn test_websocket_send_without_connection() {
    let mut transport = WebSocketTransport::new();
    assert!(!transport.is_connected());

    let result = transport
        .send(Frame::numbered(1, ClientMessage::join_doc("a")))
        .await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));

    let result = transport.recv().await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed)));
}

#[tokio::test]
async fn test_websocket_connect_refused() {
    // Bind and drop a listener to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = WebSocketTransport::new();
    let result = transport.connect(&format!("ws://{}", addr)).await;

    assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    assert!(!transport.is_connected());
}
