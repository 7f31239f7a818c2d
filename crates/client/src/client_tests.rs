// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the collaboration client module.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::client::{CollabClient, ConnectionState, SyncConfig, SyncError};
use super::transport_tests::MockTransport;
use td_core::protocol::{ClientMessage, EditUpdate, Frame, RemoteEdit, Selection, ServerMessage};
use td_core::{ChangeEvent, DocState, EngineEvent, HostEditor, MemoryHost, Run};

const DOC: &str = "draft.md";

fn make_client() -> CollabClient<MockTransport, MemoryHost> {
    let config = SyncConfig {
        initial_delay_ms: 1,
        max_delay_secs: 1,
        ..SyncConfig::default()
    };
    let mut host = MemoryHost::new();
    host.open(DOC, "hello");
    CollabClient::with_transport(config, MockTransport::new(), host)
}

fn connect_frame(client_id: &str) -> ServerMessage {
    ServerMessage::Connect {
        client_id: client_id.into(),
    }
}

fn snapshot(contents: &str, rev_num: u64) -> ServerMessage {
    ServerMessage::JoinDoc {
        doc_id: DOC.into(),
        contents: contents.into(),
        rev_num,
    }
}

/// A client connected as `c1` with `DOC` joined at "hello".
async fn synced_client() -> CollabClient<MockTransport, MemoryHost> {
    let mut client = make_client();
    client.open(DOC).await.unwrap();
    client.connect().await.unwrap();
    client.transport().queue_message(connect_frame("c1"));
    client.transport().queue_message(snapshot("hello", 1));
    client.recv().await.unwrap();
    client.recv().await.unwrap();
    client.transport().clear_outgoing();
    client
}

#[tokio::test]
async fn test_connect_joins_open_documents() {
    let mut client = make_client();
    client.open(DOC).await.unwrap();
    assert!(client.transport().get_outgoing().is_empty());

    client.connect().await.unwrap();

    assert_eq!(client.state(), ConnectionState::Connected);
    let outgoing = client.transport().get_outgoing();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].seq, Some(1));
    assert_eq!(outgoing[0].d, Some(ClientMessage::join_doc(DOC)));
}

#[tokio::test]
async fn test_open_requires_document_in_host() {
    let mut client = make_client();
    client.connect().await.unwrap();

    let result = client.open("missing.md").await;

    assert!(matches!(result, Err(SyncError::Core(_))));
    assert_eq!(client.open_documents().count(), 0);
}

#[tokio::test]
async fn test_snapshot_replaces_host_text() {
    let mut client = make_client();
    client.open(DOC).await.unwrap();
    client.connect().await.unwrap();

    client.transport().queue_message(connect_frame("c1"));
    client.transport().queue_message(snapshot("shared text", 4));

    let event = client.recv().await.unwrap();
    assert_eq!(
        event,
        Some(EngineEvent::Connected {
            client_id: "c1".into()
        })
    );
    let event = client.recv().await.unwrap();
    assert_eq!(
        event,
        Some(EngineEvent::Synced {
            doc_id: DOC.into(),
            rev_num: 4
        })
    );
    assert_eq!(client.host().text(DOC).unwrap(), "shared text");
    assert_eq!(client.engine().state(DOC), Some(DocState::Idle));
    // The replacement is not echoed back as an edit
    assert_eq!(client.transport().get_outgoing().len(), 1);
}

#[tokio::test]
async fn test_local_change_sends_edit_update() {
    let mut client = synced_client().await;

    client
        .local_change(DOC, ChangeEvent::insert(5, " world"))
        .await
        .unwrap();

    assert_eq!(client.host().text(DOC).unwrap(), "hello world");
    let sent = client.transport().sent_messages();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        ClientMessage::EditUpdate(edit) => {
            assert_eq!(edit.doc_id, DOC);
            assert_eq!(
                edit.op,
                vec![Run::Retain(5), Run::Insert(" world".into())]
            );
            assert_eq!(edit.rev_num, 2);
        }
        other => panic!("unexpected message {:?}", other),
    }
    assert_eq!(client.engine().state(DOC), Some(DocState::InFlight));
}

#[tokio::test]
async fn test_ack_releases_next_edit() {
    let mut client = synced_client().await;

    client
        .local_change(DOC, ChangeEvent::insert(0, "a"))
        .await
        .unwrap();
    client
        .local_change(DOC, ChangeEvent::insert(1, "b"))
        .await
        .unwrap();
    assert_eq!(client.transport().sent_messages().len(), 1);
    let seq = client.transport().get_outgoing()[0].seq.unwrap();

    client.transport().queue_incoming(Frame::ack(seq));
    let event = client.recv().await.unwrap();

    assert_eq!(event, Some(EngineEvent::Acked { seq }));
    let sent = client.transport().sent_messages();
    assert_eq!(sent.len(), 2);
    match &sent[1] {
        ClientMessage::EditUpdate(edit) => {
            assert_eq!(
                edit.op,
                vec![Run::Retain(1), Run::Insert("b".into()), Run::Retain(5)]
            );
        }
        other => panic!("unexpected message {:?}", other),
    }
}

#[tokio::test]
async fn test_remote_edit_is_applied_without_echo() {
    let mut client = synced_client().await;

    client
        .transport()
        .queue_message(ServerMessage::EditUpdate(RemoteEdit {
            edit: EditUpdate {
                doc_id: DOC.into(),
                op: vec![Run::Retain(5), Run::Insert("!".into())],
                rev_num: 2,
                selection: Selection::cursor(0, 6),
            },
            origin_id: "c2".into(),
        }));
    let event = client.recv().await.unwrap();

    assert_eq!(
        event,
        Some(EngineEvent::Applied {
            doc_id: DOC.into(),
            rev_num: 2
        })
    );
    assert_eq!(client.host().text(DOC).unwrap(), "hello!");
    assert!(client.transport().get_outgoing().is_empty());
    assert_eq!(
        client.host().peer_selection(DOC, "c2"),
        Some(Selection::cursor(0, 6))
    );
}

#[tokio::test]
async fn test_diverged_remote_edit_requests_snapshot() {
    let mut client = synced_client().await;

    client
        .transport()
        .queue_message(ServerMessage::EditUpdate(RemoteEdit {
            edit: EditUpdate {
                doc_id: DOC.into(),
                op: vec![Run::Delete("HELLO".into())],
                rev_num: 2,
                selection: Selection::default(),
            },
            origin_id: "c2".into(),
        }));
    let event = client.recv().await.unwrap();

    assert_eq!(event, Some(EngineEvent::Resyncing { doc_id: DOC.into() }));
    assert_eq!(client.host().text(DOC).unwrap(), "hello");
    assert_eq!(
        client.transport().sent_messages(),
        vec![ClientMessage::join_doc(DOC)]
    );
}

#[tokio::test]
async fn test_connection_close_drops_engine_state() {
    let mut client = synced_client().await;

    // Nothing queued: the mock reports a closed connection
    let event = client.recv().await.unwrap();

    assert!(event.is_none());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.engine().documents().count(), 0);
    assert_eq!(client.open_documents().collect::<Vec<_>>(), vec![DOC]);

    let result = client.recv().await;
    assert!(matches!(result, Err(SyncError::NotConnected)));
}

#[tokio::test]
async fn test_reconnect_rejoins_documents() {
    let mut client = synced_client().await;
    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.transport_mut().fail_connects(2);
    client.connect_with_retry().await.unwrap();

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.transport().connect_calls(), 4);
    assert_eq!(
        client.transport().sent_messages(),
        vec![ClientMessage::join_doc(DOC)]
    );
    assert_eq!(client.engine().state(DOC), Some(DocState::Resyncing));
}

#[tokio::test]
async fn test_connect_with_retry_gives_up() {
    let mut client = make_client();
    client.transport_mut().fail_connects(100);

    let result = client.connect_with_retry().await;

    assert!(matches!(result, Err(SyncError::MaxRetriesExceeded)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.transport().connect_calls(), 10);
}

#[tokio::test]
async fn test_close_leaves_document() {
    let mut client = synced_client().await;

    client.close(DOC).await.unwrap();

    assert_eq!(
        client.transport().sent_messages(),
        vec![ClientMessage::leave_doc(DOC)]
    );
    assert_eq!(client.engine().state(DOC), None);
}

#[tokio::test]
async fn test_cursor_update_sends_selection() {
    let mut client = synced_client().await;
    client
        .host_mut()
        .set_selection(DOC, Selection::cursor(0, 2));

    assert!(client.cursor_update(DOC).await.unwrap());

    assert_eq!(
        client.transport().sent_messages(),
        vec![ClientMessage::CursorUpdate {
            doc_id: DOC.into(),
            selection: Selection::cursor(0, 2),
        }]
    );
}
