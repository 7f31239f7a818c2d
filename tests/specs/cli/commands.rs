// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Rust specs for the `tandem` commands, run against a scripted relay.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use td_core::protocol::{ClientMessage, EditUpdate, Frame, ServerMessage};
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message;

fn tandem(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("tandem");
    // Keep the user's config out of the way
    cmd.arg("--config").arg(temp.path().join("config.toml"));
    cmd
}

/// A relay that serves one fixed document and records received edits.
struct ScriptedRelay {
    addr: SocketAddr,
    edits: Arc<Mutex<Vec<EditUpdate>>>,
    _runtime: tokio::runtime::Runtime,
}

impl ScriptedRelay {
    fn start(contents: &'static str) -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let edits = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&edits);
        runtime.spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                tokio::spawn(serve(stream, contents, recorded));
            }
        });

        ScriptedRelay {
            addr,
            edits,
            _runtime: runtime,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    fn edits(&self) -> Vec<EditUpdate> {
        self.edits.lock().unwrap().clone()
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    contents: &'static str,
    edits: Arc<Mutex<Vec<EditUpdate>>>,
) {
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let (mut sink, mut stream) = ws.split();
    let encode = |frame: Frame<ServerMessage>| Message::Text(frame.to_json().unwrap().into());

    let hello = Frame::body(ServerMessage::Connect {
        client_id: "c1".into(),
    });
    sink.send(encode(hello)).await.unwrap();

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: Frame<ClientMessage> = Frame::from_json(&text).unwrap();
        let body = match frame.d {
            Some(ClientMessage::JoinDoc { doc_id }) if doc_id.contains("..") => Some(
                ServerMessage::error(format!("invalid document id: {}", doc_id)),
            ),
            Some(ClientMessage::JoinDoc { doc_id }) => Some(ServerMessage::JoinDoc {
                doc_id,
                contents: contents.into(),
                rev_num: 3,
            }),
            Some(ClientMessage::EditUpdate(edit)) => {
                edits.lock().unwrap().push(edit);
                None
            }
            _ => None,
        };
        let reply = Frame {
            seq: None,
            ack: frame.seq,
            d: body,
        };
        if sink.send(encode(reply)).await.is_err() {
            break;
        }
    }
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    tandem(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cat"))
        .stdout(predicate::str::contains("follow"))
        .stdout(predicate::str::contains("append"));
}

#[test]
fn cat_prints_the_document() {
    let temp = TempDir::new().unwrap();
    let relay = ScriptedRelay::start("shared notes\n");

    tandem(&temp)
        .arg("--url")
        .arg(relay.url())
        .arg("cat")
        .arg("notes.txt")
        .assert()
        .success()
        .stdout("shared notes\n");
}

#[test]
fn append_sends_one_edit() {
    let temp = TempDir::new().unwrap();
    let relay = ScriptedRelay::start("hello");

    tandem(&temp)
        .arg("--url")
        .arg(relay.url())
        .arg("append")
        .arg("notes.txt")
        .arg(" world")
        .assert()
        .success();

    let edits = relay.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].doc_id, "notes.txt");
    let wire: Vec<String> = edits[0].op.iter().map(ToString::to_string).collect();
    assert_eq!(wire, vec!["r5", "i world"]);
    assert_eq!(edits[0].rev_num, 4);
}

#[test]
fn rejected_join_is_reported() {
    let temp = TempDir::new().unwrap();
    let relay = ScriptedRelay::start("hello");

    tandem(&temp)
        .arg("--url")
        .arg(relay.url())
        .arg("cat")
        .arg("../secrets")
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid document id: ../secrets"));
}

#[test]
fn tandem_toml_in_working_directory_is_used() {
    let temp = TempDir::new().unwrap();
    let relay = ScriptedRelay::start("from local config");
    std::fs::write(
        temp.path().join("tandem.toml"),
        format!("url = \"{}\"\n", relay.url()),
    )
    .unwrap();

    cargo_bin_cmd!("tandem")
        .current_dir(temp.path())
        .arg("cat")
        .arg("notes.txt")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout("from local config");
}

#[test]
fn unreachable_relay_fails_after_retries() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("config.toml"),
        "url = \"ws://127.0.0.1:9\"\nmax_retries = 2\ninitial_delay_ms = 1\n",
    )
    .unwrap();

    tandem(&temp)
        .arg("cat")
        .arg("notes.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max reconnection retries exceeded"));
}

#[test]
fn malformed_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "flush = \"sometimes\"\n").unwrap();

    tandem(&temp)
        .arg("cat")
        .arg("notes.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
