// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tandem: headless collaboration client.
//!
//! Joins a document on a td-remote relay and prints or edits it from the
//! command line.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use td_core::{ChangeEvent, DocState, EngineEvent, HostEditor, MemoryHost};
use tandem::{CollabClient, Config, SyncError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// tandem: Collaborative text editing client
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(about = "Headless client for td-remote collaborative editing")]
struct Cli {
    /// Config file (default: ./tandem.toml, then <config dir>/tandem/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Relay URL, overriding the config file
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current contents of a document
    Cat {
        /// Document id
        doc: String,
    },
    /// Print a document every time it changes
    Follow {
        /// Document id
        doc: String,
    },
    /// Append text to a document
    Append {
        /// Document id
        doc: String,
        /// Text to append
        text: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match cli.config {
        Some(path) => Config::load(&path)?,
        None => Config::load_default()?,
    };
    if let Some(url) = cli.url {
        config.url = url;
    }

    let doc = match &cli.command {
        Command::Cat { doc } | Command::Follow { doc } | Command::Append { doc, .. } => doc.clone(),
    };
    let mut host = MemoryHost::new();
    host.open(&doc, "");

    let mut client = CollabClient::new(config.sync_config(), host);
    client.open(&doc).await?;
    client.connect_with_retry().await?;
    wait_for_sync(&mut client, &doc).await?;

    match cli.command {
        Command::Cat { .. } => {
            print!("{}", client.host().text(&doc).unwrap_or_default());
        }
        Command::Follow { .. } => follow(&mut client, &doc).await?,
        Command::Append { text, .. } => {
            let end = client
                .host()
                .text(&doc)
                .map(|t| t.chars().count())
                .unwrap_or_default();
            client
                .local_change(&doc, ChangeEvent::insert(end, text))
                .await?;
            wait_for_idle(&mut client, &doc).await?;
            info!("appended to {}", doc);
        }
    }

    client.disconnect().await?;
    Ok(())
}

/// Receives frames until `doc` holds a snapshot.
async fn wait_for_sync(client: &mut CollabClient, doc: &str) -> Result<(), SyncError> {
    loop {
        match client.recv().await? {
            Some(EngineEvent::Synced { doc_id, .. }) if doc_id == doc => return Ok(()),
            Some(EngineEvent::ServerError { message }) => return Err(SyncError::Rejected(message)),
            Some(_) => {}
            None => return Err(SyncError::NotConnected),
        }
    }
}

/// Receives frames until every edit to `doc` is acknowledged.
async fn wait_for_idle(client: &mut CollabClient, doc: &str) -> Result<(), SyncError> {
    while client.engine().state(doc) != Some(DocState::Idle) {
        match client.recv().await? {
            Some(EngineEvent::ServerError { message }) => return Err(SyncError::Rejected(message)),
            Some(_) => {}
            None => return Err(SyncError::NotConnected),
        }
    }
    Ok(())
}

/// Prints the document after every change, reconnecting when the relay
/// goes away.
async fn follow(client: &mut CollabClient, doc: &str) -> Result<(), SyncError> {
    print_doc(client, doc);
    loop {
        match client.recv().await {
            Ok(Some(EngineEvent::Applied { doc_id, .. }))
            | Ok(Some(EngineEvent::Synced { doc_id, .. }))
                if doc_id == doc =>
            {
                print_doc(client, doc)
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                warn!("lost connection to relay, reconnecting");
                client.connect_with_retry().await?;
            }
        }
    }
}

fn print_doc(client: &CollabClient, doc: &str) {
    println!("--- {}", doc);
    println!("{}", client.host().text(doc).unwrap_or_default());
}
