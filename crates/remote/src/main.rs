// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! td-remote: WebSocket relay server for tandem collaborative editing.
//!
//! This server keeps the canonical text of every joined document, validates
//! each edit against it, and broadcasts accepted edits to the clients that
//! joined the document.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// td-remote: Collaborative editing relay server
#[derive(Parser, Debug)]
#[command(name = "td-remote")]
#[command(about = "WebSocket relay server for tandem collaborative editing")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Directory documents are loaded from on first join
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting td-remote server");
    info!("  Bind address: {}", args.bind);
    match &args.root {
        Some(root) => info!("  Document root: {}", root.display()),
        None => info!("  Document root: none (documents start empty)"),
    }

    let state = state::ServerState::new(args.root);

    server::run(args.bind, state).await?;

    Ok(())
}
