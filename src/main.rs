//! slirc-dcc - loopback DCC transfer.
//!
//! Sends a file from one in-process client to another over real DCC
//! sockets, with CTCP negotiation relayed in memory.
//!
//! ```text
//! slirc-dcc <file> [config.toml]
//! ```

use std::path::PathBuf;

use anyhow::Context;
use slirc_dcc::{DccConfig, DccEventKind, LocalStream, LoopbackPair};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let source = PathBuf::from(
        args.next()
            .context("usage: slirc-dcc <file> [config.toml]")?,
    );

    // Load configuration
    let config = match args.next() {
        Some(path) => DccConfig::load(&path).map_err(|e| {
            error!(path = %path, error = %e, "Failed to load config");
            e
        })?,
        None => DccConfig::default(),
    };

    let destination = {
        let mut name = source
            .file_name()
            .context("source has no file name")?
            .to_os_string();
        name.push(".received");
        source.with_file_name(name)
    };

    let pair = LoopbackPair::new("alice", config.clone(), "bob", config);
    let alice = pair.first.coordinator.clone();
    let bob = pair.second.coordinator.clone();
    let mut bob_events = bob.subscribe();

    let offer = alice.send_path(&pair.second.nick, &source, false).await?;
    info!(
        session = offer.core().id(),
        file = %source.display(),
        size = offer.size(),
        "Offered file"
    );

    loop {
        let event = match bob_events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Event subscriber lagged");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match event.kind {
            DccEventKind::Request { filename, size } => {
                let Some(file) = event.session.as_file() else {
                    event.session.reject();
                    continue;
                };
                info!(?filename, ?size, to = %destination.display(), "Accepting transfer");
                let local = tokio::fs::File::create(&destination).await?;
                file.accept_request(Some(LocalStream::from(local)), 0).await?;
            }
            DccEventKind::Start => info!(session = event.session.id(), "Transfer started"),
            DccEventKind::Stop => {
                let received = event
                    .session
                    .as_file()
                    .map(|file| file.bytes_transferred())
                    .unwrap_or_default();
                info!(received, expected = offer.size(), "Transfer finished");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
