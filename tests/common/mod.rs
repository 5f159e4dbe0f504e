//! Integration test common infrastructure.
//!
//! Helpers for waiting on session events and outbound CTCP with a timeout,
//! so a broken handshake fails the test instead of hanging it.

#![allow(dead_code)]

use std::time::Duration;

use slirc_dcc::{DccConfig, DccEvent, DccEventKind, OutboundCtcp, SessionId};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

/// Upper bound for any single wait.
pub const WAIT: Duration = Duration::from_secs(5);

/// Config with a short passive poll and small blocks, so transfers take
/// several blocks and rejections are noticed quickly.
pub fn fast_config() -> DccConfig {
    DccConfig {
        passive_poll_interval_ms: 10,
        block_size: 256,
        upload_linger_ms: 200,
        ..DccConfig::default()
    }
}

/// Deterministic file content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Wait for the first event matching `predicate`.
pub async fn next_event<F>(
    rx: &mut broadcast::Receiver<DccEvent>,
    mut predicate: F,
) -> anyhow::Result<DccEvent>
where
    F: FnMut(&DccEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await?;
            if predicate(&event) {
                return anyhow::Ok(event);
            }
        }
    })
    .await?
}

pub fn is_request(event: &DccEvent) -> bool {
    matches!(event.kind, DccEventKind::Request { .. })
}

pub fn is_start(id: SessionId) -> impl Fn(&DccEvent) -> bool {
    move |event| event.session.id() == id && matches!(event.kind, DccEventKind::Start)
}

pub fn is_stop(id: SessionId) -> impl Fn(&DccEvent) -> bool {
    move |event| event.session.id() == id && matches!(event.kind, DccEventKind::Stop)
}

/// Collect every event of session `id` up to and including its `Stop`.
pub async fn until_stop(
    rx: &mut broadcast::Receiver<DccEvent>,
    id: SessionId,
) -> anyhow::Result<Vec<DccEvent>> {
    let mut seen = Vec::new();
    next_event(rx, |event| {
        if event.session.id() != id {
            return false;
        }
        seen.push(event.clone());
        matches!(event.kind, DccEventKind::Stop)
    })
    .await?;
    Ok(seen)
}

/// Total payload of the block events in `events`.
pub fn block_total(events: &[DccEvent]) -> usize {
    events.iter().filter_map(DccEvent::block_len).sum()
}

/// Next outbound CTCP message.
pub async fn next_ctcp(rx: &mut mpsc::UnboundedReceiver<OutboundCtcp>) -> anyhow::Result<OutboundCtcp> {
    timeout(WAIT, rx.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("outbound channel closed"))
}

/// Poll `condition` until it holds.
pub async fn wait_until<F>(mut condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}
