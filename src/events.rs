//! Session events.
//!
//! Every session publishes to one broadcast bus owned by its coordinator.
//! Subscribers are independent; a slow subscriber lags and loses events
//! instead of slowing the transfer down.

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::session::DccSession;

/// What happened.
#[derive(Clone, Debug)]
pub enum DccEventKind {
    /// A peer offered a session. `filename`/`size` are set for file offers.
    Request {
        filename: Option<String>,
        size: Option<u64>,
    },
    /// The socket is up and the transfer loop is starting.
    Start,
    LineReceived(String),
    LineSent(String),
    BlockReceived(Bytes),
    BlockSent(Bytes),
    /// The transfer loop ended. Fires once, after `Start`.
    Stop,
}

/// A session event with the session it belongs to.
#[derive(Clone, Debug)]
pub struct DccEvent {
    pub session: DccSession,
    pub kind: DccEventKind,
}

impl DccEvent {
    /// Block payload length for block events.
    pub fn block_len(&self) -> Option<usize> {
        match &self.kind {
            DccEventKind::BlockReceived(b) | DccEventKind::BlockSent(b) => Some(b.len()),
            _ => None,
        }
    }
}

/// Broadcast bus shared by a coordinator and its sessions.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<DccEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DccEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, session: DccSession, kind: DccEventKind) {
        // No subscribers is fine.
        let _ = self.tx.send(DccEvent { session, kind });
    }
}
