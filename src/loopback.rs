//! In-process relay between two coordinators.
//!
//! Stands in for the IRC server: CTCP requests one side queues for the
//! other side's nick are parsed and dispatched there. CTCP replies are not
//! dispatched; they are forwarded to [`LoopbackPair::replies`] so callers
//! can see `ERRMSG` traffic.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

use crate::config::DccConfig;
use crate::coordinator::DccCoordinator;
use crate::handlers::CtcpEvent;
use crate::outbound::{ChannelSender, CtcpDirection, OutboundCtcp};

/// One side of a loopback pair.
#[derive(Clone)]
pub struct LoopbackPeer {
    pub nick: String,
    pub coordinator: Arc<DccCoordinator>,
}

/// A CTCP reply observed on the relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayedReply {
    /// Nick that sent the reply.
    pub from: String,
    pub message: OutboundCtcp,
}

/// Two coordinators wired to each other.
pub struct LoopbackPair {
    pub first: LoopbackPeer,
    pub second: LoopbackPeer,
    pub replies: mpsc::UnboundedReceiver<RelayedReply>,
    relays: Vec<JoinHandle<()>>,
}

impl LoopbackPair {
    /// Build both coordinators and start relaying. Must be called inside a
    /// tokio runtime.
    pub fn new(
        first_nick: &str,
        first_config: DccConfig,
        second_nick: &str,
        second_config: DccConfig,
    ) -> Self {
        let (first_sender, first_out) = ChannelSender::new();
        let (second_sender, second_out) = ChannelSender::new();
        let (reply_tx, replies) = mpsc::unbounded_channel();

        let first = LoopbackPeer {
            nick: first_nick.to_owned(),
            coordinator: Arc::new(DccCoordinator::new(first_config, Arc::new(first_sender))),
        };
        let second = LoopbackPeer {
            nick: second_nick.to_owned(),
            coordinator: Arc::new(DccCoordinator::new(second_config, Arc::new(second_sender))),
        };

        let relays = vec![
            spawn_relay(first_out, first.nick.clone(), second.clone(), reply_tx.clone()),
            spawn_relay(second_out, second.nick.clone(), first.clone(), reply_tx),
        ];

        Self {
            first,
            second,
            replies,
            relays,
        }
    }
}

impl Drop for LoopbackPair {
    fn drop(&mut self) {
        for relay in &self.relays {
            relay.abort();
        }
    }
}

fn spawn_relay(
    mut outbound: mpsc::UnboundedReceiver<OutboundCtcp>,
    from: String,
    to: LoopbackPeer,
    replies: mpsc::UnboundedSender<RelayedReply>,
) -> JoinHandle<()> {
    let span = info_span!("relay", from = %from, to = %to.nick);
    tokio::spawn(
        async move {
            while let Some(message) = outbound.recv().await {
                if !message.target.eq_ignore_ascii_case(&to.nick) {
                    debug!(target = %message.target, "Dropping CTCP for unknown nick");
                    continue;
                }
                match message.direction {
                    CtcpDirection::Request => match CtcpEvent::from_text(&from, &message.text) {
                        Some(event) => to.coordinator.dispatch(&event).await,
                        None => debug!("Dropping empty CTCP request"),
                    },
                    CtcpDirection::Reply => {
                        let _ = replies.send(RelayedReply {
                            from: from.clone(),
                            message,
                        });
                    }
                }
            }
        }
        .instrument(span),
    )
}
