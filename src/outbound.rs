//! Outbound CTCP capability.
//!
//! The DCC core never talks to the IRC server itself. It hands negotiation
//! text to a [`CtcpSender`], which the IRC layer implements by wrapping the
//! text in `\x01` and queueing a PRIVMSG (request) or NOTICE (reply).

use tokio::sync::mpsc;
use tracing::warn;

/// Ordering hint for the IRC layer's outbound queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    BelowMedium,
    #[default]
    Medium,
    AboveMedium,
    High,
    Critical,
}

/// Whether outbound CTCP text is a request or a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CtcpDirection {
    /// Sent as PRIVMSG.
    Request,
    /// Sent as NOTICE.
    Reply,
}

/// One queued outbound CTCP message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundCtcp {
    pub target: String,
    pub direction: CtcpDirection,
    /// CTCP text without delimiters, e.g. `DCC CHAT chat 2130706433 5000`.
    pub text: String,
    pub priority: Priority,
}

/// Capability to emit CTCP text to a nick. Fire-and-forget.
pub trait CtcpSender: Send + Sync {
    fn send_ctcp(&self, target: &str, text: &str, priority: Priority);

    fn send_ctcp_reply(&self, target: &str, text: &str, priority: Priority);
}

/// [`CtcpSender`] backed by an unbounded channel.
///
/// The receiving half is drained by whatever owns the IRC connection.
#[derive(Clone, Debug)]
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<OutboundCtcp>,
}

impl ChannelSender {
    /// Create a sender and the receiver the IRC layer drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundCtcp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, target: &str, direction: CtcpDirection, text: &str, priority: Priority) {
        let msg = OutboundCtcp {
            target: target.to_owned(),
            direction,
            text: text.to_owned(),
            priority,
        };
        if self.tx.send(msg).is_err() {
            warn!(%target, "Outbound CTCP dropped: IRC layer is gone");
        }
    }
}

impl CtcpSender for ChannelSender {
    fn send_ctcp(&self, target: &str, text: &str, priority: Priority) {
        self.push(target, CtcpDirection::Request, text, priority);
    }

    fn send_ctcp_reply(&self, target: &str, text: &str, priority: Priority) {
        self.push(target, CtcpDirection::Reply, text, priority);
    }
}
