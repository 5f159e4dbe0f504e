//! # slirc-dcc
//!
//! Direct Client-to-Client (DCC) chat and file transfer for IRC clients.
//!
//! DCC sessions are negotiated over CTCP on the IRC connection and then run
//! over their own TCP sockets. This crate owns the session side: a
//! [`DccCoordinator`] receives inbound CTCP requests, keeps the registry of
//! live sessions and publishes [`DccEvent`]s; the IRC layer supplies a
//! [`CtcpSender`] for outbound negotiation text.
//!
//! Wire formats (CTCP framing, DCC parameters, address packing, the chat
//! line codec) live in the `slirc-ctcp` crate.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod handlers;
pub mod loopback;
pub mod outbound;
pub mod session;

pub use config::{ConfigError, DccConfig};
pub use coordinator::DccCoordinator;
pub use error::{DccError, DccResult};
pub use events::{DccEvent, DccEventKind, EventBus};
pub use handlers::{CtcpDispatchTable, CtcpEvent, CtcpHandler};
pub use loopback::{LoopbackPair, LoopbackPeer, RelayedReply};
pub use outbound::{ChannelSender, CtcpDirection, CtcpSender, OutboundCtcp, Priority};
pub use session::{
    AckMode, DccChat, DccFile, DccSession, Direction, LocalStream, SessionCore, SessionId,
    SessionKind, SessionState,
};
