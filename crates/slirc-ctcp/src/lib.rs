//! # slirc-ctcp
//!
//! Wire-level support for CTCP and DCC negotiation on IRC.
//!
//! ## Features
//!
//! - CTCP framing (`\x01COMMAND params\x01`) parsing and formatting
//! - DCC negotiation requests (CHAT, SEND, RESUME, ACCEPT) with
//!   quote-aware parameter splitting
//! - IPv4 address packing used inside DCC parameters
//! - Optional tokio codec for newline-delimited DCC CHAT lines
//!
//! ## Quick Start
//!
//! ```rust
//! use slirc_ctcp::dcc::DccRequest;
//! use std::net::Ipv4Addr;
//!
//! let offer: DccRequest = "SEND \"notes.txt\" 2130706433 5000 1024".parse().unwrap();
//! match &offer {
//!     DccRequest::Send(send) => {
//!         assert_eq!(send.filename, "notes.txt");
//!         assert_eq!(send.host, Ipv4Addr::LOCALHOST);
//!         assert_eq!(send.port, 5000);
//!     }
//!     _ => unreachable!(),
//! }
//! assert_eq!(offer.to_string(), "SEND \"notes.txt\" 2130706433 5000 1024");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod addr;
pub mod ctcp;
pub mod dcc;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;

pub use self::addr::{decode_host, encode_host, parse_host};
pub use self::ctcp::{Ctcp, CtcpKind, CtcpOwned};
pub use self::dcc::{ack_bytes, split_params, ChatOffer, DccRequest, ResumePosition, SendOffer};
pub use self::error::{AddrError, DccParseError, LineError, ParseFailure};
#[cfg(feature = "tokio")]
pub use self::line::ChatLineCodec;
