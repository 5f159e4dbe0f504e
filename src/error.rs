//! Unified error handling for slirc-dcc.
//!
//! Protocol-level problems caused by the peer never show up here: they are
//! answered with an `ERRMSG` CTCP reply and otherwise ignored. `DccError`
//! covers failures the local caller has to hear about.

use std::io;

use thiserror::Error;

use crate::session::SessionId;

/// Errors returned by session and coordinator operations.
#[derive(Debug, Error)]
pub enum DccError {
    #[error("DCC session {0} is not connected")]
    NotConnected(SessionId),

    #[error("DCC session {0} is already connected")]
    AlreadyConnected(SessionId),

    #[error("DCC session {0} is no longer valid")]
    Invalid(SessionId),

    #[error("DCC session {0} has no local stream attached")]
    NoStream(SessionId),

    #[error("DCC session {0} has no remote endpoint")]
    NoRemoteEndpoint(SessionId),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("chat line codec: {0}")]
    Line(#[from] slirc_ctcp::LineError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl DccError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected(_) => "not_connected",
            Self::AlreadyConnected(_) => "already_connected",
            Self::Invalid(_) => "invalid_session",
            Self::NoStream(_) => "no_stream",
            Self::NoRemoteEndpoint(_) => "no_remote_endpoint",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Line(_) => "line_codec",
            Self::Io(_) => "io_error",
        }
    }
}

/// Result type for DCC operations.
pub type DccResult<T = ()> = Result<T, DccError>;
