//! Error types for the CTCP/DCC wire layer.
//!
//! Parse failures carry enough context to be rendered back to the peer as
//! an `ERRMSG` CTCP reply without any further lookup.

use std::fmt;
use std::io;

use thiserror::Error;

/// Errors raised while converting DCC host integers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AddrError {
    /// The address is not IPv4; DCC integers only carry IPv4.
    #[error("DCC addresses must be IPv4, got {0}")]
    NotIpv4(std::net::IpAddr),

    /// The decimal text could not be parsed as an integer.
    #[error("invalid DCC host integer: {0:?}")]
    Unparsable(String),

    /// The integer does not fit in 32 unsigned bits.
    #[error("DCC host integer out of range: {0}")]
    OutOfRange(i64),
}

/// Which class of parameter failure a DCC request hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseFailure {
    /// No subcommand at all.
    Missing,
    /// Fewer tokens than the subcommand requires.
    NotEnoughParams,
    /// A numeric field (address, port, size, offset) failed to parse, or a
    /// fixed keyword did not match.
    Malformed,
    /// XMIT is recognised but not implemented.
    Unsupported,
    /// Subcommand is not known at all.
    Unknown,
}

/// A DCC request that could not be turned into a [`crate::dcc::DccRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", self.reason())]
pub struct DccParseError {
    /// Failure class.
    pub failure: ParseFailure,
    /// Subcommand as received (upper-cased when recognised).
    pub subcommand: String,
}

impl DccParseError {
    pub(crate) fn new(failure: ParseFailure, subcommand: impl Into<String>) -> Self {
        Self {
            failure,
            subcommand: subcommand.into(),
        }
    }

    /// Human readable reason, as carried after `ERRMSG DCC`.
    pub fn reason(&self) -> String {
        let name = Titled(&self.subcommand);
        match self.failure {
            ParseFailure::Missing => "missing parameters".to_owned(),
            ParseFailure::NotEnoughParams => format!("{name} not enough parameters"),
            ParseFailure::Malformed => format!("{name} Parameter Error"),
            ParseFailure::Unsupported => format!("{} not implemented", self.subcommand),
            ParseFailure::Unknown => format!("{} unavailable", self.subcommand),
        }
    }

    /// Full CTCP reply text (`ERRMSG DCC <reason>`).
    pub fn errmsg(&self) -> String {
        format!("ERRMSG DCC {}", self.reason())
    }

    /// Static label for logging.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self.failure {
            ParseFailure::Missing => "missing",
            ParseFailure::NotEnoughParams => "not_enough_params",
            ParseFailure::Malformed => "malformed",
            ParseFailure::Unsupported => "unsupported",
            ParseFailure::Unknown => "unknown",
        }
    }
}

/// "SEND" -> "Send"
struct Titled<'a>(&'a str);

impl fmt::Display for Titled<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.0.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}", first.to_ascii_uppercase())?;
            for ch in chars {
                write!(f, "{}", ch.to_ascii_lowercase())?;
            }
        }
        Ok(())
    }
}

/// Errors produced by the chat line codec.
#[derive(Debug, Error)]
pub enum LineError {
    /// An I/O error occurred.
    #[error("an io error occurred")]
    Io(#[from] io::Error),

    /// Line exceeds the configured maximum length.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Actual length in bytes.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Outgoing text holds a line break, so it would reach the peer as
    /// more than one line.
    #[error("line contains a line break")]
    EmbeddedLineBreak,

    /// Encoding label not known to encoding_rs.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_match_peer_visible_text() {
        let short = DccParseError::new(ParseFailure::NotEnoughParams, "CHAT");
        assert_eq!(short.errmsg(), "ERRMSG DCC Chat not enough parameters");

        let bad = DccParseError::new(ParseFailure::Malformed, "SEND");
        assert_eq!(bad.errmsg(), "ERRMSG DCC Send Parameter Error");

        let missing = DccParseError::new(ParseFailure::Missing, "");
        assert_eq!(missing.errmsg(), "ERRMSG DCC missing parameters");

        let xmit = DccParseError::new(ParseFailure::Unsupported, "XMIT");
        assert_eq!(xmit.errmsg(), "ERRMSG DCC XMIT not implemented");

        let other = DccParseError::new(ParseFailure::Unknown, "FOO");
        assert_eq!(other.errmsg(), "ERRMSG DCC FOO unavailable");
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            DccParseError::new(ParseFailure::Malformed, "RESUME").error_code(),
            "malformed"
        );
    }
}
