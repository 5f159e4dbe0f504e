//! CTCP (Client-to-Client Protocol) framing.
//!
//! CTCP messages ride inside PRIVMSG (requests) and NOTICE (replies),
//! delimited by `\x01`. DCC negotiation is one CTCP command among several
//! informational ones.
//!
//! # Reference
//! - CTCP specification: <https://modern.ircdocs.horse/ctcp.html>
//!
//! # Example
//!
//! ```
//! use slirc_ctcp::ctcp::{Ctcp, CtcpKind};
//!
//! let ctcp = Ctcp::parse("\x01DCC CHAT chat 2130706433 5000\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Dcc);
//! assert_eq!(ctcp.params, Some("CHAT chat 2130706433 5000"));
//!
//! let reply = Ctcp::errmsg("DCC missing parameters");
//! assert_eq!(reply.to_string(), "\x01ERRMSG DCC missing parameters\x01");
//! ```

use std::fmt;

/// The CTCP delimiter character (`\x01`).
pub const CTCP_DELIM: char = '\x01';

/// Known CTCP command types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// ACTION - `/me` style emote.
    Action,
    /// VERSION - client version information.
    Version,
    /// PING - round-trip latency probe, echoed back.
    Ping,
    /// TIME - local time of the client.
    Time,
    /// USERINFO - user-defined information.
    Userinfo,
    /// CLIENTINFO - list of supported CTCP commands.
    Clientinfo,
    /// SOURCE - where to obtain the client.
    Source,
    /// FINGER - legacy user information.
    Finger,
    /// URL - a URL associated with the user or client.
    Url,
    /// ERRMSG - error reply to a failed CTCP request.
    Errmsg,
    /// DCC - Direct Client-to-Client connection setup.
    Dcc,
    /// Unknown or custom CTCP command.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a CTCP command name into a `CtcpKind`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "TIME" => Self::Time,
            "USERINFO" => Self::Userinfo,
            "CLIENTINFO" => Self::Clientinfo,
            "SOURCE" => Self::Source,
            "FINGER" => Self::Finger,
            "URL" => Self::Url,
            "ERRMSG" => Self::Errmsg,
            "DCC" => Self::Dcc,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Returns the canonical uppercase name of this CTCP command.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Time => "TIME",
            Self::Userinfo => "USERINFO",
            Self::Clientinfo => "CLIENTINFO",
            Self::Source => "SOURCE",
            Self::Finger => "FINGER",
            Self::Url => "URL",
            Self::Errmsg => "ERRMSG",
            Self::Dcc => "DCC",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed CTCP message borrowing from the message body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command type.
    pub kind: CtcpKind,
    /// Optional parameters following the command.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a CTCP message from a PRIVMSG/NOTICE body.
    ///
    /// Returns `None` if the body is not a CTCP message. A missing trailing
    /// delimiter is tolerated.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);

        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.split_once(' ') {
            Some((command, params)) => (command, (!params.is_empty()).then_some(params)),
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body contains a CTCP message.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Create a DCC message (`\x01DCC <params>\x01`).
    pub fn dcc(params: &'a str) -> Self {
        Self {
            kind: CtcpKind::Dcc,
            params: Some(params),
        }
    }

    /// Create an ERRMSG reply.
    pub fn errmsg(reason: &'a str) -> Self {
        Self {
            kind: CtcpKind::Errmsg,
            params: Some(reason),
        }
    }

    /// Create a custom CTCP message.
    pub fn custom(command: &str, params: Option<&'a str>) -> Self {
        Self {
            kind: CtcpKind::parse(command),
            params,
        }
    }

    /// Convert into an owned message.
    pub fn to_owned_ctcp(&self) -> CtcpOwned {
        CtcpOwned {
            kind: self.kind.clone(),
            params: self.params.map(str::to_owned),
        }
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x01{}", self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {}", params)?;
        }
        write!(f, "\x01")
    }
}

/// An owned version of `Ctcp` for when lifetime management is needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtcpOwned {
    /// The CTCP command type.
    pub kind: CtcpKind,
    /// Optional parameters following the command.
    pub params: Option<String>,
}

impl CtcpOwned {
    /// Parse a CTCP message from a PRIVMSG/NOTICE body.
    pub fn parse(text: &str) -> Option<Self> {
        Ctcp::parse(text).map(|c| c.to_owned_ctcp())
    }

    /// Build from the unwrapped CTCP text (`"DCC SEND ..."`, no delimiters).
    ///
    /// This is the form outbound CTCP text takes before the IRC layer wraps
    /// it in `\x01`.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim_matches(CTCP_DELIM);
        if text.is_empty() {
            return None;
        }
        let (command, params) = match text.split_once(' ') {
            Some((command, params)) => (command, (!params.is_empty()).then(|| params.to_owned())),
            None => (text, None),
        };
        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }
}

impl fmt::Display for CtcpOwned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x01{}", self.kind)?;
        if let Some(ref params) = self.params {
            write!(f, " {}", params)?;
        }
        write!(f, "\x01")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dcc() {
        let ctcp = Ctcp::parse("\x01DCC SEND \"a b.txt\" 2130706433 0 12 7\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Dcc);
        assert_eq!(ctcp.params, Some("SEND \"a b.txt\" 2130706433 0 12 7"));
    }

    #[test]
    fn test_parse_version() {
        let ctcp = Ctcp::parse("\x01VERSION\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Version);
        assert_eq!(ctcp.params, None);
    }

    #[test]
    fn test_parse_unknown() {
        let ctcp = Ctcp::parse("\x01CUSTOM foo bar\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Unknown("CUSTOM".to_owned()));
        assert_eq!(ctcp.params, Some("foo bar"));
    }

    #[test]
    fn test_parse_case_insensitive() {
        let ctcp = Ctcp::parse("\x01dcc CHAT chat 1 2\x01").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Dcc);
    }

    #[test]
    fn test_parse_missing_trailing_delim() {
        let ctcp = Ctcp::parse("\x01PING 12345").unwrap();
        assert_eq!(ctcp.kind, CtcpKind::Ping);
        assert_eq!(ctcp.params, Some("12345"));
    }

    #[test]
    fn test_parse_not_ctcp() {
        assert!(Ctcp::parse("hello world").is_none());
        assert!(Ctcp::parse("").is_none());
        assert!(Ctcp::parse("\x01\x01").is_none());
    }

    #[test]
    fn test_errmsg_display() {
        let reply = Ctcp::errmsg("DCC Chat Parameter Error");
        assert_eq!(reply.to_string(), "\x01ERRMSG DCC Chat Parameter Error\x01");
    }

    #[test]
    fn test_owned_from_text() {
        let owned = CtcpOwned::from_text("URL").unwrap();
        assert_eq!(owned.kind, CtcpKind::Url);
        assert_eq!(owned.params, None);

        let owned = CtcpOwned::from_text("DCC ACCEPT \"x.bin\" 5000 400").unwrap();
        assert_eq!(owned.kind, CtcpKind::Dcc);
        assert_eq!(owned.params.as_deref(), Some("ACCEPT \"x.bin\" 5000 400"));
        assert_eq!(owned.to_string(), "\x01DCC ACCEPT \"x.bin\" 5000 400\x01");
    }

    #[test]
    fn test_all_kinds() {
        for name in [
            "ACTION", "VERSION", "PING", "TIME", "USERINFO", "CLIENTINFO", "SOURCE", "FINGER",
            "URL", "ERRMSG", "DCC",
        ] {
            assert_eq!(CtcpKind::parse(name).as_str(), name);
        }
    }
}
