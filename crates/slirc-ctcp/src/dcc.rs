//! DCC negotiation requests carried inside `CTCP DCC`.
//!
//! ```text
//! CHAT chat <host> <port> [<id>]
//! SEND "<file>" <host> <port> [<size>] [<id>]
//! RESUME "<file>" <port> <offset> [<id>]
//! ACCEPT "<file>" <port> <offset> [<id>]
//! ```
//!
//! A port of `0` marks a passive offer; the trailing id lets the offerer
//! recognise the peer's answer. `host` is the packed IPv4 integer from
//! [`crate::addr`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1},
    character::complete::char,
    combinator::opt,
    sequence::delimited,
    IResult,
};

use crate::addr::{encode_host, parse_host};
use crate::ctcp::CTCP_DELIM;
use crate::error::{DccParseError, ParseFailure};

/// mIRC appends this where a passive id would go; it is not an id.
pub const TOKEN_MARKER: &str = "T";

/// `DCC CHAT` offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatOffer {
    /// Offerer's address.
    pub host: Ipv4Addr,
    /// Offerer's listening port, `0` when passive.
    pub port: u16,
    /// Passive correlation id.
    pub token: Option<u64>,
}

/// `DCC SEND` offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendOffer {
    /// File name without quotes.
    pub filename: String,
    /// Offerer's address.
    pub host: Ipv4Addr,
    /// Offerer's listening port, `0` when passive.
    pub port: u16,
    /// Announced size, `0` when unknown.
    pub size: u64,
    /// Passive correlation id.
    pub token: Option<u64>,
}

/// `DCC RESUME` / `DCC ACCEPT` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumePosition {
    /// File name without quotes.
    pub filename: String,
    /// Port from the original offer.
    pub port: u16,
    /// Byte offset to continue from.
    pub offset: u64,
    /// Passive correlation id, echoed from RESUME into ACCEPT.
    pub token: Option<u64>,
}

/// A validated DCC negotiation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DccRequest {
    /// Line based chat offer.
    Chat(ChatOffer),
    /// File offer.
    Send(SendOffer),
    /// Receiver asks to continue a transfer at an offset.
    Resume(ResumePosition),
    /// Sender confirms a RESUME.
    Accept(ResumePosition),
}

impl DccRequest {
    /// Subcommand keyword.
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Chat(_) => "CHAT",
            Self::Send(_) => "SEND",
            Self::Resume(_) => "RESUME",
            Self::Accept(_) => "ACCEPT",
        }
    }

    /// Build from already split parameters (`params[0]` is the subcommand).
    pub fn from_params<S: AsRef<str>>(params: &[S]) -> Result<Self, DccParseError> {
        let Some(sub) = params.first() else {
            return Err(DccParseError::new(ParseFailure::Missing, ""));
        };
        let sub = sub.as_ref();
        let args: Vec<&str> = params[1..].iter().map(AsRef::as_ref).collect();

        match sub.to_ascii_uppercase().as_str() {
            "CHAT" => parse_chat(&args).map(Self::Chat),
            "SEND" => parse_send(&args).map(Self::Send),
            "RESUME" => parse_position("RESUME", &args).map(Self::Resume),
            "ACCEPT" => parse_position("ACCEPT", &args).map(Self::Accept),
            "XMIT" => Err(DccParseError::new(ParseFailure::Unsupported, "XMIT")),
            _ => Err(DccParseError::new(ParseFailure::Unknown, sub)),
        }
    }

    /// Full CTCP text including the `DCC` keyword, without delimiters.
    pub fn to_ctcp_text(&self) -> String {
        format!("DCC {}", self)
    }
}

impl FromStr for DccRequest {
    type Err = DccParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_params(&split_params(s))
    }
}

impl fmt::Display for DccRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(chat) => {
                write!(f, "CHAT chat {} {}", encode_host(chat.host), chat.port)?;
                write_token(f, chat.token)
            }
            Self::Send(send) => {
                write!(
                    f,
                    "SEND \"{}\" {} {} {}",
                    send.filename,
                    encode_host(send.host),
                    send.port,
                    send.size
                )?;
                write_token(f, send.token)
            }
            Self::Resume(pos) | Self::Accept(pos) => {
                write!(
                    f,
                    "{} \"{}\" {} {}",
                    self.subcommand(),
                    pos.filename,
                    pos.port,
                    pos.offset
                )?;
                write_token(f, pos.token)
            }
        }
    }
}

fn write_token(f: &mut fmt::Formatter<'_>, token: Option<u64>) -> fmt::Result {
    match token {
        Some(token) => write!(f, " {}", token),
        None => Ok(()),
    }
}

fn parse_chat(args: &[&str]) -> Result<ChatOffer, DccParseError> {
    let malformed = || DccParseError::new(ParseFailure::Malformed, "CHAT");
    if args.len() < 3 {
        return Err(DccParseError::new(ParseFailure::NotEnoughParams, "CHAT"));
    }
    if !args[0].eq_ignore_ascii_case("chat") {
        return Err(malformed());
    }
    Ok(ChatOffer {
        host: parse_host(args[1]).map_err(|_| malformed())?,
        port: args[2].parse().map_err(|_| malformed())?,
        token: parse_token(args.get(3).copied()).ok_or_else(malformed)?,
    })
}

fn parse_send(args: &[&str]) -> Result<SendOffer, DccParseError> {
    let malformed = || DccParseError::new(ParseFailure::Malformed, "SEND");
    if args.len() < 3 {
        return Err(DccParseError::new(ParseFailure::NotEnoughParams, "SEND"));
    }
    let size = match args.get(3) {
        Some(size) => size.parse().map_err(|_| malformed())?,
        None => 0,
    };
    Ok(SendOffer {
        filename: unquote(args[0]),
        host: parse_host(args[1]).map_err(|_| malformed())?,
        port: args[2].parse().map_err(|_| malformed())?,
        size,
        token: parse_token(args.get(4).copied()).ok_or_else(malformed)?,
    })
}

fn parse_position(sub: &'static str, args: &[&str]) -> Result<ResumePosition, DccParseError> {
    let malformed = || DccParseError::new(ParseFailure::Malformed, sub);
    if args.len() < 3 {
        return Err(DccParseError::new(ParseFailure::NotEnoughParams, sub));
    }
    Ok(ResumePosition {
        filename: unquote(args[0]),
        port: args[1].parse().map_err(|_| malformed())?,
        offset: args[2].parse().map_err(|_| malformed())?,
        token: parse_token(args.get(3).copied()).ok_or_else(malformed)?,
    })
}

/// `None` when the token is present but not numeric.
fn parse_token(token: Option<&str>) -> Option<Option<u64>> {
    match token {
        None => Some(None),
        Some(TOKEN_MARKER) => Some(None),
        Some(text) => text.parse().ok().map(Some),
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches('"').to_owned()
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_till(|c| c == '"'), opt(char('"')))(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    take_till1(|c| c == ' ')(input)
}

/// Split CTCP parameters on spaces, keeping double-quoted runs together.
///
/// Quotes are removed from quoted tokens and stray `\x01` markers are
/// dropped, so `SEND "my file.txt" 1 2 3\x01` yields
/// `["SEND", "my file.txt", "1", "2", "3"]`.
pub fn split_params(text: &str) -> Vec<String> {
    let text: String = text.chars().filter(|&c| c != CTCP_DELIM).collect();
    let mut params = Vec::new();
    let mut rest = text.as_str();

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        match alt((quoted, bare))(rest) {
            Ok((remaining, param)) => {
                params.push(param.to_owned());
                rest = remaining;
            }
            Err(_) => break,
        }
    }

    params
}

/// Acknowledgement sent by a non-Turbo receiver after each block: the low
/// 32 bits of the running byte total, big-endian.
#[inline]
pub fn ack_bytes(total: u64) -> [u8; 4] {
    ((total & 0xFFFF_FFFF) as u32).to_be_bytes()
}
