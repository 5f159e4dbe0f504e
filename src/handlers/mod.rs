//! CTCP request handlers.
//!
//! This module contains the [`CtcpHandler`] trait and the dispatch table
//! the coordinator consults for every inbound CTCP request. Keywords are
//! case-insensitive; the table stores them lowercased.

mod dcc;
mod info;

pub use dcc::DccHandler;
pub use info::{
    ClientInfoHandler, FingerHandler, PingHandler, SourceHandler, TimeHandler, UrlHandler,
    UserInfoHandler, VersionHandler,
};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use slirc_ctcp::{Ctcp, CtcpKind, CtcpOwned, split_params};

use crate::coordinator::DccCoordinator;
use crate::error::DccResult;

/// An inbound CTCP request, already unwrapped from its PRIVMSG.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtcpEvent {
    /// Nick of the sender.
    pub nick: String,
    /// CTCP keyword as received, e.g. `DCC` or `version`.
    pub command: String,
    /// Parameter tokens after the keyword, quotes removed.
    pub params: Vec<String>,
    /// Parameter text exactly as received, quotes and spacing intact.
    pub raw_params: String,
}

impl CtcpEvent {
    /// Build an event from tokens. The raw text is the tokens joined with
    /// single spaces.
    pub fn new(nick: impl Into<String>, command: impl Into<String>, params: Vec<String>) -> Self {
        let raw_params = params.join(" ");
        Self {
            nick: nick.into(),
            command: command.into(),
            params,
            raw_params,
        }
    }

    fn parsed(nick: &str, kind: &CtcpKind, raw: Option<&str>) -> Self {
        let raw = raw.unwrap_or_default();
        Self {
            nick: nick.to_owned(),
            command: kind.as_str().to_owned(),
            params: split_params(raw),
            raw_params: raw.to_owned(),
        }
    }

    /// Parse a PRIVMSG body. Returns `None` unless it is `\x01`-delimited.
    pub fn from_message(nick: &str, body: &str) -> Option<Self> {
        let ctcp = Ctcp::parse(body)?;
        Some(Self::parsed(nick, &ctcp.kind, ctcp.params))
    }

    /// Parse undelimited CTCP text such as `DCC CHAT chat 2130706433 5000`.
    pub fn from_text(nick: &str, text: &str) -> Option<Self> {
        let ctcp = CtcpOwned::from_text(text)?;
        Some(Self::parsed(nick, &ctcp.kind, ctcp.params.as_deref()))
    }

    pub fn kind(&self) -> CtcpKind {
        CtcpKind::parse(&self.command)
    }
}

/// Trait implemented by all CTCP request handlers.
#[async_trait]
pub trait CtcpHandler: Send + Sync {
    /// Handle one request. Errors are logged by the dispatcher.
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult;
}

/// Keyword to handler map.
#[derive(Clone)]
pub struct CtcpDispatchTable {
    handlers: HashMap<String, Arc<dyn CtcpHandler>>,
}

impl CtcpDispatchTable {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// DCC plus the informational commands.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();

        table.insert("DCC", Arc::new(DccHandler));

        // Informational replies
        table.insert("VERSION", Arc::new(VersionHandler));
        table.insert("CLIENTINFO", Arc::new(ClientInfoHandler));
        table.insert("PING", Arc::new(PingHandler));
        table.insert("TIME", Arc::new(TimeHandler));
        table.insert("USERINFO", Arc::new(UserInfoHandler));
        table.insert("URL", Arc::new(UrlHandler));
        table.insert("SOURCE", Arc::new(SourceHandler));
        table.insert("FINGER", Arc::new(FingerHandler));

        table
    }

    /// Register a handler, returning the one it replaces.
    pub fn insert(
        &mut self,
        keyword: &str,
        handler: Arc<dyn CtcpHandler>,
    ) -> Option<Arc<dyn CtcpHandler>> {
        self.handlers.insert(keyword.to_ascii_lowercase(), handler)
    }

    pub fn remove(&mut self, keyword: &str) -> Option<Arc<dyn CtcpHandler>> {
        self.handlers.remove(&keyword.to_ascii_lowercase())
    }

    pub fn get(&self, keyword: &str) -> Option<Arc<dyn CtcpHandler>> {
        self.handlers.get(&keyword.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.handlers.contains_key(&keyword.to_ascii_lowercase())
    }

    /// Registered keywords, uppercased and sorted.
    pub fn keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = self
            .handlers
            .keys()
            .map(|k| k.to_ascii_uppercase())
            .collect();
        keywords.sort();
        keywords
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CtcpDispatchTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
