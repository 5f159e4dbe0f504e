//! Session registry and CTCP entry point.
//!
//! The coordinator owns every live session, hands inbound CTCP requests to
//! the dispatch table, and starts outbound chats and transfers.
//!
//! # Thread Safety
//!
//! The registry is a `DashMap` keyed by session id. Routing iterates over a
//! snapshot, so sessions can finish or be evicted while a request is being
//! matched. The dispatch table sits behind a `parking_lot::RwLock`; the lock
//! is released before a handler runs.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::DccConfig;
use crate::error::{DccError, DccResult};
use crate::events::{DccEvent, DccEventKind, EventBus};
use crate::handlers::{CtcpDispatchTable, CtcpEvent, CtcpHandler};
use crate::outbound::{CtcpSender, Priority};
use crate::session::{
    AckMode, DccChat, DccFile, DccSession, LocalStream, SessionContext, SessionId,
};

/// Owner of all DCC sessions for one IRC identity.
pub struct DccCoordinator {
    sessions: DashMap<SessionId, DccSession>,
    handlers: RwLock<CtcpDispatchTable>,
    ctx: SessionContext,
}

impl DccCoordinator {
    /// Create a coordinator with the default CTCP handlers installed.
    pub fn new(config: DccConfig, sender: Arc<dyn CtcpSender>) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            sessions: DashMap::new(),
            handlers: RwLock::new(CtcpDispatchTable::with_defaults()),
            ctx: SessionContext {
                sender,
                events,
                config: Arc::new(config),
            },
        }
    }

    pub fn config(&self) -> &DccConfig {
        &self.ctx.config
    }

    pub fn sender(&self) -> &Arc<dyn CtcpSender> {
        &self.ctx.sender
    }

    /// Subscribe to events from every session.
    pub fn subscribe(&self) -> broadcast::Receiver<DccEvent> {
        self.ctx.events.subscribe()
    }

    pub(crate) fn session_context(&self) -> SessionContext {
        self.ctx.clone()
    }

    /// Snapshot of the registry.
    pub fn sessions(&self) -> Vec<DccSession> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn session(&self, id: SessionId) -> Option<DccSession> {
        self.sessions.get(&id).map(|e| e.value().clone())
    }

    /// Offer a chat to `user`.
    pub async fn initiate_chat(
        &self,
        user: &str,
        passive: bool,
        priority: Priority,
    ) -> DccResult<Arc<DccChat>> {
        if user.is_empty() {
            return Err(DccError::InvalidArgument("empty nick"));
        }
        let (chat, offer) = DccChat::outgoing(self.session_context(), user, passive).await?;
        info!(session = chat.core().id(), %user, passive, "DCC CHAT initiated");
        self.register(DccSession::Chat(chat.clone()));
        self.ctx.sender.send_ctcp(user, &offer.to_ctcp_text(), priority);
        self.evict_invalid();
        Ok(chat)
    }

    /// Offer a file read from `stream` to `user`.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_file(
        &self,
        user: &str,
        stream: LocalStream,
        filename: &str,
        size: u64,
        ack_mode: AckMode,
        passive: bool,
        priority: Priority,
    ) -> DccResult<Arc<DccFile>> {
        if user.is_empty() {
            return Err(DccError::InvalidArgument("empty nick"));
        }
        if filename.is_empty() {
            return Err(DccError::InvalidArgument("empty filename"));
        }
        // The quoted filename parameter has no escape for `"`.
        if filename.contains('"') {
            return Err(DccError::InvalidArgument("filename contains a double quote"));
        }
        let (file, offer) = DccFile::outgoing(
            self.session_context(),
            user,
            stream,
            filename,
            size,
            ack_mode,
            passive,
        )
        .await?;
        info!(session = file.core().id(), %user, filename, size, passive, "DCC SEND initiated");
        self.register(DccSession::File(file.clone()));
        self.ctx.sender.send_ctcp(user, &offer.to_ctcp_text(), priority);
        self.evict_invalid();
        Ok(file)
    }

    /// Offer the file at `path`, named by its last component.
    pub async fn send_path(
        &self,
        user: &str,
        path: impl AsRef<Path>,
        passive: bool,
    ) -> DccResult<Arc<DccFile>> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(DccError::InvalidArgument("path has no file name"))?
            .to_owned();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        self.send_file(
            user,
            LocalStream::from(file),
            &filename,
            size,
            self.config().default_ack_mode,
            passive,
            Priority::Medium,
        )
        .await
    }

    /// Route one inbound CTCP request, then drop finished sessions.
    #[instrument(skip(self, event), fields(nick = %event.nick, command = %event.command))]
    pub async fn dispatch(&self, event: &CtcpEvent) {
        let handler = self.handlers.read().get(&event.command);
        match handler {
            Some(handler) => {
                if let Err(e) = handler.handle(self, event).await {
                    warn!(error = %e, code = e.error_code(), "CTCP handler failed");
                }
            }
            None => debug!("No handler for CTCP request"),
        }
        self.evict_invalid();
    }

    /// Register `handler` for `keyword`, returning the one it replaces.
    pub fn register_ctcp_handler(
        &self,
        keyword: &str,
        handler: Arc<dyn CtcpHandler>,
    ) -> Option<Arc<dyn CtcpHandler>> {
        self.handlers.write().insert(keyword, handler)
    }

    pub fn remove_ctcp_handler(&self, keyword: &str) -> Option<Arc<dyn CtcpHandler>> {
        self.handlers.write().remove(keyword)
    }

    /// Registered CTCP keywords, uppercased and sorted.
    pub fn ctcp_keywords(&self) -> Vec<String> {
        self.handlers.read().keywords()
    }

    /// Remove sessions that are neither valid nor connected.
    ///
    /// Returns how many were removed.
    pub fn evict_invalid(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_valid() || session.is_connected());
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "Evicted finished DCC sessions");
        }
        evicted
    }

    /// Add a session and start its lifecycle task.
    pub(crate) fn register(&self, session: DccSession) {
        self.sessions.insert(session.id(), session.clone());
        session.spawn();
    }

    /// Add an inbound session, announce it, then start it.
    pub(crate) fn register_pending(&self, session: DccSession, request: DccEventKind) {
        self.sessions.insert(session.id(), session.clone());
        session.emit(request);
        session.spawn();
    }

    /// Send an `ERRMSG` reply to `nick`.
    pub(crate) fn reply_error(&self, nick: &str, text: &str) {
        self.ctx
            .sender
            .send_ctcp_reply(nick, text, Priority::Medium);
    }
}
