//! DCC sessions.
//!
//! A session is either a [`DccChat`] or a [`DccFile`]; both embed a
//! [`SessionCore`] holding identity, endpoints and lifecycle flags.
//! [`DccSession`] is the tagged handle the registry and events pass around.
//!
//! # Lifecycle
//!
//! ```text
//! Created -> AwaitingPeer -> Connected -> Transferring -> Closed
//!     \            \
//!      `------------`--> Invalid
//! ```
//!
//! Each registered session runs as its own tokio task: wait for the peer,
//! emit `Start`, run the chat or file loop, emit `Stop`.

mod chat;
mod file;

pub use chat::DccChat;
pub use file::{AckMode, DccFile, Direction, LocalIo, LocalStream, SeekableIo};
pub(crate) use file::ResumeOutcome;

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::DccConfig;
use crate::error::{DccError, DccResult};
use crate::events::{DccEventKind, EventBus};
use crate::outbound::CtcpSender;

/// Process-unique session identifier.
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    AwaitingPeer,
    Connected,
    Transferring,
    Closed,
    Invalid,
}

impl SessionState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Invalid)
    }
}

/// Session variant tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Chat,
    File,
}

/// Services a session borrows from its coordinator.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub sender: Arc<dyn CtcpSender>,
    pub events: EventBus,
    pub config: Arc<DccConfig>,
}

enum Link {
    Idle,
    Listening(TcpListener),
    Established(TcpStream),
}

/// State shared by every session variant.
pub struct SessionCore {
    id: SessionId,
    remote_user: String,
    external_address: Ipv4Addr,
    /// We sent a port-0 offer and expect the peer to listen.
    passive_offer: bool,
    state: Mutex<SessionState>,
    valid: AtomicBool,
    connected: AtomicBool,
    rejected: AtomicBool,
    local_endpoint: Mutex<Option<SocketAddr>>,
    remote_endpoint: Mutex<Option<SocketAddr>>,
    link: Mutex<Link>,
    closed: CancellationToken,
    pub(crate) ctx: SessionContext,
}

impl SessionCore {
    pub(crate) fn new(ctx: SessionContext, remote_user: &str, passive_offer: bool) -> Self {
        Self {
            id: next_session_id(),
            remote_user: remote_user.to_owned(),
            external_address: ctx.config.external_address,
            passive_offer,
            state: Mutex::new(SessionState::Created),
            valid: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            rejected: AtomicBool::new(false),
            local_endpoint: Mutex::new(None),
            remote_endpoint: Mutex::new(None),
            link: Mutex::new(Link::Idle),
            closed: CancellationToken::new(),
            ctx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn remote_user(&self) -> &str {
        &self.remote_user
    }

    pub fn external_address(&self) -> Ipv4Addr {
        self.external_address
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    pub fn local_endpoint(&self) -> Option<SocketAddr> {
        *self.local_endpoint.lock()
    }

    pub fn remote_endpoint(&self) -> Option<SocketAddr> {
        *self.remote_endpoint.lock()
    }

    /// Abandon a pending handshake. Only observed while waiting for the peer.
    pub fn reject(&self) {
        self.rejected.store(true, Ordering::Release);
    }

    /// Close the session: stops a pending accept or a running transfer.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.closed.cancel();
    }

    /// Locally offered passive session still waiting for the peer's answer.
    pub(crate) fn awaits_reverse_offer(&self) -> bool {
        self.passive_offer
            && self.is_valid()
            && !self.is_connected()
            && matches!(*self.link.lock(), Link::Idle)
    }

    pub(crate) fn set_remote(&self, addr: SocketAddr) {
        *self.remote_endpoint.lock() = Some(addr);
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = next;
        }
    }

    /// Fails unless the session can still be connected.
    pub(crate) fn ensure_pending(&self) -> DccResult {
        if !self.is_valid() {
            return Err(DccError::Invalid(self.id));
        }
        if self.is_connected() || matches!(*self.link.lock(), Link::Established(_)) {
            return Err(DccError::AlreadyConnected(self.id));
        }
        Ok(())
    }

    /// Open a listening socket for the peer to connect to.
    ///
    /// Returns the port to advertise.
    pub(crate) async fn listen(&self) -> io::Result<u16> {
        let bind = SocketAddr::new(self.ctx.config.bind_address, 0);
        let listener = TcpListener::bind(bind).await?;
        let local = listener.local_addr()?;
        debug!(session = self.id, %local, "DCC listener bound");

        *self.local_endpoint.lock() = Some(local);
        *self.link.lock() = Link::Listening(listener);
        self.set_state(SessionState::AwaitingPeer);
        Ok(local.port())
    }

    /// Connect out to the remote endpoint.
    pub(crate) async fn connect(&self) -> DccResult {
        let remote = self
            .remote_endpoint()
            .ok_or(DccError::NoRemoteEndpoint(self.id))?;
        let stream = TcpStream::connect(remote).await?;
        debug!(session = self.id, %remote, "DCC connection established");

        *self.local_endpoint.lock() = stream.local_addr().ok();
        *self.link.lock() = Link::Established(stream);
        self.connected.store(true, Ordering::Release);
        self.set_state(SessionState::Connected);
        Ok(())
    }

    /// Wait until a socket is available: accept on our listener, pick up
    /// an outbound connection made elsewhere, or give up on rejection.
    async fn await_peer(&self) -> Option<TcpStream> {
        self.set_state(SessionState::AwaitingPeer);
        let interval = self.ctx.config.passive_poll_interval();

        loop {
            let pending = {
                let mut link = self.link.lock();
                match *link {
                    Link::Idle => None,
                    _ => Some(std::mem::replace(&mut *link, Link::Idle)),
                }
            };

            match pending {
                Some(Link::Established(stream)) => return Some(stream),
                Some(Link::Listening(listener)) => return self.accept(listener).await,
                _ => {}
            }

            if self.is_rejected() || self.closed.is_cancelled() || !self.is_valid() {
                debug!(session = self.id, "Pending DCC session abandoned");
                self.invalidate();
                return None;
            }

            tokio::time::sleep(interval).await;
        }
    }

    async fn accept(&self, listener: TcpListener) -> Option<TcpStream> {
        let accepted = tokio::select! {
            _ = self.closed.cancelled() => None,
            res = listener.accept() => Some(res),
        };
        // The listener is dropped here; one connection per session.
        match accepted {
            Some(Ok((stream, addr))) => {
                debug!(session = self.id, %addr, "DCC peer connected");
                self.set_remote(addr);
                self.connected.store(true, Ordering::Release);
                self.set_state(SessionState::Connected);
                Some(stream)
            }
            Some(Err(e)) => {
                warn!(session = self.id, error = %e, "DCC accept failed");
                self.invalidate();
                None
            }
            None => {
                self.invalidate();
                None
            }
        }
    }

    /// Permanently mark the session unusable without running it.
    pub(crate) fn invalidate(&self) {
        self.connected.store(false, Ordering::Release);
        self.valid.store(false, Ordering::Release);
        *self.link.lock() = Link::Idle;
        *self.state.lock() = SessionState::Invalid;
    }

    fn begin_transfer(&self) {
        self.set_state(SessionState::Transferring);
    }

    fn finish(&self) {
        // connected drops first so `connected => valid` holds throughout.
        self.connected.store(false, Ordering::Release);
        self.valid.store(false, Ordering::Release);
        self.set_state(SessionState::Closed);
    }

    pub(crate) fn closed(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

impl fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCore")
            .field("id", &self.id)
            .field("remote_user", &self.remote_user)
            .field("state", &self.state())
            .field("valid", &self.is_valid())
            .field("connected", &self.is_connected())
            .field("local_endpoint", &self.local_endpoint())
            .field("remote_endpoint", &self.remote_endpoint())
            .finish()
    }
}

/// Handle to a registered session.
#[derive(Clone)]
pub enum DccSession {
    Chat(Arc<DccChat>),
    File(Arc<DccFile>),
}

impl DccSession {
    pub fn core(&self) -> &SessionCore {
        match self {
            Self::Chat(chat) => chat.core(),
            Self::File(file) => file.core(),
        }
    }

    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Chat(_) => SessionKind::Chat,
            Self::File(_) => SessionKind::File,
        }
    }

    pub fn id(&self) -> SessionId {
        self.core().id()
    }

    pub fn remote_user(&self) -> &str {
        self.core().remote_user()
    }

    pub fn is_valid(&self) -> bool {
        self.core().is_valid()
    }

    pub fn is_connected(&self) -> bool {
        self.core().is_connected()
    }

    pub fn state(&self) -> SessionState {
        self.core().state()
    }

    pub fn reject(&self) {
        self.core().reject()
    }

    pub fn close(&self) {
        self.core().close()
    }

    pub fn as_chat(&self) -> Option<&Arc<DccChat>> {
        match self {
            Self::Chat(chat) => Some(chat),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<DccFile>> {
        match self {
            Self::File(file) => Some(file),
            Self::Chat(_) => None,
        }
    }

    /// Both handles point at the same session object.
    pub fn same_session(&self, other: &DccSession) -> bool {
        match (self, other) {
            (Self::Chat(a), Self::Chat(b)) => Arc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub(crate) fn emit(&self, kind: DccEventKind) {
        self.core().ctx.events.emit(self.clone(), kind);
    }

    /// Run the lifecycle on its own task.
    pub(crate) fn spawn(&self) {
        let span = info_span!(
            "dcc_session",
            session = self.id(),
            user = %self.remote_user(),
            kind = ?self.kind()
        );
        tokio::spawn(self.clone().run().instrument(span));
    }

    async fn run(self) {
        let core = self.core();
        if !core.is_valid() {
            return;
        }

        let Some(stream) = core.await_peer().await else {
            debug!("DCC session ended before connecting");
            return;
        };

        core.begin_transfer();
        info!(remote = ?core.remote_endpoint(), "DCC session started");

        match &self {
            Self::Chat(chat) => {
                let lines = chat.attach(stream).await;
                self.emit(DccEventKind::Start);
                chat.pump(&self, lines).await;
            }
            Self::File(file) => {
                self.emit(DccEventKind::Start);
                file.pump(&self, stream).await;
            }
        }

        core.finish();
        info!("DCC session stopped");
        self.emit(DccEventKind::Stop);
    }
}

impl fmt::Debug for DccSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(chat) => f.debug_tuple("Chat").field(chat.core()).finish(),
            Self::File(file) => f.debug_tuple("File").field(file.core()).finish(),
        }
    }
}
