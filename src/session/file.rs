//! DCC SEND: block-based file transfer with optional resume.
//!
//! The uploader writes fixed-size blocks. Unless the session runs in
//! [`AckMode::Turbo`], the downloader answers every block with the running
//! byte total as a 4-byte big-endian integer.

use std::fmt;
use std::io::{self, SeekFrom};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use serde::Deserialize;
use slirc_ctcp::{DccRequest, ResumePosition, SendOffer, ack_bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{DccSession, SessionContext, SessionCore};
use crate::error::{DccError, DccResult};
use crate::events::DccEventKind;
use crate::outbound::Priority;

/// Acknowledgement discipline for a file transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// Classic acknowledgements after every block.
    Rfc,
    /// Acknowledgements are sent but the uploader does not wait for them.
    #[default]
    RfcSendAhead,
    /// No acknowledgements at all.
    Turbo,
}

impl AckMode {
    /// Whether the receiver writes per-block acknowledgements.
    pub fn acknowledges(self) -> bool {
        !matches!(self, Self::Turbo)
    }
}

/// Which way the bytes flow, from our side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Upload,
    Download,
}

/// Anything a download can be written to.
pub trait LocalIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> LocalIo for T {}

/// A local stream that also supports resume.
pub trait SeekableIo: LocalIo + AsyncSeek {}
impl<T: LocalIo + AsyncSeek> SeekableIo for T {}

/// Local end of a file transfer.
pub enum LocalStream {
    Seekable(Box<dyn SeekableIo>),
    Sequential(Box<dyn LocalIo>),
}

impl LocalStream {
    pub fn seekable<T: SeekableIo + 'static>(io: T) -> Self {
        Self::Seekable(Box::new(io))
    }

    pub fn sequential<T: LocalIo + 'static>(io: T) -> Self {
        Self::Sequential(Box::new(io))
    }

    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Seekable(_))
    }

    /// Position the stream at `offset` from the start.
    pub async fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Self::Seekable(io) => io.seek(SeekFrom::Start(offset)).await.map(drop),
            Self::Sequential(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "local stream is not seekable",
            )),
        }
    }
}

impl From<tokio::fs::File> for LocalStream {
    fn from(file: tokio::fs::File) -> Self {
        Self::seekable(file)
    }
}

impl fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seekable(_) => f.write_str("LocalStream::Seekable"),
            Self::Sequential(_) => f.write_str("LocalStream::Sequential"),
        }
    }
}

impl AsyncRead for LocalStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Seekable(io) => Pin::new(io).poll_read(cx, buf),
            Self::Sequential(io) => Pin::new(io).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for LocalStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Seekable(io) => Pin::new(io).poll_write(cx, buf),
            Self::Sequential(io) => Pin::new(io).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Seekable(io) => Pin::new(io).poll_flush(cx),
            Self::Sequential(io) => Pin::new(io).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Seekable(io) => Pin::new(io).poll_shutdown(cx),
            Self::Sequential(io) => Pin::new(io).poll_shutdown(cx),
        }
    }
}

/// Result of offering a RESUME to an upload session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ResumeOutcome {
    NoMatch,
    Accepted,
    NotSeekable,
}

/// A DCC SEND session, in either direction.
pub struct DccFile {
    core: SessionCore,
    filename: String,
    size: u64,
    direction: Direction,
    ack_mode: parking_lot::Mutex<AckMode>,
    bytes: AtomicU64,
    stream: tokio::sync::Mutex<Option<LocalStream>>,
    peer_token: Option<u64>,
    /// Offset asked for in our RESUME, until the peer's ACCEPT arrives.
    pending_resume: parking_lot::Mutex<Option<u64>>,
}

impl std::fmt::Debug for DccFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DccFile").finish_non_exhaustive()
    }
}

impl DccFile {
    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: SessionContext,
        remote_user: &str,
        filename: &str,
        size: u64,
        direction: Direction,
        ack_mode: AckMode,
        stream: Option<LocalStream>,
        passive_offer: bool,
        peer_token: Option<u64>,
    ) -> Self {
        Self {
            core: SessionCore::new(ctx, remote_user, passive_offer),
            filename: filename.to_owned(),
            size,
            direction,
            ack_mode: parking_lot::Mutex::new(ack_mode),
            bytes: AtomicU64::new(0),
            stream: tokio::sync::Mutex::new(stream),
            peer_token,
            pending_resume: parking_lot::Mutex::new(None),
        }
    }

    /// Create an upload session and the offer to send to `user`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn outgoing(
        ctx: SessionContext,
        user: &str,
        stream: LocalStream,
        filename: &str,
        size: u64,
        ack_mode: AckMode,
        passive: bool,
    ) -> DccResult<(Arc<Self>, DccRequest)> {
        let file = Arc::new(Self::new(
            ctx,
            user,
            filename,
            size,
            Direction::Upload,
            ack_mode,
            Some(stream),
            passive,
            None,
        ));
        let core = &file.core;

        let port = if passive { 0 } else { core.listen().await? };
        let offer = DccRequest::Send(SendOffer {
            filename: filename.to_owned(),
            host: core.external_address(),
            port,
            size,
            token: passive.then_some(core.id()),
        });
        debug!(session = core.id(), %user, filename, size, passive, "Prepared DCC SEND offer");
        Ok((file, offer))
    }

    /// Download session for a file offer received from `nick`.
    pub(crate) fn from_offer(ctx: SessionContext, nick: &str, offer: &SendOffer) -> Arc<Self> {
        let file = Self::new(
            ctx,
            nick,
            &offer.filename,
            offer.size,
            Direction::Download,
            AckMode::Rfc,
            None,
            false,
            offer.token,
        );
        file.core
            .set_remote(SocketAddr::new(offer.host.into(), offer.port));
        Arc::new(file)
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size announced in the offer. 0 when unknown.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ack_mode(&self) -> AckMode {
        *self.ack_mode.lock()
    }

    /// Change the acknowledgement mode. Takes effect when the transfer starts.
    pub fn set_ack_mode(&self, mode: AckMode) {
        *self.ack_mode.lock() = mode;
    }

    /// Bytes transferred, including a resume offset.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn peer_token(&self) -> Option<u64> {
        self.peer_token
    }

    /// Take the local stream back, e.g. after `Stop`.
    pub async fn take_stream(&self) -> Option<LocalStream> {
        self.stream.lock().await.take()
    }

    /// Accept the offer, writing into `stream` (or the stream already
    /// attached) from `offset` on.
    ///
    /// A port-0 offer is answered by listening and sending our own offer.
    /// A non-zero `offset` sends RESUME and connects only once the peer
    /// answers with ACCEPT.
    pub async fn accept_request(&self, stream: Option<LocalStream>, offset: u64) -> DccResult {
        let result = self.answer(stream, offset).await;
        if matches!(result, Err(DccError::Io(_))) {
            self.core.invalidate();
        }
        result
    }

    async fn answer(&self, stream: Option<LocalStream>, offset: u64) -> DccResult {
        let core = &self.core;
        core.ensure_pending()?;

        {
            let mut slot = self.stream.lock().await;
            if let Some(stream) = stream {
                *slot = Some(stream);
            }
            if slot.is_none() {
                return Err(DccError::NoStream(core.id()));
            }
        }

        let remote = core
            .remote_endpoint()
            .ok_or(DccError::NoRemoteEndpoint(core.id()))?;

        if remote.port() == 0 {
            let port = core.listen().await?;
            let answer = DccRequest::Send(SendOffer {
                filename: self.filename.clone(),
                host: core.external_address(),
                port,
                size: self.size,
                token: self.peer_token,
            });
            core.ctx
                .sender
                .send_ctcp(core.remote_user(), &answer.to_ctcp_text(), Priority::Medium);
        } else if offset == 0 {
            core.connect().await?;
        } else {
            *self.pending_resume.lock() = Some(offset);
            let resume = DccRequest::Resume(ResumePosition {
                filename: self.filename.clone(),
                port: remote.port(),
                offset,
                token: None,
            });
            debug!(session = core.id(), offset, "Asking peer to resume");
            core.ctx
                .sender
                .send_ctcp(core.remote_user(), &resume.to_ctcp_text(), Priority::Medium);
        }
        Ok(())
    }

    fn matches(&self, nick: &str, filename: &str, direction: Direction) -> bool {
        self.direction == direction
            && self.core.remote_user() == nick
            && self.filename == filename
            && self.core.is_valid()
            && !self.core.is_connected()
    }

    /// Handle a RESUME from the receiver of one of our uploads.
    pub(crate) async fn try_resume(&self, nick: &str, position: &ResumePosition) -> ResumeOutcome {
        if !self.matches(nick, &position.filename, Direction::Upload) {
            return ResumeOutcome::NoMatch;
        }

        let mut slot = self.stream.lock().await;
        let Some(stream) = slot.as_mut() else {
            return ResumeOutcome::NoMatch;
        };
        if !stream.is_seekable() {
            return ResumeOutcome::NotSeekable;
        }
        if let Err(e) = stream.seek_to(position.offset).await {
            warn!(session = self.core.id(), error = %e, "Seek for RESUME failed");
            return ResumeOutcome::NotSeekable;
        }
        self.bytes.store(position.offset, Ordering::Relaxed);

        let accept = DccRequest::Accept(ResumePosition {
            filename: self.filename.clone(),
            port: position.port,
            offset: position.offset,
            token: position.token,
        });
        debug!(session = self.core.id(), offset = position.offset, "Accepting RESUME");
        self.core
            .ctx
            .sender
            .send_ctcp(nick, &accept.to_ctcp_text(), Priority::Medium);
        ResumeOutcome::Accepted
    }

    /// Handle the ACCEPT answering our RESUME.
    ///
    /// Returns `Ok(false)` when this session is not the one being accepted.
    pub(crate) async fn try_accept(&self, nick: &str, position: &ResumePosition) -> DccResult<bool> {
        if !self.matches(nick, &position.filename, Direction::Download)
            || self.pending_resume.lock().is_none()
        {
            return Ok(false);
        }

        let result = self.resume_at(position.offset).await;
        if result.is_err() {
            self.core.invalidate();
        }
        result.map(|()| true)
    }

    async fn resume_at(&self, offset: u64) -> DccResult {
        {
            let mut slot = self.stream.lock().await;
            let stream = slot
                .as_mut()
                .ok_or(DccError::NoStream(self.core.id()))?;
            if stream.is_seekable() {
                stream.seek_to(offset).await?;
            }
        }
        self.pending_resume.lock().take();
        self.bytes.store(offset, Ordering::Relaxed);
        self.core.connect().await
    }

    /// Move the file, then put the local stream back for `take_stream`.
    pub(super) async fn pump(&self, handle: &DccSession, mut socket: TcpStream) {
        let Some(mut local) = self.stream.lock().await.take() else {
            warn!("DCC SEND has no local stream");
            return;
        };

        match self.direction {
            Direction::Upload => self.upload(handle, &mut socket, &mut local).await,
            Direction::Download => self.download(handle, &mut socket, &mut local).await,
        }

        *self.stream.lock().await = Some(local);
    }

    async fn upload(&self, handle: &DccSession, socket: &mut TcpStream, local: &mut LocalStream) {
        let block_size = self.core.ctx.config.block_size;
        let acks = self.ack_mode().acknowledges();
        let mut buf = vec![0u8; block_size];

        loop {
            if acks {
                drain_acks(socket);
            }

            let n = tokio::select! {
                _ = self.core.closed() => break,
                read = local.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "Reading local file failed");
                        break;
                    }
                },
            };

            let written = tokio::select! {
                _ = self.core.closed() => break,
                res = socket.write_all(&buf[..n]) => res,
            };
            if let Err(e) = written {
                debug!(error = %e, "DCC SEND peer went away");
                break;
            }

            self.bytes.fetch_add(n as u64, Ordering::Relaxed);
            handle.emit(DccEventKind::BlockSent(Bytes::copy_from_slice(&buf[..n])));
        }

        // Half-close so the receiver sees EOF, then give it a bounded
        // window to hang up.
        if let Err(e) = socket.shutdown().await {
            debug!(error = %e, "DCC SEND shutdown failed");
            return;
        }
        let linger = self.core.ctx.config.upload_linger();
        let drained = tokio::time::timeout(linger, async {
            let mut scratch = [0u8; 64];
            loop {
                tokio::select! {
                    _ = self.core.closed() => break,
                    read = socket.read(&mut scratch) => match read {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    },
                }
            }
        })
        .await;
        if drained.is_err() {
            debug!(session = self.core.id(), ?linger, "DCC SEND receiver kept the socket open");
        }
    }

    async fn download(&self, handle: &DccSession, socket: &mut TcpStream, local: &mut LocalStream) {
        let block_size = self.core.ctx.config.block_size;
        let acks = self.ack_mode().acknowledges();
        let mut buf = vec![0u8; block_size];

        loop {
            let n = tokio::select! {
                _ = self.core.closed() => break,
                read = socket.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        debug!(error = %e, "DCC SEND read failed");
                        break;
                    }
                },
            };

            if let Err(e) = local.write_all(&buf[..n]).await {
                warn!(error = %e, "Writing local file failed");
                break;
            }
            let total = self.bytes.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
            handle.emit(DccEventKind::BlockReceived(Bytes::copy_from_slice(&buf[..n])));

            if acks {
                if let Err(e) = socket.write_all(&ack_bytes(total)).await {
                    debug!(error = %e, "DCC SEND ack failed");
                    break;
                }
            }
        }

        if let Err(e) = local.flush().await {
            warn!(error = %e, "Flushing local file failed");
        }
    }
}

/// Discard whatever acknowledgements are already buffered.
fn drain_acks(socket: &TcpStream) {
    let mut scratch = [0u8; 256];
    while let Ok(n) = socket.try_read(&mut scratch) {
        if n == 0 {
            break;
        }
    }
}
