//! DCC CHAT: newline-delimited text lines over a direct TCP connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use slirc_ctcp::{ChatLineCodec, ChatOffer, DccRequest};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use super::{DccSession, SessionContext, SessionCore};
use crate::error::{DccError, DccResult};
use crate::events::DccEventKind;
use crate::outbound::Priority;

type LineWriter = FramedWrite<OwnedWriteHalf, ChatLineCodec>;
type LineReader = FramedRead<OwnedReadHalf, ChatLineCodec>;

/// A DCC CHAT session.
pub struct DccChat {
    core: SessionCore,
    codec: ChatLineCodec,
    /// Lines sent plus lines received.
    lines: AtomicU64,
    writer: Mutex<Option<LineWriter>>,
    /// Token the peer attached to a passive offer, echoed in our answer.
    peer_token: Option<u64>,
}

impl std::fmt::Debug for DccChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DccChat").finish_non_exhaustive()
    }
}

impl DccChat {
    fn new(
        ctx: SessionContext,
        remote_user: &str,
        passive_offer: bool,
        peer_token: Option<u64>,
    ) -> DccResult<Self> {
        let codec = ChatLineCodec::with_max_len(&ctx.config.encoding, ctx.config.max_line_length)?;
        Ok(Self {
            core: SessionCore::new(ctx, remote_user, passive_offer),
            codec,
            lines: AtomicU64::new(0),
            writer: Mutex::new(None),
            peer_token,
        })
    }

    /// Create a chat session and the offer to send to `user`.
    ///
    /// Active offers listen and advertise the port. Passive offers advertise
    /// port 0 and carry the session id as token. The caller registers the
    /// session before sending, so an immediate answer finds it.
    pub(crate) async fn outgoing(
        ctx: SessionContext,
        user: &str,
        passive: bool,
    ) -> DccResult<(Arc<Self>, DccRequest)> {
        let chat = Arc::new(Self::new(ctx, user, passive, None)?);
        let core = &chat.core;

        let port = if passive { 0 } else { core.listen().await? };
        let offer = DccRequest::Chat(ChatOffer {
            host: core.external_address(),
            port,
            token: passive.then_some(core.id()),
        });
        debug!(session = core.id(), %user, passive, "Prepared DCC CHAT offer");
        Ok((chat, offer))
    }

    /// Session for a chat offer received from `nick`.
    pub(crate) fn from_offer(
        ctx: SessionContext,
        nick: &str,
        offer: &ChatOffer,
    ) -> DccResult<Arc<Self>> {
        let chat = Self::new(ctx, nick, false, offer.token)?;
        chat.core
            .set_remote(SocketAddr::new(offer.host.into(), offer.port));
        Ok(Arc::new(chat))
    }

    pub fn core(&self) -> &SessionCore {
        &self.core
    }

    /// Lines sent plus lines received so far.
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// Token from the peer's passive offer, if any.
    pub fn peer_token(&self) -> Option<u64> {
        self.peer_token
    }

    /// Accept the peer's offer.
    ///
    /// A port-0 offer is answered by listening and sending our own offer
    /// with the peer's token; otherwise we connect to the advertised port.
    pub async fn accept_request(&self) -> DccResult {
        let result = self.answer().await;
        if matches!(result, Err(DccError::Io(_))) {
            self.core.invalidate();
        }
        result
    }

    async fn answer(&self) -> DccResult {
        let core = &self.core;
        core.ensure_pending()?;
        let remote = core
            .remote_endpoint()
            .ok_or(DccError::NoRemoteEndpoint(core.id()))?;

        if remote.port() == 0 {
            let port = core.listen().await?;
            let answer = DccRequest::Chat(ChatOffer {
                host: core.external_address(),
                port,
                token: self.peer_token,
            });
            core.ctx
                .sender
                .send_ctcp(core.remote_user(), &answer.to_ctcp_text(), Priority::Medium);
            Ok(())
        } else {
            core.connect().await
        }
    }

    /// Send one line to the peer.
    ///
    /// A trailing line terminator is dropped. Text with a line break
    /// anywhere else is refused, as is a line over `max_line_length`.
    pub async fn write_line(self: &Arc<Self>, message: &str) -> DccResult {
        let id = self.core.id();
        if !self.core.is_connected() {
            return Err(DccError::NotConnected(id));
        }
        let message = message.trim_end_matches(['\r', '\n']);
        if message.contains(['\r', '\n']) {
            return Err(DccError::InvalidArgument("line contains a line break"));
        }

        {
            let mut writer = self.writer.lock().await;
            let sink = writer.as_mut().ok_or(DccError::NotConnected(id))?;
            sink.send(message.to_owned()).await?;
        }

        self.lines.fetch_add(1, Ordering::Relaxed);
        DccSession::Chat(Arc::clone(self)).emit(DccEventKind::LineSent(message.to_owned()));
        Ok(())
    }

    /// Install the write half and hand back the line reader.
    pub(super) async fn attach(&self, stream: TcpStream) -> LineReader {
        let (read, write) = stream.into_split();
        *self.writer.lock().await = Some(FramedWrite::new(write, self.codec.clone()));
        FramedRead::new(read, self.codec.clone())
    }

    /// Read lines until the peer hangs up or the session is closed.
    pub(super) async fn pump(&self, handle: &DccSession, mut reader: LineReader) {
        loop {
            let next = tokio::select! {
                _ = self.core.closed() => break,
                next = reader.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    self.lines.fetch_add(1, Ordering::Relaxed);
                    handle.emit(DccEventKind::LineReceived(line));
                }
                Some(Err(e)) => {
                    debug!(error = %e, "DCC CHAT read failed");
                    break;
                }
                None => break,
            }

            if !self.core.is_connected() {
                break;
            }
        }

        // Dropping the write half sends FIN.
        self.writer.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::test_context;
    use std::net::Ipv4Addr;

    #[test]
    fn inbound_offer_records_remote_and_token() {
        let offer = ChatOffer {
            host: Ipv4Addr::new(192, 0, 2, 1),
            port: 0,
            token: Some(42),
        };
        let chat = DccChat::from_offer(test_context(), "bob", &offer).unwrap();
        assert_eq!(chat.peer_token(), Some(42));
        assert_eq!(
            chat.core().remote_endpoint(),
            Some("192.0.2.1:0".parse().unwrap())
        );
        assert!(!chat.core().awaits_reverse_offer());
    }

    #[tokio::test]
    async fn write_line_requires_connection() {
        let offer = ChatOffer {
            host: Ipv4Addr::LOCALHOST,
            port: 5000,
            token: None,
        };
        let chat = DccChat::from_offer(test_context(), "bob", &offer).unwrap();
        let err = chat.write_line("hello").await.unwrap_err();
        assert!(matches!(err, DccError::NotConnected(id) if id == chat.core().id()));
        assert_eq!(chat.lines(), 0);
    }

    #[tokio::test]
    async fn failed_connect_invalidates() {
        // Grab a free port, then close it so the connect is refused.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let offer = ChatOffer {
            host: Ipv4Addr::LOCALHOST,
            port,
            token: None,
        };
        let chat = DccChat::from_offer(test_context(), "bob", &offer).unwrap();
        assert!(chat.accept_request().await.is_err());
        assert!(!chat.core().is_valid());
        assert!(matches!(
            chat.accept_request().await,
            Err(DccError::Invalid(_))
        ));
    }
}
