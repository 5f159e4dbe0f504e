//! DCC negotiation: CHAT, SEND, RESUME, ACCEPT.
//!
//! Malformed requests are answered with `ERRMSG DCC <reason>` and go no
//! further. Well-formed requests either create a new session, answer one
//! of our passive offers (matched by token), or resume a pending transfer
//! (matched by nick and filename).

use std::net::SocketAddr;

use async_trait::async_trait;
use slirc_ctcp::{ChatOffer, DccRequest, ResumePosition, SendOffer};
use tracing::{debug, warn};

use super::{CtcpEvent, CtcpHandler};
use crate::coordinator::DccCoordinator;
use crate::error::DccResult;
use crate::events::DccEventKind;
use crate::session::{DccChat, DccFile, DccSession, ResumeOutcome, SessionKind};

/// Handler for the DCC keyword.
pub struct DccHandler;

#[async_trait]
impl CtcpHandler for DccHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        let nick = event.nick.as_str();
        let request = match DccRequest::from_params(&event.params) {
            Ok(request) => request,
            Err(e) => {
                warn!(%nick, reason = %e.reason(), code = e.error_code(), "Malformed DCC request");
                coordinator.reply_error(nick, &e.errmsg());
                return Ok(());
            }
        };

        match request {
            DccRequest::Chat(offer) => match offer.token {
                Some(token) if offer.port != 0 => {
                    let addr = SocketAddr::new(offer.host.into(), offer.port);
                    answer_passive(coordinator, nick, token, addr, SessionKind::Chat).await
                }
                _ => chat_offered(coordinator, nick, &offer).await,
            },
            DccRequest::Send(offer) => match offer.token {
                Some(token) if offer.port != 0 => {
                    let addr = SocketAddr::new(offer.host.into(), offer.port);
                    answer_passive(coordinator, nick, token, addr, SessionKind::File).await
                }
                _ => {
                    file_offered(coordinator, nick, &offer);
                    Ok(())
                }
            },
            DccRequest::Resume(position) => {
                resume(coordinator, nick, &position).await;
                Ok(())
            }
            DccRequest::Accept(position) => accept(coordinator, nick, &position).await,
        }
    }
}

/// A new chat offer from `nick`.
async fn chat_offered(coordinator: &DccCoordinator, nick: &str, offer: &ChatOffer) -> DccResult {
    let chat = DccChat::from_offer(coordinator.session_context(), nick, offer)?;
    let session = DccSession::Chat(chat.clone());
    debug!(session = session.id(), %nick, passive = offer.port == 0, "DCC CHAT offered");

    if coordinator.config().auto_accept_chat {
        coordinator.register(session);
        chat.accept_request().await
    } else {
        coordinator.register_pending(session, DccEventKind::Request {
            filename: None,
            size: None,
        });
        Ok(())
    }
}

/// A new file offer from `nick`.
fn file_offered(coordinator: &DccCoordinator, nick: &str, offer: &SendOffer) {
    let file = DccFile::from_offer(coordinator.session_context(), nick, offer);
    let session = DccSession::File(file);
    debug!(
        session = session.id(),
        %nick,
        filename = %offer.filename,
        size = offer.size,
        passive = offer.port == 0,
        "DCC SEND offered"
    );
    coordinator.register_pending(session, DccEventKind::Request {
        filename: Some(offer.filename.clone()),
        size: Some(offer.size),
    });
}

/// The peer answered one of our passive offers with its listening port.
async fn answer_passive(
    coordinator: &DccCoordinator,
    nick: &str,
    token: u64,
    addr: SocketAddr,
    kind: SessionKind,
) -> DccResult {
    let session = coordinator
        .session(token)
        .filter(|s| s.kind() == kind && s.core().awaits_reverse_offer());
    let Some(session) = session else {
        warn!(%nick, token, "No passive offer matches token");
        coordinator.reply_error(nick, "ERRMSG DCC Invalid passive DCC");
        return Ok(());
    };

    debug!(session = session.id(), %nick, %addr, "Passive DCC answered");
    session.core().set_remote(addr);
    match &session {
        DccSession::Chat(chat) => chat.accept_request().await,
        DccSession::File(file) => file.accept_request(None, 0).await,
    }
}

/// The receiver of one of our uploads asked to resume.
async fn resume(coordinator: &DccCoordinator, nick: &str, position: &ResumePosition) {
    for session in coordinator.sessions() {
        let Some(file) = session.as_file() else {
            continue;
        };
        match file.try_resume(nick, position).await {
            ResumeOutcome::NoMatch => continue,
            ResumeOutcome::Accepted => return,
            ResumeOutcome::NotSeekable => {
                warn!(session = session.id(), %nick, "RESUME on a non-seekable stream");
                coordinator.reply_error(nick, "ERRMSG DCC File not seekable");
                return;
            }
        }
    }
    warn!(%nick, filename = %position.filename, "RESUME matches no upload");
    coordinator.reply_error(nick, "ERRMSG DCC Invalid DCC RESUME");
}

/// The sender confirmed our RESUME.
async fn accept(coordinator: &DccCoordinator, nick: &str, position: &ResumePosition) -> DccResult {
    for session in coordinator.sessions() {
        let Some(file) = session.as_file() else {
            continue;
        };
        if file.try_accept(nick, position).await? {
            return Ok(());
        }
    }
    warn!(%nick, filename = %position.filename, "ACCEPT matches no download");
    coordinator.reply_error(nick, "ERRMSG DCC Invalid DCC ACCEPT");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DccConfig;
    use crate::outbound::{ChannelSender, CtcpDirection, OutboundCtcp};
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn coordinator() -> (DccCoordinator, UnboundedReceiver<OutboundCtcp>) {
        let (sender, rx) = ChannelSender::new();
        (DccCoordinator::new(DccConfig::default(), Arc::new(sender)), rx)
    }

    fn dcc(nick: &str, text: &str) -> CtcpEvent {
        CtcpEvent::from_text(nick, text).unwrap()
    }

    #[tokio::test]
    async fn malformed_request_gets_errmsg() {
        let (coordinator, mut rx) = coordinator();
        coordinator.dispatch(&dcc("bob", "DCC SEND foo")).await;

        let out = rx.try_recv().unwrap();
        assert_eq!(out.direction, CtcpDirection::Reply);
        assert_eq!(out.text, "ERRMSG DCC Send not enough parameters");
        assert!(coordinator.sessions().is_empty());
    }

    #[tokio::test]
    async fn xmit_is_not_implemented() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&dcc("bob", "DCC XMIT x 2130706433 5000"))
            .await;
        assert_eq!(rx.try_recv().unwrap().text, "ERRMSG DCC XMIT not implemented");
    }

    #[tokio::test]
    async fn file_offer_raises_request() {
        let (coordinator, _rx) = coordinator();
        let mut events = coordinator.subscribe();
        coordinator
            .dispatch(&dcc("bob", "DCC SEND \"a b.txt\" 2130706433 5000 1000"))
            .await;

        let event = events.recv().await.unwrap();
        match event.kind {
            DccEventKind::Request { filename, size } => {
                assert_eq!(filename.as_deref(), Some("a b.txt"));
                assert_eq!(size, Some(1000));
            }
            other => panic!("expected request, got {other:?}"),
        }
        let file = event.session.as_file().unwrap();
        assert_eq!(file.direction(), crate::session::Direction::Download);
        assert_eq!(coordinator.sessions().len(), 1);
    }

    #[tokio::test]
    async fn unknown_passive_token_is_refused() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&dcc("bob", "DCC SEND a.txt 2130706433 5000 10 999999"))
            .await;
        assert_eq!(rx.try_recv().unwrap().text, "ERRMSG DCC Invalid passive DCC");
    }

    #[tokio::test]
    async fn resume_without_upload_is_refused() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&dcc("bob", "DCC RESUME a.txt 5000 400"))
            .await;
        assert_eq!(rx.try_recv().unwrap().text, "ERRMSG DCC Invalid DCC RESUME");
    }

    #[tokio::test]
    async fn accept_without_resume_is_refused() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&dcc("bob", "DCC ACCEPT a.txt 5000 400"))
            .await;
        assert_eq!(rx.try_recv().unwrap().text, "ERRMSG DCC Invalid DCC ACCEPT");
    }
}
