//! Informational CTCP replies: VERSION, CLIENTINFO, PING, TIME, USERINFO,
//! URL, SOURCE, FINGER.
//!
//! Replies go out as CTCP replies (NOTICE) at medium priority.

use async_trait::async_trait;

use super::{CtcpEvent, CtcpHandler};
use crate::coordinator::DccCoordinator;
use crate::error::DccResult;
use crate::outbound::Priority;

fn reply(coordinator: &DccCoordinator, event: &CtcpEvent, keyword: &str, body: &str) {
    let text = if body.is_empty() {
        keyword.to_owned()
    } else {
        format!("{keyword} {body}")
    };
    coordinator
        .sender()
        .send_ctcp_reply(&event.nick, &text, Priority::Medium);
}

/// Handler for VERSION.
pub struct VersionHandler;

#[async_trait]
impl CtcpHandler for VersionHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "VERSION", &coordinator.config().ctcp.version);
        Ok(())
    }
}

/// Handler for CLIENTINFO.
///
/// Lists every keyword currently registered, including custom ones.
pub struct ClientInfoHandler;

#[async_trait]
impl CtcpHandler for ClientInfoHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        let keywords = coordinator.ctcp_keywords().join(" ");
        reply(coordinator, event, "CLIENTINFO", &keywords);
        Ok(())
    }
}

/// Handler for PING. Echoes the payload back byte for byte.
pub struct PingHandler;

#[async_trait]
impl CtcpHandler for PingHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "PING", &event.raw_params);
        Ok(())
    }
}

/// Handler for TIME.
pub struct TimeHandler;

#[async_trait]
impl CtcpHandler for TimeHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        let now = chrono::Local::now().to_rfc2822();
        reply(coordinator, event, "TIME", &now);
        Ok(())
    }
}

/// Handler for USERINFO.
pub struct UserInfoHandler;

#[async_trait]
impl CtcpHandler for UserInfoHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "USERINFO", &coordinator.config().ctcp.userinfo);
        Ok(())
    }
}

/// Handler for URL.
pub struct UrlHandler;

#[async_trait]
impl CtcpHandler for UrlHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "URL", &coordinator.config().ctcp.url);
        Ok(())
    }
}

/// Handler for SOURCE.
pub struct SourceHandler;

#[async_trait]
impl CtcpHandler for SourceHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "SOURCE", &coordinator.config().ctcp.source);
        Ok(())
    }
}

/// Handler for FINGER.
pub struct FingerHandler;

#[async_trait]
impl CtcpHandler for FingerHandler {
    async fn handle(&self, coordinator: &DccCoordinator, event: &CtcpEvent) -> DccResult {
        reply(coordinator, event, "FINGER", &coordinator.config().ctcp.finger);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DccConfig;
    use crate::outbound::{ChannelSender, CtcpDirection};
    use std::sync::Arc;

    fn coordinator() -> (
        DccCoordinator,
        tokio::sync::mpsc::UnboundedReceiver<crate::outbound::OutboundCtcp>,
    ) {
        let (sender, rx) = ChannelSender::new();
        let mut config = DccConfig::default();
        config.ctcp.version = "test 1.0".to_owned();
        (DccCoordinator::new(config, Arc::new(sender)), rx)
    }

    #[tokio::test]
    async fn version_replies_with_configured_string() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&CtcpEvent::new("bob", "VERSION", vec![]))
            .await;
        let out = rx.try_recv().unwrap();
        assert_eq!(out.target, "bob");
        assert_eq!(out.direction, CtcpDirection::Reply);
        assert_eq!(out.text, "VERSION test 1.0");
    }

    #[tokio::test]
    async fn ping_echoes_payload() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&CtcpEvent::new("bob", "ping", vec!["1700000000".to_owned()]))
            .await;
        assert_eq!(rx.try_recv().unwrap().text, "PING 1700000000");
    }

    #[tokio::test]
    async fn ping_keeps_payload_verbatim() {
        let (coordinator, mut rx) = coordinator();
        let event = CtcpEvent::from_text("bob", "PING \"12  34\"  x").unwrap();
        coordinator.dispatch(&event).await;
        assert_eq!(rx.try_recv().unwrap().text, "PING \"12  34\"  x");
    }

    #[tokio::test]
    async fn clientinfo_lists_custom_keywords() {
        let (coordinator, mut rx) = coordinator();
        coordinator.register_ctcp_handler("xyzzy", Arc::new(PingHandler));
        coordinator
            .dispatch(&CtcpEvent::new("bob", "CLIENTINFO", vec![]))
            .await;
        let text = rx.try_recv().unwrap().text;
        assert!(text.starts_with("CLIENTINFO "));
        assert!(text.contains(" XYZZY"));
        assert!(text.contains(" DCC "));
    }

    #[tokio::test]
    async fn time_reply_is_rfc2822() {
        let (coordinator, mut rx) = coordinator();
        coordinator
            .dispatch(&CtcpEvent::new("bob", "TIME", vec![]))
            .await;
        let text = rx.try_recv().unwrap().text;
        let stamp = text.strip_prefix("TIME ").unwrap();
        assert!(chrono::DateTime::parse_from_rfc2822(stamp).is_ok());
    }
}
