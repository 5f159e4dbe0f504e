//! Integration tests for DCC CHAT between two loopback clients.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, is_request, is_start, is_stop, next_event, wait_until};
use slirc_dcc::{DccError, DccEventKind, LoopbackPair, Priority, SessionState};

#[tokio::test]
async fn passive_chat_correlates_by_token() {
    let pair = LoopbackPair::new("alice", fast_config(), "bob", fast_config());
    let alice = pair.first.coordinator.clone();
    let bob = pair.second.coordinator.clone();
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    let chat = alice
        .initiate_chat("bob", true, Priority::Medium)
        .await
        .expect("offer chat");
    let id = chat.core().id();

    let request = next_event(&mut bob_events, is_request).await.unwrap();
    assert_eq!(request.session.remote_user(), "alice");
    let bob_chat = request.session.as_chat().expect("chat request").clone();
    assert_eq!(bob_chat.peer_token(), Some(id));
    bob_chat.accept_request().await.expect("bob accepts");

    // The answer carries alice's token; alice connects the session she offered.
    let start = next_event(&mut alice_events, is_start(id)).await.unwrap();
    assert!(Arc::ptr_eq(start.session.as_chat().unwrap(), &chat));
    next_event(&mut bob_events, is_start(bob_chat.core().id()))
        .await
        .unwrap();

    chat.write_line("hello").await.expect("write line");
    let line = next_event(&mut bob_events, |e| {
        matches!(e.kind, DccEventKind::LineReceived(_))
    })
    .await
    .unwrap();
    assert!(matches!(&line.kind, DccEventKind::LineReceived(text) if text == "hello"));
    assert_eq!(bob_chat.lines(), 1);
    assert_eq!(chat.lines(), 1);
}

#[tokio::test]
async fn auto_accepted_chat_runs_both_ways_and_stops_once() {
    let mut bob_config = fast_config();
    bob_config.auto_accept_chat = true;
    let pair = LoopbackPair::new("alice", fast_config(), "bob", bob_config);
    let alice = pair.first.coordinator.clone();
    let bob = pair.second.coordinator.clone();
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    let chat = alice
        .initiate_chat("bob", false, Priority::Medium)
        .await
        .unwrap();
    let id = chat.core().id();

    // No request event when chats are auto-accepted.
    let first = next_event(&mut bob_events, |_| true).await.unwrap();
    assert!(matches!(first.kind, DccEventKind::Start));
    let bob_chat = first.session.as_chat().unwrap().clone();
    next_event(&mut alice_events, is_start(id)).await.unwrap();

    bob_chat.write_line("hi alice").await.unwrap();
    chat.write_line("hi bob").await.unwrap();
    let heard = next_event(&mut alice_events, |e| {
        matches!(&e.kind, DccEventKind::LineReceived(text) if text == "hi alice")
    })
    .await;
    assert!(heard.is_ok());

    chat.core().close();
    next_event(&mut alice_events, is_stop(id)).await.unwrap();
    next_event(&mut bob_events, is_stop(bob_chat.core().id()))
        .await
        .unwrap();

    let again = tokio::time::timeout(
        Duration::from_millis(200),
        next_event(&mut alice_events, is_stop(id)),
    )
    .await;
    assert!(again.is_err(), "Stop fired twice");

    assert_eq!(chat.core().state(), SessionState::Closed);
    assert!(!chat.core().is_connected());
    assert!(chat.write_line("too late").await.is_err());

    alice.evict_invalid();
    assert!(alice.session(id).is_none());
}

#[tokio::test]
async fn rejected_request_never_starts() {
    let pair = LoopbackPair::new("alice", fast_config(), "bob", fast_config());
    let alice = pair.first.coordinator.clone();
    let bob = pair.second.coordinator.clone();
    let mut bob_events = bob.subscribe();

    alice
        .initiate_chat("bob", true, Priority::Medium)
        .await
        .unwrap();
    let request = next_event(&mut bob_events, is_request).await.unwrap();
    request.session.reject();

    let session = request.session.clone();
    wait_until(|| !session.is_valid()).await.unwrap();
    assert_eq!(session.state(), SessionState::Invalid);

    let started = tokio::time::timeout(
        Duration::from_millis(100),
        next_event(&mut bob_events, |e| matches!(e.kind, DccEventKind::Start)),
    )
    .await;
    assert!(started.is_err());

    assert_eq!(bob.evict_invalid(), 1);
    assert!(bob.sessions().is_empty());
}

#[tokio::test]
async fn non_ascii_lines_survive_latin1() {
    let mut alice_config = fast_config();
    alice_config.encoding = "iso-8859-1".to_owned();
    let mut bob_config = alice_config.clone();
    bob_config.auto_accept_chat = true;

    let pair = LoopbackPair::new("alice", alice_config, "bob", bob_config);
    let alice = pair.first.coordinator.clone();
    let mut bob_events = pair.second.coordinator.subscribe();
    let mut alice_events = alice.subscribe();

    let chat = alice
        .initiate_chat("bob", false, Priority::Medium)
        .await
        .unwrap();
    next_event(&mut alice_events, is_start(chat.core().id()))
        .await
        .unwrap();

    chat.write_line("café").await.unwrap();
    let line = next_event(&mut bob_events, |e| {
        matches!(e.kind, DccEventKind::LineReceived(_))
    })
    .await
    .unwrap();
    assert!(matches!(&line.kind, DccEventKind::LineReceived(text) if text == "café"));
}

#[tokio::test]
async fn line_counts_agree_on_both_ends() {
    let mut alice_config = fast_config();
    alice_config.max_line_length = 16;
    let mut bob_config = alice_config.clone();
    bob_config.auto_accept_chat = true;

    let pair = LoopbackPair::new("alice", alice_config, "bob", bob_config);
    let alice = pair.first.coordinator.clone();
    let mut alice_events = alice.subscribe();
    let mut bob_events = pair.second.coordinator.subscribe();

    let chat = alice
        .initiate_chat("bob", false, Priority::Medium)
        .await
        .unwrap();
    next_event(&mut alice_events, is_start(chat.core().id()))
        .await
        .unwrap();
    let bob_start = next_event(&mut bob_events, |e| matches!(e.kind, DccEventKind::Start))
        .await
        .unwrap();
    let bob_chat = bob_start.session.as_chat().unwrap().clone();

    for text in ["one\ntwo", "one\r\ntwo", "\nlead"] {
        let err = chat.write_line(text).await.unwrap_err();
        assert!(matches!(err, DccError::InvalidArgument(_)), "{text:?}: {err:?}");
    }
    let err = chat.write_line("seventeen bytes!!").await.unwrap_err();
    assert!(matches!(err, DccError::Line(_)));
    assert_eq!(chat.lines(), 0);
    assert!(chat.core().is_connected());

    chat.write_line("fits\r\n").await.unwrap();
    let line = next_event(&mut bob_events, |e| {
        matches!(e.kind, DccEventKind::LineReceived(_))
    })
    .await
    .unwrap();
    assert!(matches!(&line.kind, DccEventKind::LineReceived(text) if text == "fits"));

    let sent = next_event(&mut alice_events, |e| {
        matches!(e.kind, DccEventKind::LineSent(_))
    })
    .await
    .unwrap();
    assert!(matches!(&sent.kind, DccEventKind::LineSent(text) if text == "fits"));
    assert_eq!(chat.lines(), 1);
    assert_eq!(bob_chat.lines(), 1);
}
