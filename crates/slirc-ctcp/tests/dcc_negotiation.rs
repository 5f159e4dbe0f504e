//! Integration tests for DCC negotiation text as it appears inside CTCP.

use slirc_ctcp::{split_params, Ctcp, CtcpKind, DccRequest, ParseFailure};
use std::net::Ipv4Addr;

#[test]
fn ctcp_body_to_request() {
    let body = "\x01DCC SEND \"holiday photos.zip\" 3232235786 41000 1048576\x01";
    let ctcp = Ctcp::parse(body).expect("ctcp");
    assert_eq!(ctcp.kind, CtcpKind::Dcc);

    let request: DccRequest = ctcp.params.unwrap().parse().expect("valid SEND");
    match request {
        DccRequest::Send(send) => {
            assert_eq!(send.filename, "holiday photos.zip");
            assert_eq!(send.host, Ipv4Addr::new(192, 168, 1, 10));
            assert_eq!(send.port, 41000);
            assert_eq!(send.size, 1_048_576);
            assert_eq!(send.token, None);
        }
        other => panic!("expected SEND, got {other:?}"),
    }
}

#[test]
fn passive_answer_carries_token() {
    let request: DccRequest = "CHAT chat 2130706433 5000 42".parse().unwrap();
    match request {
        DccRequest::Chat(chat) => {
            assert_eq!(chat.port, 5000);
            assert_eq!(chat.token, Some(42));
        }
        other => panic!("expected CHAT, got {other:?}"),
    }
}

#[test]
fn formatted_requests_reparse() {
    let texts = [
        "CHAT chat 2130706433 0 7",
        "SEND \"a b.txt\" 2130706433 0 1000 12",
        "RESUME \"x.bin\" 5000 400",
        "ACCEPT \"x.bin\" 5000 400 3",
    ];
    for text in texts {
        let parsed: DccRequest = text.parse().unwrap();
        assert_eq!(parsed.to_string(), text);
        assert_eq!(split_params(&parsed.to_string()), split_params(text));
    }
}

#[test]
fn every_short_form_is_rejected() {
    for text in ["CHAT", "CHAT chat", "SEND f 1", "RESUME f", "ACCEPT f 1"] {
        let err = text.parse::<DccRequest>().unwrap_err();
        assert_eq!(err.failure, ParseFailure::NotEnoughParams, "{text}");
        assert!(err.errmsg().starts_with("ERRMSG DCC "));
    }
}
