//! Black-box parser tests driving the public `ParserEvents` API the way a
//! real connection would: one shared `Parser`, fed whatever a socket read
//! happened to hand back, in whatever chunks that read happened to split.

use broker_protocol::{ConnKind, MsgArgs, Parser, ParserEvents, ProtocolError, PubArgs, SubArgs, Subject, UnsubArgs};
use std::cell::RefCell;

#[derive(Default)]
struct Session {
    pubs: RefCell<Vec<(PubArgs, Vec<u8>)>>,
    subs: RefCell<Vec<SubArgs>>,
    unsubs: RefCell<Vec<UnsubArgs>>,
    errs: RefCell<Vec<Vec<u8>>>,
    oks: RefCell<usize>,
    authorized: bool,
}

impl ParserEvents for Session {
    fn on_connect(&mut self, _opts: &[u8]) -> Result<(), ProtocolError> {
        Ok(())
    }
    fn on_pub(&mut self, args: &PubArgs, payload: &[u8]) -> Result<(), ProtocolError> {
        self.pubs.borrow_mut().push((args.clone(), payload.to_vec()));
        Ok(())
    }
    fn on_sub(&mut self, args: &SubArgs) -> Result<(), ProtocolError> {
        self.subs.borrow_mut().push(args.clone());
        Ok(())
    }
    fn on_unsub(&mut self, args: &UnsubArgs) -> Result<(), ProtocolError> {
        self.unsubs.borrow_mut().push(args.clone());
        Ok(())
    }
    fn on_msg(&mut self, _args: &MsgArgs, _payload: &[u8]) -> Result<(), ProtocolError> {
        Ok(())
    }
    fn on_ping(&mut self) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        Ok(())
    }
    fn on_pong(&mut self) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        Ok(())
    }
    fn on_info(&mut self, _raw: &[u8]) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        Ok(())
    }
    fn on_ok(&mut self) -> Result<(), ProtocolError> {
        *self.oks.borrow_mut() += 1;
        Ok(())
    }
    fn on_err(&mut self, raw: &[u8]) -> Result<(), ProtocolError> {
        self.errs.borrow_mut().push(raw.to_vec());
        Ok(())
    }
    fn is_authorized(&self) -> bool {
        self.authorized
    }
}

fn session() -> Session {
    Session {
        authorized: true,
        ..Default::default()
    }
}

fn unauthenticated_session() -> Session {
    Session::default()
}

/// Feeds a whole buffer one byte at a time, the worst case for a client
/// that submits a single byte per `read(2)`.
fn feed_byte_by_byte(p: &mut Parser, buf: &[u8], events: &mut Session) -> Result<(), ProtocolError> {
    for b in buf {
        p.feed(&[*b], events)?;
    }
    Ok(())
}

#[test]
fn connect_sub_pub_roundtrip_byte_at_a_time() {
    let mut p = Parser::new(ConnKind::Client, 4096, 1_048_576);
    let mut s = session();

    feed_byte_by_byte(&mut p, b"CONNECT {\"verbose\":false}\r\n", &mut s).unwrap();
    feed_byte_by_byte(&mut p, b"SUB orders.* 1\r\n", &mut s).unwrap();
    feed_byte_by_byte(&mut p, b"PUB orders.created 1 5\r\nhello\r\n", &mut s).unwrap();

    assert_eq!(s.subs.borrow().len(), 1);
    assert_eq!(&*s.subs.borrow()[0].subject, b"orders.*");
    let pubs = s.pubs.borrow();
    assert_eq!(pubs.len(), 1);
    assert_eq!(&*pubs[0].0.subject, b"orders.created");
    assert_eq!(pubs[0].1, b"hello");
}

#[test]
fn pub_payload_split_at_every_possible_boundary() {
    let whole = b"PUB a.b 7\r\npayload\r\n".to_vec();
    for split in 1..whole.len() {
        let mut p = Parser::new(ConnKind::Client, 4096, 1_048_576);
        let mut s = session();
        let (head, tail) = whole.split_at(split);
        p.feed(head, &mut s).unwrap();
        p.feed(tail, &mut s).unwrap();
        assert_eq!(s.pubs.borrow().len(), 1, "split at {split} lost the PUB");
        assert_eq!(s.pubs.borrow()[0].1, b"payload");
    }
}

#[test]
fn malformed_sub_is_recoverable_mid_session() {
    let mut p = Parser::new(ConnKind::Client, 4096, 1_048_576);
    let mut s = session();

    p.feed(b"SUB \r\n", &mut s).unwrap_err();
    p.reset();

    // the connection stays usable after reset, same as a real socket would
    // keep delivering bytes after the caller writes an -ERR and carries on
    p.feed(b"SUB a.b 1\r\n", &mut s).unwrap();
    assert_eq!(s.subs.borrow().len(), 1);
}

#[test]
fn back_to_back_commands_share_one_feed_call() {
    let mut p = Parser::new(ConnKind::Client, 4096, 1_048_576);
    let mut s = session();

    p.feed(b"SUB a 1\r\nSUB b 2\r\nUNSUB 1\r\nPING\r\n", &mut s).unwrap();

    assert_eq!(s.subs.borrow().len(), 2);
    assert_eq!(s.unsubs.borrow().len(), 1);
    assert_eq!(&*s.unsubs.borrow()[0].sid, b"1");
}

#[test]
fn router_connection_accepts_msg_client_connection_rejects_it() {
    let mut router = Parser::new(ConnKind::Router, 4096, 1_048_576);
    let mut rs = session();
    router.feed(b"MSG a.b 1 3\r\nxyz\r\n", &mut rs).unwrap();

    let mut client = Parser::new(ConnKind::Client, 4096, 1_048_576);
    let mut cs = session();
    let err = client.feed(b"MSG a.b 1 3\r\nxyz\r\n", &mut cs).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownOperation));
}

#[test]
fn subject_wildcards_validate_the_way_sub_expects() {
    assert!(Subject::parse("orders.*").is_ok());
    assert!(Subject::parse("orders.>").is_ok());
    assert!(Subject::parse("orders.>.more").is_err());
    assert!(Subject::parse("").is_err());
    assert!(Subject::parse_literal("orders.*").is_err());
}

#[test]
fn ping_before_connect_is_an_authorization_violation() {
    let mut p = Parser::new(ConnKind::Client, 4096, 1_048_576);
    let mut s = unauthenticated_session();

    let err = p.feed(b"PING\r\n", &mut s).unwrap_err();
    assert_eq!(err, ProtocolError::AuthorizationViolation);
}
