//! One client connection: the read loop that drives the parser, and the
//! dedicated writer task that drains its outbound channel.
//!
//! Grounded on the reader/writer split in
//! `services/forwarder/src/local_fanout.rs` (`serve_consumer`): there, a
//! broadcast receiver feeds a writer task per consumer. Here a connection
//! also *originates* frames (`PUB`/`SUB`/`UNSUB`), so the split becomes:
//! one task owns the socket's read half and the parser; a second owns the
//! write half and drains an `mpsc` channel fed by this connection's own
//! replies and by any other connection whose publish matched one of this
//! connection's subscriptions.

use crate::error::CoreError;
use crate::options::{ServerOptions, INITIAL_BUF_SIZE, MAX_BUF_SIZE, MIN_BUF_SIZE};
use crate::registry::{ConnectionHandle, Registry};
use broker_auth::{PermCache, PermissionSublists};
use broker_protocol::{
    ConnKind, ConnectOpts, MsgArgs, Parser, ParserEvents, ProtocolError, PubArgs, ServerInfo, SubArgs, Subject,
    UnsubArgs, CLIENT_PROTO_INFO,
};
use broker_sublist::{pick_queue_member, Sublist, Subscription};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::MissedTickBehavior;

/// Renders a `MSG` frame. `sid` is the *subscriber's* sid from its own
/// `SUB` line, not the Sublist's internal identity.
fn render_msg(subject: &str, sid: &[u8], reply: Option<&[u8]>, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(subject.len() + sid.len() + payload.len() + 32);
    buf.put_slice(b"MSG ");
    buf.put_slice(subject.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(sid);
    if let Some(reply) = reply {
        buf.put_u8(b' ');
        buf.put_slice(reply);
    }
    buf.put_u8(b' ');
    buf.put_slice(payload.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(payload);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

fn render_simple(line: &'static str) -> Bytes {
    Bytes::from_static(line.as_bytes())
}

/// One connection's live state. Owned exclusively by the task running
/// [`Connection::run`]; delivery from other connections goes through the
/// [`ConnectionHandle`] registered alongside it, never through `self`.
pub struct Connection {
    id: u64,
    kind: ConnKind,
    registry: Arc<Registry>,
    sublist: Arc<Sublist>,
    options: Arc<ServerOptions>,
    tx: mpsc::Sender<Bytes>,
    subs: HashMap<Box<[u8]>, Arc<Subscription>>,
    authorized: bool,
    verbose: bool,
    proto: i32,
    perms: PermissionSublists,
    perm_cache: PermCache,
    pout: u32,
    in_msgs: u64,
    in_bytes: u64,
    out_msgs: u64,
    out_bytes: u64,
    last_activity: std::time::Instant,
}

/// Point-in-time per-connection counters, mirroring `SublistStats`'s shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnStats {
    pub in_msgs: u64,
    pub in_bytes: u64,
    pub out_msgs: u64,
    pub out_bytes: u64,
}

impl Connection {
    fn new(
        id: u64,
        kind: ConnKind,
        registry: Arc<Registry>,
        sublist: Arc<Sublist>,
        options: Arc<ServerOptions>,
        tx: mpsc::Sender<Bytes>,
    ) -> Connection {
        let requires_auth = options.auth.requires_auth();
        Connection {
            id,
            kind,
            registry,
            sublist,
            options,
            tx,
            subs: HashMap::new(),
            authorized: !requires_auth,
            verbose: false,
            proto: 0,
            perms: PermissionSublists::unrestricted(),
            perm_cache: PermCache::default(),
            pout: 0,
            in_msgs: 0,
            in_bytes: 0,
            out_msgs: 0,
            out_bytes: 0,
            last_activity: std::time::Instant::now(),
        }
    }

    fn send(&self, frame: Bytes) {
        let _ = self.tx.try_send(frame);
    }

    fn ack_ok(&self) {
        if self.verbose {
            self.send(render_simple("+OK\r\n"));
        }
    }

    fn send_err(&self, err: &ProtocolError) {
        self.send(Bytes::from(err.wire_message().into_bytes()));
    }

    /// When this connection last produced a successful socket read.
    pub fn last_activity(&self) -> std::time::Instant {
        self.last_activity
    }

    pub fn stats(&self) -> ConnStats {
        ConnStats {
            in_msgs: self.in_msgs,
            in_bytes: self.in_bytes,
            out_msgs: self.out_msgs,
            out_bytes: self.out_bytes,
        }
    }

    /// Delivers one rendered frame to a matched subscription, wherever its
    /// owning connection lives. Bumps the Sublist entry's delivery count
    /// and removes it once an `UNSUB ... max` bound is reached, regardless
    /// of which connection happens to be delivering at that moment — see
    /// `Subscription::mark_delivered`.
    fn deliver(&self, sub: &Arc<Subscription>, subject: &str, reply: Option<&[u8]>, payload: &[u8]) {
        let frame = render_msg(subject, &sub.sid, reply, payload);
        if let Some(handle) = self.registry.get(sub.conn_id) {
            if !handle.try_deliver(frame) {
                tracing::warn!(conn_id = sub.conn_id, "slow consumer, closing connection");
                handle.mark_slow_consumer();
            }
        }
        if sub.mark_delivered() {
            let _ = self.sublist.remove(sub);
        }
    }

    /// Drops every subscription this connection owns from the shared
    /// Sublist. Called once, from `run`, after the socket closes.
    fn unsubscribe_all(&mut self) {
        for sub in self.subs.values() {
            let _ = self.sublist.remove(sub);
        }
        self.subs.clear();
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            server_id: format!("conn-{}", self.id),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: self.options.host.to_string(),
            port: self.options.port,
            auth_required: self.options.auth.requires_auth(),
            ssl_required: false,
            tls_required: false,
            tls_verify: false,
            max_payload: self.options.max_payload,
            connect_urls: Vec::new(),
        }
    }

    /// Accepts one socket, spawns its writer task, registers it with the
    /// registry, and runs the read loop to completion. Returns once the
    /// connection has fully closed and been unregistered.
    pub async fn serve(
        id: u64,
        kind: ConnKind,
        stream: TcpStream,
        registry: Arc<Registry>,
        sublist: Arc<Sublist>,
        options: Arc<ServerOptions>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let (tx, rx) = mpsc::channel::<Bytes>(options.write_channel_capacity);
        let kill = Arc::new(Notify::new());
        let handle = ConnectionHandle::new(id, kind, tx.clone(), kill.clone());
        registry.register(handle);

        let (read_half, write_half) = stream.into_split();
        let writer = tokio::spawn(run_writer(write_half, rx, options.write_deadline));

        let mut conn = Connection::new(id, kind, registry.clone(), sublist, options.clone(), tx);
        conn.send(Bytes::from(conn.server_info().to_wire().into_bytes()));

        if let Err(err) = conn.read_loop(read_half, &kill, &mut shutdown).await {
            tracing::debug!(conn_id = id, error = %err, "connection closed");
        }

        conn.unsubscribe_all();
        registry.unregister(id);
        drop(conn.tx);
        let _ = writer.await;
    }

    /// The read loop from spec.md §4.3: dynamically sized read buffer,
    /// auth timeout before the first `CONNECT`, periodic `PING`, and
    /// `MaxPingsOut` unanswered pings closing the connection.
    async fn read_loop(
        &mut self,
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        kill: &Notify,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), CoreError> {
        let mut parser = Parser::new(self.kind, self.options.max_control_line, self.options.max_payload);
        let mut buf = vec![0u8; INITIAL_BUF_SIZE];

        let mut ping_timer = tokio::time::interval(self.options.ping_interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping_timer.reset();

        let auth_deadline = tokio::time::sleep(self.options.auth_timeout);
        tokio::pin!(auth_deadline);
        let mut authenticated_in_time = !self.options.auth.requires_auth();

        loop {
            tokio::select! {
                result = read_half.read(&mut buf) => {
                    let n = result?;
                    if n == 0 {
                        return Ok(());
                    }
                    self.in_bytes += n as u64;
                    self.last_activity = std::time::Instant::now();

                    if let Err(err) = parser.feed(&buf[..n], self) {
                        self.send_err(&err);
                        if err.is_fatal() {
                            return Ok(());
                        }
                        parser.reset();
                    }
                    if self.authorized {
                        authenticated_in_time = true;
                    }

                    // Dynamic buffer sizing (spec.md §4.3): grow toward
                    // `max_buf_size` on a full read, shrink toward
                    // `min_buf_size` once a read uses less than half of it.
                    if n == buf.len() && buf.len() < MAX_BUF_SIZE {
                        buf.resize(buf.len() * 2, 0);
                    } else if n < buf.len() / 2 && buf.len() > MIN_BUF_SIZE {
                        buf.resize((buf.len() / 2).max(MIN_BUF_SIZE), 0);
                    }
                }
                _ = ping_timer.tick() => {
                    if self.pout >= self.options.max_pings_out {
                        tracing::debug!(conn_id = self.id, "max pings out, closing stale connection");
                        return Ok(());
                    }
                    self.pout += 1;
                    self.send(render_simple("PING\r\n"));
                }
                _ = &mut auth_deadline, if !authenticated_in_time => {
                    self.send_err(&ProtocolError::AuthorizationTimeout);
                    return Ok(());
                }
                _ = kill.notified() => {
                    tracing::debug!(conn_id = self.id, "closing slow-consumer connection");
                    return Ok(());
                }
                _ = shutdown.recv() => {
                    tracing::debug!(conn_id = self.id, "closing connection for shutdown");
                    return Ok(());
                }
            }
        }
    }
}

/// Drains the outbound channel onto the socket's write half until the
/// channel closes (the reader dropped its sender) or the write fails.
async fn run_writer(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::Receiver<Bytes>,
    write_deadline: std::time::Duration,
) {
    while let Some(frame) = rx.recv().await {
        let result = tokio::time::timeout(write_deadline, write_half.write_all(&frame)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => break,
        }
    }
    let _ = write_half.shutdown().await;
}

impl ParserEvents for Connection {
    fn on_connect(&mut self, opts: &[u8]) -> Result<(), ProtocolError> {
        let parsed = ConnectOpts::from_json(opts).map_err(|_| ProtocolError::MalformedArguments("CONNECT"))?;
        self.verbose = parsed.verbose;
        self.proto = parsed.protocol;
        let perms = self.options.auth.authenticate(&parsed, self.id)?;
        self.perms = perms;
        self.authorized = true;
        if parsed.protocol >= CLIENT_PROTO_INFO {
            self.send(Bytes::from(self.server_info().to_wire().into_bytes()));
        }
        self.ack_ok();
        Ok(())
    }

    fn on_pub(&mut self, args: &PubArgs, payload: &[u8]) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        let subject_str = std::str::from_utf8(&args.subject).map_err(|_| ProtocolError::MalformedArguments("PUB"))?;
        let subject = Subject::parse_literal(subject_str)?;
        if !self.perm_cache.check_publish(&self.perms, &subject) {
            return Err(ProtocolError::PermissionsViolation);
        }
        self.in_msgs += 1;

        let result = self.sublist.match_subject(&subject);
        for sub in &result.psubs {
            self.deliver(sub, subject_str, args.reply.as_deref(), payload);
            self.out_msgs += 1;
            self.out_bytes += payload.len() as u64;
        }
        for (_, bucket) in &result.qsubs {
            if let Some(sub) = pick_queue_member(bucket) {
                self.deliver(sub, subject_str, args.reply.as_deref(), payload);
                self.out_msgs += 1;
                self.out_bytes += payload.len() as u64;
            }
        }
        self.ack_ok();
        Ok(())
    }

    fn on_sub(&mut self, args: &SubArgs) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        let subject_str = std::str::from_utf8(&args.subject).map_err(|_| ProtocolError::MalformedArguments("SUB"))?;
        let subject = Subject::parse(subject_str)?;
        if !self.perm_cache.check_subscribe(&self.perms, &subject) {
            return Err(ProtocolError::PermissionsViolation);
        }
        // A duplicate sid is silently ignored (spec.md §4.2): the original
        // subscription keeps whatever subject/queue it was created with.
        if self.subs.contains_key(&args.sid) {
            self.ack_ok();
            return Ok(());
        }

        let queue = match &args.queue {
            Some(q) => Some(
                std::str::from_utf8(q)
                    .map_err(|_| ProtocolError::MalformedArguments("SUB"))?
                    .into(),
            ),
            None => None,
        };
        let sub = Arc::new(Subscription::new(subject, queue, args.sid.clone(), self.id));
        self.sublist.insert(sub.clone());
        self.subs.insert(args.sid.clone(), sub);
        self.ack_ok();
        Ok(())
    }

    fn on_unsub(&mut self, args: &UnsubArgs) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        if let Some(max) = args.max {
            // Rearm the existing subscription with a delivery bound
            // instead of removing it outright.
            if let Some(sub) = self.subs.get(&args.sid) {
                let rebound = Arc::new(Subscription::with_max(
                    sub.subject.clone(),
                    sub.queue.clone(),
                    sub.sid.clone(),
                    self.id,
                    Some(max),
                ));
                let _ = self.sublist.remove(sub);
                self.sublist.insert(rebound.clone());
                self.subs.insert(args.sid.clone(), rebound);
            }
        } else if let Some(sub) = self.subs.remove(&args.sid) {
            let _ = self.sublist.remove(&sub);
        }
        self.ack_ok();
        Ok(())
    }

    fn on_msg(&mut self, args: &MsgArgs, payload: &[u8]) -> Result<(), ProtocolError> {
        // Only reachable on router-kind connections; this server doesn't
        // implement clustering yet, so an inbound MSG has nowhere to go.
        let _ = (args, payload);
        tracing::debug!(conn_id = self.id, "inbound router MSG dropped, no cluster routing");
        Ok(())
    }

    fn on_ping(&mut self) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        self.send(render_simple("PONG\r\n"));
        Ok(())
    }

    fn on_pong(&mut self) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        self.pout = 0;
        Ok(())
    }

    fn on_info(&mut self, _raw: &[u8]) -> Result<(), ProtocolError> {
        if !self.authorized {
            return Err(ProtocolError::AuthorizationViolation);
        }
        Ok(())
    }

    fn is_authorized(&self) -> bool {
        self.authorized
    }
}
