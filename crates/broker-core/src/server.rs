//! The accept loop and top-level server handle.
//!
//! Grounded on `FanoutServer::bind`/`run` in
//! `services/forwarder/src/local_fanout.rs` (teacher): bind once, loop on
//! `accept`, spawn one task per connection. This adds the transient-error
//! backoff and connection cap spec.md §4.4 calls for, since the teacher's
//! fanout accept loop just breaks out on the first accept error.

use crate::connection::Connection;
use crate::error::CoreError;
use crate::options::{ServerOptions, ACCEPT_MAX_SLEEP, ACCEPT_MIN_SLEEP};
use crate::registry::Registry;
use arc_swap::ArcSwap;
use broker_protocol::ConnKind;
use broker_sublist::Sublist;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// The running broker: a bound listener, the shared subject-matching
/// engine, the live-connection registry, and an atomically-swappable
/// options snapshot (`arc-swap`, spec.md §9: "Options are read through an
/// atomic snapshot pointer, not a lock, since every connection reads them
/// far more often than an operator reloads config").
pub struct Server {
    listener: TcpListener,
    sublist: Arc<Sublist>,
    registry: Arc<Registry>,
    options: Arc<ArcSwap<ServerOptions>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub async fn bind(addr: std::net::SocketAddr, options: ServerOptions) -> Result<Server, CoreError> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Server {
            listener,
            sublist: Arc::new(Sublist::new()),
            registry: Arc::new(Registry::new()),
            options: Arc::new(ArcSwap::new(Arc::new(options))),
            shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Swaps in a new options snapshot. Already-accepted connections keep
    /// the snapshot they were handed at accept time (spec.md §9's "copy on
    /// each accept" resolution of the live-reconfiguration open question);
    /// only subsequently accepted connections see the update.
    pub fn update_options(&self, options: ServerOptions) {
        self.options.store(Arc::new(options));
    }

    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn sublist(&self) -> Arc<Sublist> {
        self.sublist.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs the accept loop until told to shut down. On a transient accept
    /// error, backs off exponentially between `ACCEPT_MIN_SLEEP` and
    /// `ACCEPT_MAX_SLEEP` rather than busy-looping or giving up outright.
    /// Each spawned connection gets its own shutdown receiver so it closes
    /// itself once the signal fires; `run` doesn't return until every
    /// spawned connection has actually exited, so awaiting this future is
    /// enough for a caller to know the whole server — not just the accept
    /// loop — has shut down.
    pub async fn run(self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut backoff = ACCEPT_MIN_SLEEP;
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            backoff = ACCEPT_MIN_SLEEP;
                            let opts = self.options.load_full();
                            if opts.max_conn != 0 && self.registry.len() >= opts.max_conn {
                                tracing::warn!(%peer, "rejecting connection, at capacity");
                                reject_over_capacity(stream).await;
                                continue;
                            }
                            let id = self.registry.next_id();
                            let registry = self.registry.clone();
                            let sublist = self.sublist.clone();
                            tracing::debug!(conn_id = id, %peer, "accepted connection");
                            connections.spawn(Connection::serve(
                                id,
                                ConnKind::Client,
                                stream,
                                registry,
                                sublist,
                                opts,
                                self.shutdown_tx.subscribe(),
                            ));
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed, backing off");
                            tokio::time::sleep(backoff).await;
                            backoff = (backoff * 2).min(ACCEPT_MAX_SLEEP);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested, accept loop exiting");
                    break;
                }
            }
        }

        tracing::info!(pending = connections.len(), "waiting for in-flight connections to close");
        while connections.join_next().await.is_some() {}
    }
}

/// A full server doesn't get far enough to run the parser before
/// rejecting an over-capacity client, so this writes the `-ERR` directly.
async fn reject_over_capacity(mut stream: tokio::net::TcpStream) {
    use tokio::io::AsyncWriteExt;
    let _ = stream
        .write_all(Bytes::from_static(b"-ERR 'Maximum Connections Exceeded'\r\n").as_ref())
        .await;
    let _ = stream.shutdown().await;
}
