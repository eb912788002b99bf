//! Listener, accept loop and shutdown.
//!
//! [`App::listen`](crate::App::listen) binds, spawns the accept loop and hands
//! back a [`Server`]. The handle is only needed to stop the server; dropping
//! it leaves the server running.
//!
//! Stopping:
//! 1. `listener.accept()` is no longer polled and the listener is dropped,
//!    so no new connections.
//! 2. Every open connection is asked to shut down: a request in flight
//!    still gets its response, an idle keep-alive connection closes at once.
//! 3. [`Server::close`] returns once every connection task has finished.
//!
//! The database pool is not touched. Close it separately with
//! [`App::close`](crate::App::close).

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

use crate::dispatch::{Shared, dispatch};
use crate::error::Error;

/// Handle to a listening server.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Server {
    /// Bind `addr`, report the bound address to `on_listening`, and start
    /// accepting in the background.
    pub(crate) async fn start<F>(shared: Shared, addr: SocketAddr, on_listening: F) -> Result<Self, Error>
    where
        F: FnOnce(SocketAddr),
    {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        info!(%addr, "sprig listening");
        on_listening(addr);

        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(accept_loop(listener, Arc::new(shared), Arc::clone(&shutdown)));

        Ok(Self { addr, shutdown, task })
    }

    /// The bound address. Useful after binding port `0`.
    pub fn local_addr(&self) -> SocketAddr { self.addr }

    /// Stop accepting, close idle connections and wait for in-flight
    /// requests to finish.
    pub async fn close(self) {
        // `notify_one` stores a permit, so this is not lost if the loop is
        // busy accepting right now.
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            error!("accept loop failed: {e}");
        }
    }

    /// Run until SIGTERM or Ctrl-C, then [`close`](Server::close).
    pub async fn shutdown_on_signal(self) {
        shutdown_signal().await;
        self.close().await;
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, shutdown: Arc<Notify>) {
    let builder = ConnBuilder::new(TokioExecutor::new());
    // Every connection is watched so shutdown can tell idle keep-alive
    // connections to close instead of waiting on the client.
    let graceful = GracefulShutdown::new();
    // Tracks every spawned connection task so shutdown can wait for them.
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            // Check shutdown first so a close stops accepting immediately,
            // even if more connections are queued.
            biased;

            () = shutdown.notified() => {
                info!(open = tasks.len(), "shutting down, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let shared = Arc::clone(&shared);
                let io = TokioIo::new(stream);

                // Called once per request on the connection.
                let svc = service_fn(move |req| {
                    let shared = Arc::clone(&shared);
                    async move {
                        Ok::<_, std::convert::Infallible>(
                            dispatch(&shared.router, &shared.db, req).await,
                        )
                    }
                });

                // HTTP/1.1 or HTTP/2, whatever the client speaks.
                let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());

                tasks.spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks so the set does not grow without
            // bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Refuse new connections while the open ones wind down.
    drop(listener);

    // In-flight requests finish and get their response; idle connections
    // are closed right away.
    graceful.shutdown().await;
    while tasks.join_next().await.is_some() {}

    info!("sprig stopped");
}

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere.
///
/// A signal that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
