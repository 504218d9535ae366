#![forbid(unsafe_code)]

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::tcp::metrics::SessionGuard;
use crate::tcp::session::{run_session, SessionContext};

/// Accept loop: one spawned session per client connection, all sharing the
/// same [`SessionContext`].
pub struct TcpHandler {
    ctx: SessionContext,
}

impl TcpHandler {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Accept connections until `shutdown` turns `true` or its sender is
    /// dropped. Sessions already running are left to finish on their own.
    pub async fn run(&self, listener: TcpListener, shutdown: &mut watch::Receiver<bool>) {
        let max_sessions = self.ctx.config().session.max_sessions;
        loop {
            let result = tokio::select! {
                res = listener.accept() => res,
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        info!("shutdown signal received, stopping accept loop");
                        break;
                    }
                    continue;
                }
            };
            let (client, addr) = match result {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let counts = self.ctx.counts();
            if let Some(max) = max_sessions {
                let current = counts.current();
                if current >= max {
                    warn!(%addr, current, max, "session limit reached, dropping");
                    continue;
                }
            }
            let guard = SessionGuard::new(counts.clone());
            let snapshot = counts.snapshot();
            info!(%addr, current = snapshot.current, total = snapshot.total, "client connected");

            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                let _guard = guard;
                handle_conn(ctx, client, addr).await;
            });
        }
    }
}

async fn handle_conn(ctx: SessionContext, mut client: TcpStream, client_addr: SocketAddr) {
    match run_session(&ctx, &mut client, client_addr).await {
        Ok(()) => {
            let _ = client.shutdown().await;
            debug!(%client_addr, "session closed");
        }
        Err(e) => {
            ctx.counts().increment_errors();
            let snapshot = ctx.counts().snapshot();
            warn!(%client_addr, error = %e, errors = snapshot.errors, "session aborted");
        }
    }
}
