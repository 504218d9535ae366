#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::Config;
use crate::limiter::TokenBucket;
use crate::tcp::metrics::ConnectionCount;
use crate::tcp::response::TOO_MANY_REQUESTS;
use crate::tcp::upstream::UpstreamConnection;

/// Failures that end a client session.
///
/// Any upstream failure aborts the whole session: the remaining upstreams are
/// not contacted and the client connection is dropped.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client read failed: {0}")]
    ClientRead(#[source] std::io::Error),
    #[error("client write failed: {0}")]
    ClientWrite(#[source] std::io::Error),
    #[error("connect to upstream {upstream} failed: {source}")]
    UpstreamConnect {
        upstream: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write to upstream {upstream} failed: {source}")]
    UpstreamWrite {
        upstream: String,
        #[source]
        source: std::io::Error,
    },
    #[error("read from upstream {upstream} failed: {source}")]
    UpstreamRead {
        upstream: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upstream {upstream} timed out")]
    UpstreamTimeout { upstream: String },
}

/// State shared by every session: configuration, the global bucket and counters.
#[derive(Clone)]
pub struct SessionContext {
    config: Arc<Config>,
    bucket: Arc<TokenBucket>,
    counts: Arc<ConnectionCount>,
}

impl SessionContext {
    pub fn new(
        config: Arc<Config>,
        bucket: Arc<TokenBucket>,
        counts: Arc<ConnectionCount>,
    ) -> Self {
        Self { config, bucket, counts }
    }

    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    pub fn counts(&self) -> &Arc<ConnectionCount> {
        &self.counts
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Drive one client connection until it closes or an I/O error occurs.
///
/// Each read from the client is one message. A message that gets a permit is
/// relayed to every upstream in configured order, one full round trip at a
/// time, and every upstream reply is written back to the client as-is. A
/// message refused by the bucket gets [`TOO_MANY_REQUESTS`] and is dropped.
pub async fn run_session<S>(
    ctx: &SessionContext,
    client: &mut S,
    client_addr: SocketAddr,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let chunk = ctx.config.session.read_chunk_bytes;
    let mut request = vec![0u8; chunk];
    let mut reply = vec![0u8; chunk];

    loop {
        debug!(%client_addr, "awaiting data from client");
        let n = client.read(&mut request).await.map_err(SessionError::ClientRead)?;
        if n == 0 {
            debug!(%client_addr, "client disconnected");
            return Ok(());
        }
        let message = &request[..n];
        debug!(%client_addr, bytes = n, "message received");

        if !ctx.bucket.try_consume() {
            warn!(%client_addr, "rate limit exceeded");
            client.write_all(TOO_MANY_REQUESTS).await.map_err(SessionError::ClientWrite)?;
            continue;
        }
        debug!(%client_addr, remaining = ctx.bucket.remaining(), "tokens remaining");

        relay(ctx, client, client_addr, message, &mut reply).await?;
    }
}

async fn relay<S>(
    ctx: &SessionContext,
    client: &mut S,
    client_addr: SocketAddr,
    message: &[u8],
    reply: &mut [u8],
) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    let timeouts = &ctx.config.timeout;
    for target in &ctx.config.upstreams {
        let mut upstream =
            UpstreamConnection::connect(target, timeouts.connect(), ctx.counts.clone()).await?;
        upstream.send(message).await?;
        let n = upstream.receive(reply, timeouts.upstream_read()).await?;

        debug!(%client_addr, upstream = %target, bytes = n, "forwarding upstream response");
        client.write_all(&reply[..n]).await.map_err(SessionError::ClientWrite)?;

        upstream.close().await;
    }
    Ok(())
}
