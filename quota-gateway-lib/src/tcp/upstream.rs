#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Upstream;
use crate::tcp::metrics::ConnectionCount;
use crate::tcp::session::SessionError;

/// One short-lived connection to an upstream, used for a single round trip.
///
/// The socket is closed when the value is dropped, so an aborted round trip
/// never leaks a descriptor.
pub struct UpstreamConnection<'a> {
    stream: TcpStream,
    target: &'a Upstream,
    counts: Arc<ConnectionCount>,
}

impl<'a> UpstreamConnection<'a> {
    pub async fn connect(
        target: &'a Upstream,
        connect_timeout: Option<Duration>,
        counts: Arc<ConnectionCount>,
    ) -> Result<Self, SessionError> {
        let connect = TcpStream::connect((target.host.as_str(), target.port));
        let stream = with_timeout(connect_timeout, connect)
            .await
            .ok_or_else(|| SessionError::UpstreamTimeout { upstream: target.to_string() })?
            .map_err(|source| SessionError::UpstreamConnect {
                upstream: target.to_string(),
                source,
            })?;
        counts.upstream_opened();
        debug!(upstream = %target, "opened upstream connection");
        Ok(Self { stream, target, counts })
    }

    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        debug!(upstream = %self.target, bytes = payload.len(), "forwarding data to upstream");
        self.stream
            .write_all(payload)
            .await
            .map_err(|source| SessionError::UpstreamWrite {
                upstream: self.target.to_string(),
                source,
            })
    }

    /// Single read of at most `buf.len()` bytes. Zero means the upstream closed
    /// without replying.
    pub async fn receive(
        &mut self,
        buf: &mut [u8],
        read_timeout: Option<Duration>,
    ) -> Result<usize, SessionError> {
        debug!(upstream = %self.target, "awaiting response from upstream");
        with_timeout(read_timeout, self.stream.read(buf))
            .await
            .ok_or_else(|| SessionError::UpstreamTimeout { upstream: self.target.to_string() })?
            .map_err(|source| SessionError::UpstreamRead {
                upstream: self.target.to_string(),
                source,
            })
    }

    pub async fn close(mut self) {
        info!(upstream = %self.target, "closing upstream connection");
        let _ = self.stream.shutdown().await;
    }
}

impl Drop for UpstreamConnection<'_> {
    fn drop(&mut self) {
        debug!(upstream = %self.target, "upstream connection closed");
        self.counts.upstream_closed();
    }
}

/// Run `fut` under an optional deadline. `None` means it elapsed.
async fn with_timeout<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}
