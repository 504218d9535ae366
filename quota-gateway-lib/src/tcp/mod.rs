#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::limiter::{RefillTask, TokenBucket};

mod handler;
mod listener;
pub mod metrics;
mod response;
mod session;
mod upstream;

pub use handler::TcpHandler;
pub use listener::{bind, bind_loopback};
pub use metrics::{ConnectionCount, ConnectionSnapshot, SessionGuard};
pub use response::TOO_MANY_REQUESTS;
pub use session::{run_session, SessionContext, SessionError};
pub use upstream::UpstreamConnection;

/// Run the gateway on `127.0.0.1:port` until `shutdown` fires.
///
/// The process-wide token bucket and its refill task exist before the first
/// connection is accepted. The refill task is stopped once the accept loop
/// exits.
pub async fn run(
    config: Arc<Config>,
    port: u16,
    counters: Arc<ConnectionCount>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = bind_loopback(port)?;
    let addr = listener.local_addr()?;
    let bucket = Arc::new(TokenBucket::from_config(&config.limiter));
    let refill = RefillTask::spawn(bucket.clone(), shutdown.clone());
    info!(
        %addr,
        upstreams = config.upstreams.len(),
        capacity = bucket.capacity(),
        refill_secs = bucket.refill_interval().as_secs(),
        "tcp listener bound"
    );

    let handler = TcpHandler::new(SessionContext::new(config, bucket, counters));
    handler.run(listener, &mut shutdown).await;

    refill.stop().await;
    Ok(())
}
