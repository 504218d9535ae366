#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod limiter;
pub mod tcp;
pub mod telemetry;

pub use config::{load_from_path, Config, Upstream};
pub use error::{GatewayError, Result};
pub use limiter::{RefillTask, TokenBucket};
pub use tcp::{run, ConnectionCount, SessionContext, TOO_MANY_REQUESTS};
