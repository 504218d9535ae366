mod loader;
mod types;

pub use loader::{load_from_path, MAX_READ_CHUNK_BYTES};
pub use types::{
    Config, LimiterConfig, LoggingConfig, SessionConfig, TimeoutConfig, Upstream,
};
