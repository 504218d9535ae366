use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GatewayError, Result};

/// Largest accepted `session.read_chunk_bytes`. Two buffers of this size are
/// allocated per session.
pub const MAX_READ_CHUNK_BYTES: usize = 1024 * 1024;

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let path = p.as_ref();
    let txt = fs::read_to_string(path).map_err(|e| {
        GatewayError::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    Config::from_yaml_str(&txt)
}

impl Config {
    pub fn from_yaml_str(txt: &str) -> Result<Config> {
        let cfg: Config = serde_norway::from_str(txt)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))?;

        validate_config(&cfg)?;

        Ok(cfg)
    }
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.upstreams.is_empty() {
        return Err(GatewayError::NoUpstreams);
    }

    for (idx, upstream) in cfg.upstreams.iter().enumerate() {
        if upstream.host.trim().is_empty() {
            return Err(GatewayError::Config(format!("Upstream #{idx} has an empty host")));
        }
        if upstream.port == 0 {
            return Err(GatewayError::Config(format!(
                "Upstream #{idx} ({}) has port 0",
                upstream.host
            )));
        }
    }

    if cfg.limiter.capacity == 0 {
        return Err(GatewayError::Config("limiter.capacity must be greater than 0".into()));
    }
    if cfg.limiter.refill_secs == 0 {
        return Err(GatewayError::Config("limiter.refill_secs must be greater than 0".into()));
    }
    if cfg.session.read_chunk_bytes == 0 {
        return Err(GatewayError::Config(
            "session.read_chunk_bytes must be greater than 0".into(),
        ));
    }
    if cfg.session.read_chunk_bytes > MAX_READ_CHUNK_BYTES {
        return Err(GatewayError::Config(format!(
            "session.read_chunk_bytes must be at most {MAX_READ_CHUNK_BYTES}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Upstream;

    #[test]
    fn parses_upstream_list_in_order() -> Result<()> {
        let cfg = Config::from_yaml_str(
            r#"
upstream:
  - host: 127.0.0.1
    port: 9001
  - host: localhost
    port: 9002
"#,
        )?;
        assert_eq!(cfg.upstreams.len(), 2);
        assert_eq!(cfg.upstreams[0].to_string(), "127.0.0.1:9001");
        assert_eq!(cfg.upstreams[1].to_string(), "localhost:9002");
        assert_eq!(cfg.limiter.capacity, 10);
        assert_eq!(cfg.limiter.refill_secs, 60);
        assert_eq!(cfg.session.read_chunk_bytes, 2046);
        assert!(cfg.session.max_sessions.is_none());
        assert!(cfg.timeout.connect().is_none());
        Ok(())
    }

    #[test]
    fn rejects_empty_upstream_list() {
        let res = Config::from_yaml_str("upstream: []\n");
        assert!(matches!(res, Err(GatewayError::NoUpstreams)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let res = Config::from_yaml_str(
            r#"
upstream:
  - host: localhost
    port: 9000
limiter:
  capacity: 0
"#,
        );
        assert!(matches!(res, Err(GatewayError::Config(_))));
    }

    #[test]
    fn read_chunk_bytes_is_bounded() -> Result<()> {
        let yaml = |chunk: usize| {
            format!(
                "upstream:\n  - host: localhost\n    port: 9000\n\
                 session:\n  read_chunk_bytes: {chunk}\n"
            )
        };
        let cfg = Config::from_yaml_str(&yaml(MAX_READ_CHUNK_BYTES))?;
        assert_eq!(cfg.session.read_chunk_bytes, MAX_READ_CHUNK_BYTES);

        let res = Config::from_yaml_str(&yaml(MAX_READ_CHUNK_BYTES + 1));
        assert!(matches!(res, Err(GatewayError::Config(msg)) if msg.contains("read_chunk_bytes")));
        Ok(())
    }

    #[test]
    fn rejects_missing_upstream_key() {
        let res = Config::from_yaml_str("limiter:\n  capacity: 3\n");
        assert!(matches!(res, Err(GatewayError::Config(_))));
    }

    #[test]
    fn ipv6_upstream_is_bracketed() {
        assert_eq!(Upstream::new("::1", 9000).to_string(), "[::1]:9000");
    }
}
