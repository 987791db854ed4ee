// crates/server/src/config.rs
//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `TUBEFETCH_PORT` (or `PORT`) | `3001` |
//! | `TUBEFETCH_HOST` | `0.0.0.0` |
//! | `TUBEFETCH_DOWNLOADS_DIR` | `./downloads` |
//! | `TUBEFETCH_WORKER_BIN` | `yt-dlp` |
//! | `TUBEFETCH_CLEANUP_GRACE_SECS` | `5` |
//! | `TUBEFETCH_RETENTION_SECS` | `3600` (`0` keeps finished jobs forever) |
//!
//! Values that fail to parse fall back to the default with a warning.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tubefetch_core::WorkerCommand;

use crate::artifacts::{DEFAULT_GRACE_PERIOD, DEFAULT_RETENTION};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub downloads_dir: PathBuf,
    pub worker: WorkerCommand,
    pub cleanup_grace: Duration,
    /// Finished jobs older than this are swept. Zero disables the sweep.
    pub retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
            worker: WorkerCommand::default(),
            cleanup_grace: DEFAULT_GRACE_PERIOD,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = get("TUBEFETCH_PORT")
            .map(|v| ("TUBEFETCH_PORT", v))
            .or_else(|| get("PORT").map(|v| ("PORT", v)))
            .map(|(key, v)| parse_or(key, &v, defaults.port))
            .unwrap_or(defaults.port);
        let host = get("TUBEFETCH_HOST")
            .map(|v| parse_or("TUBEFETCH_HOST", &v, defaults.host))
            .unwrap_or(defaults.host);
        let cleanup_grace = get("TUBEFETCH_CLEANUP_GRACE_SECS")
            .map(|v| {
                Duration::from_secs(parse_or(
                    "TUBEFETCH_CLEANUP_GRACE_SECS",
                    &v,
                    defaults.cleanup_grace.as_secs(),
                ))
            })
            .unwrap_or(defaults.cleanup_grace);
        let retention = get("TUBEFETCH_RETENTION_SECS")
            .map(|v| {
                Duration::from_secs(parse_or(
                    "TUBEFETCH_RETENTION_SECS",
                    &v,
                    defaults.retention.as_secs(),
                ))
            })
            .unwrap_or(defaults.retention);

        Self {
            host,
            port,
            downloads_dir: get("TUBEFETCH_DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.downloads_dir),
            worker: get("TUBEFETCH_WORKER_BIN")
                .map(WorkerCommand::new)
                .unwrap_or(defaults.worker),
            cleanup_grace,
            retention,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, value: &str, default: T) -> T {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(key, value, %default, "unparseable config value, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(config.worker.program, "yt-dlp");
        assert_eq!(config.cleanup_grace, Duration::from_secs(5));
        assert_eq!(config.retention, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TUBEFETCH_PORT", "8080"),
            ("TUBEFETCH_HOST", "127.0.0.1"),
            ("TUBEFETCH_DOWNLOADS_DIR", "/srv/dl"),
            ("TUBEFETCH_WORKER_BIN", "/usr/local/bin/yt-dlp"),
            ("TUBEFETCH_CLEANUP_GRACE_SECS", "30"),
            ("TUBEFETCH_RETENTION_SECS", "0"),
        ]);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.downloads_dir, PathBuf::from("/srv/dl"));
        assert_eq!(config.worker.program, "/usr/local/bin/yt-dlp");
        assert_eq!(config.cleanup_grace, Duration::from_secs(30));
        assert_eq!(config.retention, Duration::ZERO);
    }

    #[test]
    fn test_port_precedence() {
        assert_eq!(config_from(&[("PORT", "9000")]).port, 9000);
        assert_eq!(
            config_from(&[("PORT", "9000"), ("TUBEFETCH_PORT", "9001")]).port,
            9001
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("TUBEFETCH_PORT", "not-a-port"),
            ("TUBEFETCH_HOST", "nowhere"),
            ("TUBEFETCH_CLEANUP_GRACE_SECS", "-1"),
            ("TUBEFETCH_DOWNLOADS_DIR", "   "),
        ]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.cleanup_grace, DEFAULT_GRACE_PERIOD);
        assert_eq!(config.downloads_dir, PathBuf::from(DEFAULT_DOWNLOADS_DIR));
    }
}
