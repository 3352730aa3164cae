// crates/server/src/config.rs
//! Server configuration read from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

/// Finished jobs are kept this long before the sweeper may evict them.
pub const DEFAULT_JOB_TTL_SECS: u64 = 3600;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub job_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            job_ttl: Duration::from_secs(DEFAULT_JOB_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    /// Read `FINTRACK_HOST`, `FINTRACK_PORT` (then `PORT`),
    /// `FINTRACK_JOB_TTL_SECS` and `FINTRACK_SWEEP_INTERVAL_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values fall back to
    /// the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port_raw = lookup("FINTRACK_PORT").or_else(|| lookup("PORT"));

        Self {
            host: parse_or("FINTRACK_HOST", lookup("FINTRACK_HOST"), defaults.host),
            port: parse_or("FINTRACK_PORT", port_raw, defaults.port),
            job_ttl: Duration::from_secs(parse_or(
                "FINTRACK_JOB_TTL_SECS",
                lookup("FINTRACK_JOB_TTL_SECS"),
                DEFAULT_JOB_TTL_SECS,
            )),
            sweep_interval: Duration::from_secs(
                parse_or(
                    "FINTRACK_SWEEP_INTERVAL_SECS",
                    lookup("FINTRACK_SWEEP_INTERVAL_SECS"),
                    DEFAULT_SWEEP_INTERVAL_SECS,
                )
                .max(1),
            ),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable config value");
            default
        }),
    }
}
