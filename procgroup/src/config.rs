//! Runtime-configurable tuning parameters for procgroup.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `PROCGROUP_`) or by constructing a custom `RuntimeConfig`.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Tuning parameters for rendezvous and collectives.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long rank 0 waits for every rank to join, and how long the
    /// other ranks keep retrying the connection to rank 0.
    pub formation_timeout: Duration,

    /// Timeout for barrier operations.
    pub barrier_timeout: Duration,

    /// Timeout for all-reduce and broadcast.
    pub collective_timeout: Duration,

    /// Delay between connection attempts while rank 0 is not listening yet.
    pub connect_retry_interval: Duration,

    /// Interface rank 0 binds its rendezvous listener on.
    pub listen_ip: IpAddr,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            formation_timeout: Duration::from_secs(60),
            barrier_timeout: Duration::from_secs(30),
            collective_timeout: Duration::from_secs(30),
            connect_retry_interval: Duration::from_millis(100),
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl RuntimeConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `PROCGROUP_FORMATION_TIMEOUT_SECS`
    /// - `PROCGROUP_BARRIER_TIMEOUT_SECS`
    /// - `PROCGROUP_COLLECTIVE_TIMEOUT_SECS`
    /// - `PROCGROUP_CONNECT_RETRY_MS`
    /// - `PROCGROUP_LISTEN_IP`
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = get("PROCGROUP_FORMATION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            cfg.formation_timeout = Duration::from_secs(s);
        }
        if let Some(s) = get("PROCGROUP_BARRIER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            cfg.barrier_timeout = Duration::from_secs(s);
        }
        if let Some(s) = get("PROCGROUP_COLLECTIVE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            cfg.collective_timeout = Duration::from_secs(s);
        }
        if let Some(ms) = get("PROCGROUP_CONNECT_RETRY_MS").and_then(|v| v.parse().ok()) {
            cfg.connect_retry_interval = Duration::from_millis(ms);
        }
        if let Some(ip) = get("PROCGROUP_LISTEN_IP").and_then(|v| v.parse().ok()) {
            cfg.listen_ip = ip;
        }

        cfg
    }

    pub fn with_formation_timeout(mut self, timeout: Duration) -> Self {
        self.formation_timeout = timeout;
        self
    }

    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = timeout;
        self
    }

    pub fn with_collective_timeout(mut self, timeout: Duration) -> Self {
        self.collective_timeout = timeout;
        self
    }

    pub fn with_listen_ip(mut self, ip: IpAddr) -> Self {
        self.listen_ip = ip;
        self
    }
}
