//! Resolution of the five canonical bootstrap parameters.

use crate::env::{self, EnvSnapshot};
use crate::error::{DistError, Result};
use crate::types::Rank;
use std::fmt;

/// Default rendezvous URL for explicit-parameter initialization.
pub const DEFAULT_RENDEZVOUS_URL: &str = "tcp://127.0.0.1:23456";

/// Resolved process-group bootstrap parameters.
///
/// Built once at init and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub address: String,
    /// `None` only when no rendezvous is needed (`world_size == 1`).
    pub port: Option<u16>,
    pub world_size: u32,
    pub rank: Rank,
    pub local_rank: u32,
}

impl BootstrapConfig {
    /// Resolve from an environment snapshot, including the SLURM fallbacks.
    pub fn from_env(env: &EnvSnapshot) -> Result<Self> {
        let cfg = Self {
            address: env.resolve_master_addr()?,
            port: env.resolve_master_port()?,
            world_size: env.resolve_u32(&[env::WORLD_SIZE, env::SLURM_NTASKS], 1)?,
            rank: env.resolve_u32(&[env::RANK, env::SLURM_PROCID], 0)?,
            local_rank: env.resolve_u32(&[env::LOCAL_RANK, env::SLURM_LOCALID], 0)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check `0 <= local_rank <= rank < world_size`.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(DistError::InvalidConfig("world size must be at least 1".into()));
        }
        if self.rank >= self.world_size {
            return Err(DistError::InvalidConfig(format!(
                "rank {} out of range for world size {}",
                self.rank, self.world_size
            )));
        }
        if self.local_rank > self.rank {
            return Err(DistError::InvalidConfig(format!(
                "local rank {} exceeds global rank {}",
                self.local_rank, self.rank
            )));
        }
        Ok(())
    }

    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    pub fn is_master(&self) -> bool {
        self.rank == 0
    }

    /// Environment-based rendezvous target. Requires `MASTER_PORT`.
    pub fn env_init_method(&self) -> Result<InitMethod> {
        let port = self.port.ok_or(DistError::MissingEnv {
            var: env::MASTER_PORT,
        })?;
        Ok(InitMethod::Env {
            address: self.address.clone(),
            port,
        })
    }

    /// Resolved values that init writes back into the process environment.
    pub fn env_updates(&self) -> Vec<(&'static str, String)> {
        vec![
            (env::MASTER_ADDR, self.address.clone()),
            (env::RANK, self.rank.to_string()),
            (env::WORLD_SIZE, self.world_size.to_string()),
        ]
    }

    /// Write [`env_updates`](Self::env_updates) into this process's environment
    /// so that code (and children) started later observe the same values.
    pub(crate) fn apply_to_process_env(&self) {
        for (key, value) in self.env_updates() {
            // SAFETY: called once from the process-wide init entry point,
            // which is the only writer of these variables.
            unsafe { std::env::set_var(key, value) };
        }
    }

    /// `address:port` as shown in diagnostics.
    pub fn display_addr(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.address),
            None => format!("{}:<unset {}>", self.address, env::MASTER_PORT),
        }
    }
}

/// How ranks find each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitMethod {
    /// `env://`: address and port taken from the environment.
    Env { address: String, port: u16 },
    /// `tcp://host:port`.
    Tcp { host: String, port: u16 },
}

impl InitMethod {
    /// Parse a `tcp://host:port` URL. IPv6 hosts use brackets.
    pub fn parse_url(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix("tcp://")
            .ok_or_else(|| DistError::InvalidInitMethod(url.to_string()))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| DistError::InvalidInitMethod(url.to_string()))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(DistError::InvalidInitMethod(url.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| DistError::InvalidInitMethod(url.to_string()))?;
        Ok(InitMethod::Tcp {
            host: host.to_string(),
            port,
        })
    }

    /// Parse `url`, resolving `env://` from `env`'s `MASTER_ADDR` and
    /// `MASTER_PORT`.
    pub fn parse_with_env(url: &str, env: &EnvSnapshot) -> Result<Self> {
        if url.trim() != "env://" {
            return Self::parse_url(url);
        }
        let port = env.resolve_master_port()?.ok_or(DistError::MissingEnv {
            var: env::MASTER_PORT,
        })?;
        Ok(InitMethod::Env {
            address: env.resolve_master_addr()?,
            port,
        })
    }

    /// Host and port of the rank-0 rendezvous endpoint.
    pub fn endpoint(&self) -> (&str, u16) {
        match self {
            InitMethod::Env { address, port } => (address, *port),
            InitMethod::Tcp { host, port } => (host, *port),
        }
    }
}

impl fmt::Display for InitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitMethod::Env { address, port } => write!(f, "{address}:{port}"),
            InitMethod::Tcp { host, port } if host.contains(':') => {
                write!(f, "tcp://[{host}]:{port}")
            }
            InitMethod::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

/// Explicit multi-machine layout, one process per device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitParams {
    pub local_rank: u32,
    pub machine_rank: u32,
    pub devices_per_machine: u32,
    pub num_machines: u32,
    pub rendezvous_url: String,
}

impl ExplicitParams {
    pub fn new(
        local_rank: u32,
        machine_rank: u32,
        devices_per_machine: u32,
        num_machines: u32,
    ) -> Self {
        Self {
            local_rank,
            machine_rank,
            devices_per_machine,
            num_machines,
            rendezvous_url: DEFAULT_RENDEZVOUS_URL.to_string(),
        }
    }

    pub fn with_rendezvous_url(mut self, url: impl Into<String>) -> Self {
        self.rendezvous_url = url.into();
        self
    }

    /// `num_machines * devices_per_machine`.
    pub fn world_size(&self) -> Result<u32> {
        self.num_machines
            .checked_mul(self.devices_per_machine)
            .ok_or_else(|| DistError::InvalidConfig("world size overflows u32".into()))
    }

    /// `machine_rank * devices_per_machine + local_rank`.
    pub fn rank(&self) -> Result<Rank> {
        self.machine_rank
            .checked_mul(self.devices_per_machine)
            .and_then(|r| r.checked_add(self.local_rank))
            .ok_or_else(|| DistError::InvalidConfig("rank overflows u32".into()))
    }

    /// Derive the bootstrap config and rendezvous target.
    pub fn resolve(&self) -> Result<(BootstrapConfig, InitMethod)> {
        if self.devices_per_machine == 0 || self.num_machines == 0 {
            return Err(DistError::InvalidConfig(
                "devices per machine and number of machines must be at least 1".into(),
            ));
        }
        if self.local_rank >= self.devices_per_machine {
            return Err(DistError::InvalidConfig(format!(
                "local rank {} out of range for {} devices per machine",
                self.local_rank, self.devices_per_machine
            )));
        }
        if self.machine_rank >= self.num_machines {
            return Err(DistError::InvalidConfig(format!(
                "machine rank {} out of range for {} machines",
                self.machine_rank, self.num_machines
            )));
        }

        let init = InitMethod::parse_url(&self.rendezvous_url)?;
        let (host, port) = init.endpoint();
        let cfg = BootstrapConfig {
            address: host.to_string(),
            port: Some(port),
            world_size: self.world_size()?,
            rank: self.rank()?,
            local_rank: self.local_rank,
        };
        cfg.validate()?;
        Ok((cfg, init))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::*;

    #[test]
    fn test_defaults_without_env() {
        let cfg = BootstrapConfig::from_env(&EnvSnapshot::default()).unwrap();
        assert_eq!(
            cfg,
            BootstrapConfig {
                address: "localhost".into(),
                port: None,
                world_size: 1,
                rank: 0,
                local_rank: 0,
            }
        );
        assert!(!cfg.is_distributed());
        assert!(cfg.is_master());
    }

    #[test]
    fn test_slurm_fallbacks() {
        let env = EnvSnapshot::from_pairs([
            (SLURM_NODELIST, "gpu07,gpu08"),
            (SLURM_PROCID, "3"),
            (SLURM_NTASKS, "4"),
            (SLURM_LOCALID, "1"),
            (MASTER_PORT, "29500"),
        ]);
        let cfg = BootstrapConfig::from_env(&env).unwrap();
        assert_eq!(cfg.address, "gpu08");
        assert_eq!(cfg.port, Some(29500));
        assert_eq!((cfg.rank, cfg.world_size, cfg.local_rank), (3, 4, 1));
    }

    #[test]
    fn test_overrides_beat_slurm() {
        let env = EnvSnapshot::from_pairs([
            (MASTER_ADDR, "head"),
            (SLURM_NODELIST, "gpu07"),
            (RANK, "2"),
            (SLURM_PROCID, "0"),
            (WORLD_SIZE, "4"),
            (SLURM_NTASKS, "1"),
        ]);
        let cfg = BootstrapConfig::from_env(&env).unwrap();
        assert_eq!(cfg.address, "head");
        assert_eq!((cfg.rank, cfg.world_size), (2, 4));
        assert!(!cfg.is_master());
    }

    #[test]
    fn test_invariants_rejected() {
        let env = EnvSnapshot::from_pairs([(RANK, "4"), (WORLD_SIZE, "4")]);
        assert!(matches!(
            BootstrapConfig::from_env(&env),
            Err(DistError::InvalidConfig(_))
        ));

        let env = EnvSnapshot::from_pairs([(RANK, "1"), (WORLD_SIZE, "4"), (LOCAL_RANK, "2")]);
        assert!(matches!(
            BootstrapConfig::from_env(&env),
            Err(DistError::InvalidConfig(_))
        ));

        let env = EnvSnapshot::from_pairs([(WORLD_SIZE, "0")]);
        assert!(BootstrapConfig::from_env(&env).is_err());
    }

    #[test]
    fn test_env_init_method_requires_port() {
        let env = EnvSnapshot::from_pairs([(RANK, "1"), (WORLD_SIZE, "2")]);
        let cfg = BootstrapConfig::from_env(&env).unwrap();
        assert!(matches!(
            cfg.env_init_method(),
            Err(DistError::MissingEnv { var: MASTER_PORT })
        ));
        assert_eq!(cfg.display_addr(), "localhost:<unset MASTER_PORT>");
    }

    #[test]
    fn test_env_updates() {
        let env = EnvSnapshot::from_pairs([(SLURM_PROCID, "1"), (SLURM_NTASKS, "2")]);
        let cfg = BootstrapConfig::from_env(&env).unwrap();
        assert_eq!(
            cfg.env_updates(),
            vec![
                (MASTER_ADDR, "localhost".to_string()),
                (RANK, "1".to_string()),
                (WORLD_SIZE, "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_rank_math() {
        let p = ExplicitParams::new(1, 1, 2, 2);
        let (cfg, init) = p.resolve().unwrap();
        assert_eq!(cfg.world_size, 4);
        assert_eq!(cfg.rank, 3);
        assert_eq!(cfg.local_rank, 1);
        assert_eq!(
            init,
            InitMethod::Tcp {
                host: "127.0.0.1".into(),
                port: 23456
            }
        );
    }

    #[test]
    fn test_explicit_out_of_range() {
        assert!(ExplicitParams::new(2, 0, 2, 1).resolve().is_err());
        assert!(ExplicitParams::new(0, 3, 2, 3).resolve().is_err());
        assert!(ExplicitParams::new(0, 0, 0, 1).resolve().is_err());
    }

    #[test]
    fn test_parse_url() {
        assert_eq!(
            InitMethod::parse_url("tcp://[::1]:4000").unwrap(),
            InitMethod::Tcp {
                host: "::1".into(),
                port: 4000
            }
        );
        assert!(InitMethod::parse_url("env://").is_err());
        assert!(InitMethod::parse_url("tcp://host").is_err());
        assert!(InitMethod::parse_url("tcp://:80").is_err());
        assert!(InitMethod::parse_url("file:///tmp/rdzv").is_err());
    }

    #[test]
    fn test_parse_env_url_needs_snapshot() {
        let env = EnvSnapshot::from_pairs([(env::MASTER_ADDR, "head"), (env::MASTER_PORT, "29500")]);
        assert_eq!(
            InitMethod::parse_with_env("env://", &env).unwrap(),
            InitMethod::Env {
                address: "head".into(),
                port: 29500
            }
        );
        assert!(matches!(
            InitMethod::parse_with_env("env://", &EnvSnapshot::default()),
            Err(DistError::MissingEnv { var: env::MASTER_PORT })
        ));
        assert!(matches!(
            InitMethod::parse_with_env("tcp://h:1", &EnvSnapshot::default()),
            Ok(InitMethod::Tcp { .. })
        ));
    }

    #[test]
    fn test_display() {
        let m = InitMethod::parse_url("tcp://[::1]:4000").unwrap();
        assert_eq!(m.to_string(), "tcp://[::1]:4000");
        let m = InitMethod::Env {
            address: "head".into(),
            port: 29500,
        };
        assert_eq!(m.to_string(), "head:29500");
    }
}
