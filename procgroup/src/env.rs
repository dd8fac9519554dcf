//! Immutable view of the process environment and the variable fallback chains.
//!
//! Every chain is "explicit override → scheduler variable → default". A
//! variable that is set but empty counts as unset.

use crate::error::{DistError, Result};
use std::collections::HashMap;

pub const MASTER_ADDR: &str = "MASTER_ADDR";
pub const MASTER_PORT: &str = "MASTER_PORT";
pub const RANK: &str = "RANK";
pub const WORLD_SIZE: &str = "WORLD_SIZE";
pub const LOCAL_RANK: &str = "LOCAL_RANK";

pub const SLURM_NODELIST: &str = "SLURM_NODELIST";
pub const SLURM_PROCID: &str = "SLURM_PROCID";
pub const SLURM_NTASKS: &str = "SLURM_NTASKS";
pub const SLURM_LOCALID: &str = "SLURM_LOCALID";

pub const DEFAULT_MASTER_ADDR: &str = "localhost";

/// Snapshot of environment variables taken once at init.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, or `None` when unset or empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First set variable in `chain`, with the name that supplied it.
    pub fn first_of(&self, chain: &[&'static str]) -> Option<(&'static str, &str)> {
        chain.iter().find_map(|&k| self.get(k).map(|v| (k, v)))
    }

    /// Resolve an unsigned integer through `chain`, falling back to `default`.
    pub fn resolve_u32(&self, chain: &[&'static str], default: u32) -> Result<u32> {
        match self.first_of(chain) {
            Some((var, value)) => parse_u32(var, value),
            None => Ok(default),
        }
    }

    /// `MASTER_ADDR` → last entry of `SLURM_NODELIST` → `localhost`.
    pub fn resolve_master_addr(&self) -> Result<String> {
        if let Some(addr) = self.get(MASTER_ADDR) {
            return Ok(addr.to_string());
        }
        if let Some(list) = self.get(SLURM_NODELIST) {
            if let Some(host) = last_nodelist_host(list)? {
                return Ok(host);
            }
        }
        Ok(DEFAULT_MASTER_ADDR.to_string())
    }

    /// `MASTER_PORT`, which has no fallback.
    pub fn resolve_master_port(&self) -> Result<Option<u16>> {
        match self.get(MASTER_PORT) {
            Some(v) => v.parse::<u16>().map(Some).map_err(|e| DistError::InvalidEnv {
                var: MASTER_PORT,
                value: v.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }
}

fn parse_u32(var: &'static str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|e| DistError::InvalidEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Last host of a comma-separated SLURM node list.
///
/// Commas inside brackets do not split. Bracketed host ranges
/// (`node[01-04]`) are rejected rather than expanded.
pub fn last_nodelist_host(list: &str) -> Result<Option<String>> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut last = None;
    for (i, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                last = non_empty(&list[start..i]).or(last);
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = non_empty(&list[start..]).or(last);

    match last {
        Some(host) if host.contains('[') || host.contains(']') => Err(DistError::InvalidEnv {
            var: SLURM_NODELIST,
            value: list.to_string(),
            reason: format!(
                "host range {host:?} cannot be used as a rendezvous address; set {MASTER_ADDR}"
            ),
        }),
        other => Ok(other.map(str::to_string)),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}
