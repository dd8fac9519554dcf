//! Process-wide helper backed by a single [`Distributed`].
//!
//! The queries answer as a single process (rank 0, world size 1) until
//! an init call has formed a group.

use crate::bootstrap::ExplicitParams;
use crate::dist::Distributed;
use crate::error::{DistError, Result};
use crate::types::{Backend, Element, Rank};
use std::sync::OnceLock;

static GLOBAL: OnceLock<Distributed> = OnceLock::new();

/// Install a custom helper (runtimes, device) before the first init.
pub fn install(dist: Distributed) -> Result<()> {
    GLOBAL.set(dist).map_err(|_| DistError::AlreadyInitialized)
}

/// The process-wide helper, created with defaults on first use.
pub fn global() -> &'static Distributed {
    GLOBAL.get_or_init(Distributed::new)
}

/// Initialize from `MASTER_ADDR`, `MASTER_PORT`, `WORLD_SIZE`, `RANK` and
/// `LOCAL_RANK`, or the SLURM variables standing in for them. Returns the
/// bound local rank.
pub async fn init_from_env(backend: Backend) -> Result<u32> {
    global().init_from_env(backend).await
}

/// Initialize from an explicit machine layout. Returns the bound local rank.
pub async fn init_with_params(params: &ExplicitParams, backend: Backend) -> Result<u32> {
    global().init_with_params(params, backend).await
}

/// Barrier across the process group.
pub async fn synchronize() -> Result<()> {
    match GLOBAL.get() {
        Some(dist) => dist.synchronize().await,
        None => Ok(()),
    }
}

pub fn world_size() -> u32 {
    GLOBAL.get().map_or(1, Distributed::world_size)
}

pub fn rank() -> Rank {
    GLOBAL.get().map_or(0, Distributed::rank)
}

/// Useful to gate checkpointing and logging. Always true for a single process.
pub fn is_master_process() -> bool {
    rank() == 0
}

/// Average `data` across all processes in place.
pub async fn mean_reduce<T: Element>(data: &mut [T]) -> Result<()> {
    match GLOBAL.get() {
        Some(dist) => dist.mean_reduce(data).await,
        None => Ok(()),
    }
}
