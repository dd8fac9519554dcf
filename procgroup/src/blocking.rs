use crate::bootstrap::ExplicitParams;
use crate::dist::Distributed;
use crate::env::EnvSnapshot;
use crate::error::{DistError, Result};
use crate::types::{Backend, Element, Rank};

/// Blocking wrapper around [`Distributed`].
///
/// Owns a `tokio::runtime::Runtime` and calls `block_on()` for each operation.
pub struct BlockingDistributed {
    inner: Distributed,
    rt: tokio::runtime::Runtime,
}

impl BlockingDistributed {
    pub fn new(inner: Distributed) -> Result<Self> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| DistError::transport_with_source("tokio runtime", e))?;
        Ok(Self { inner, rt })
    }

    pub fn inner(&self) -> &Distributed {
        &self.inner
    }

    pub fn init_from_env(&self, backend: Backend) -> Result<u32> {
        self.rt.block_on(self.inner.init_from_env(backend))
    }

    pub fn init_with_env(&self, env: &EnvSnapshot, backend: Backend) -> Result<u32> {
        self.rt.block_on(self.inner.init_with_env(env, backend))
    }

    pub fn init_with_params(&self, params: &ExplicitParams, backend: Backend) -> Result<u32> {
        self.rt.block_on(self.inner.init_with_params(params, backend))
    }

    pub fn synchronize(&self) -> Result<()> {
        self.rt.block_on(self.inner.synchronize())
    }

    pub fn mean_reduce<T: Element>(&self, data: &mut [T]) -> Result<()> {
        self.rt.block_on(self.inner.mean_reduce(data))
    }

    pub fn rank(&self) -> Rank {
        self.inner.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.inner.world_size()
    }

    pub fn is_master(&self) -> bool {
        self.inner.is_master()
    }
}
