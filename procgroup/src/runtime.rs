//! Seam between the bootstrap helper and a collective-communication runtime.

use crate::bootstrap::InitMethod;
use crate::error::Result;
use crate::types::{Backend, Rank, TensorMut};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Arguments to [`CollectiveRuntime::init_process_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequest {
    pub backend: Backend,
    pub init_method: InitMethod,
    pub world_size: u32,
    pub rank: Rank,
}

/// A transport that can form process groups.
pub trait CollectiveRuntime: Send + Sync {
    /// Backend kind this runtime serves.
    fn backend(&self) -> Backend;

    /// Rendezvous with the other ranks and return the formed group.
    ///
    /// Blocks until every rank has joined or the runtime's formation
    /// timeout expires.
    fn init_process_group<'a>(
        &'a self,
        req: &'a GroupRequest,
    ) -> BoxFuture<'a, Result<Arc<dyn ProcessGroup>>>;
}

/// A formed process group.
pub trait ProcessGroup: Send + Sync {
    fn rank(&self) -> Rank;

    fn world_size(&self) -> u32;

    /// Return once every rank has entered the barrier.
    fn barrier(&self) -> BoxFuture<'_, Result<()>>;

    /// Element-wise sum across all ranks, in place. Every rank ends with
    /// the same values.
    fn all_reduce_sum<'a>(&'a self, tensor: TensorMut<'a>) -> BoxFuture<'a, Result<()>>;

    /// Rank 0's `payload` delivered to every rank. Non-root payloads are ignored.
    fn broadcast_from_root(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<Vec<u8>>>;
}
