//! Star-topology process group over TCP, coordinated by rank 0.

mod allreduce;
mod barrier;
mod broadcast;

use crate::bootstrap::InitMethod;
use crate::cluster::{Coordinator, join_group};
use crate::config::RuntimeConfig;
use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use crate::runtime::{CollectiveRuntime, GroupRequest, ProcessGroup};
use crate::transport::PeerLink;
use crate::types::{Backend, Rank, TensorMut};
use futures::future::BoxFuture;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, MutexGuard};

pub(crate) enum Links {
    /// `world_size == 1`: nothing to talk to.
    Solo,
    /// Rank 0: one link per member, in rank order starting at rank 1.
    Root(Vec<PeerLink>),
    /// Ranks `1..world_size`: the link to rank 0.
    Member(PeerLink),
}

/// A formed TCP process group.
pub struct TcpProcessGroup {
    rank: Rank,
    world_size: u32,
    links: Links,
    /// Epoch of the last issued collective. Held for the duration of each
    /// collective so that operations on this group never interleave.
    epoch: Mutex<u64>,
    config: RuntimeConfig,
}

impl TcpProcessGroup {
    /// Rendezvous at `init`'s endpoint. Rank 0 listens on `config.listen_ip`
    /// at the endpoint's port; other ranks connect to the endpoint.
    pub async fn connect(
        init: &InitMethod,
        world_size: u32,
        rank: Rank,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        if rank >= world_size {
            return Err(DistError::InvalidConfig(format!(
                "rank {rank} out of range for world size {world_size}"
            )));
        }
        let (host, port) = init.endpoint();

        let links = if world_size == 1 {
            Links::Solo
        } else if rank == 0 {
            let coord = Coordinator::bind(config.listen_ip, port, world_size)
                .await?
                .with_formation_timeout(config.formation_timeout);
            tracing::info!(
                "waiting for {} ranks on {}",
                world_size - 1,
                coord.local_addr()?
            );
            Links::Root(coord.form_group().await?)
        } else {
            Links::Member(join_group(host, port, rank, world_size, config).await?)
        };

        tracing::info!(rank, world_size, "process group formed");
        Ok(Self {
            rank,
            world_size,
            links,
            epoch: Mutex::new(0),
            config: config.clone(),
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub(crate) fn links(&self) -> &Links {
        &self.links
    }

    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Claim the next epoch. The guard must be held until the collective ends.
    pub(crate) async fn next_epoch(&self) -> (MutexGuard<'_, u64>, u64) {
        let mut guard = self.epoch.lock().await;
        *guard += 1;
        let epoch = *guard;
        (guard, epoch)
    }
}

impl ProcessGroup for TcpProcessGroup {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn barrier(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(barrier::barrier(self))
    }

    fn all_reduce_sum<'a>(&'a self, tensor: TensorMut<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(allreduce::all_reduce_sum(self, tensor))
    }

    fn broadcast_from_root(&self, payload: Vec<u8>) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(broadcast::broadcast_from_root(self, payload))
    }
}

/// Error for a message that does not belong to the running collective.
pub(crate) fn unexpected(
    operation: &'static str,
    peer: Rank,
    epoch: u64,
    got: &GroupMessage,
) -> DistError {
    DistError::CollectiveFailed {
        operation,
        rank: peer,
        reason: format!("expected epoch {epoch}, got {} message", got.kind()),
    }
}

/// Debugging-oriented runtime: the `gloo` backend over [`TcpProcessGroup`].
#[derive(Debug, Clone)]
pub struct TcpRuntime {
    /// Unset until first use for a runtime built by [`TcpRuntime::from_env`].
    config: OnceLock<RuntimeConfig>,
}

impl Default for TcpRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl TcpRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config: OnceLock::from(config),
        }
    }

    /// Runtime tuned from `PROCGROUP_*` environment variables, read when a
    /// group is first formed.
    pub fn from_env() -> Self {
        Self {
            config: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.config.get_or_init(RuntimeConfig::from_env)
    }
}

impl CollectiveRuntime for TcpRuntime {
    fn backend(&self) -> Backend {
        Backend::Gloo
    }

    fn init_process_group<'a>(
        &'a self,
        req: &'a GroupRequest,
    ) -> BoxFuture<'a, Result<Arc<dyn ProcessGroup>>> {
        Box::pin(async move {
            if req.backend != Backend::Gloo {
                return Err(DistError::UnsupportedBackend {
                    backend: req.backend,
                });
            }
            let group =
                TcpProcessGroup::connect(&req.init_method, req.world_size, req.rank, self.config())
                    .await?;
            Ok(Arc::new(group) as Arc<dyn ProcessGroup>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_solo_group() {
        let init = InitMethod::parse_url("tcp://127.0.0.1:1").unwrap();
        let group = TcpProcessGroup::connect(&init, 1, 0, &RuntimeConfig::default())
            .await
            .unwrap();
        assert!(matches!(group.links(), Links::Solo));
        ProcessGroup::barrier(&group).await.unwrap();

        let mut data = [1.5f32, 2.5];
        group
            .all_reduce_sum(TensorMut::F32(&mut data))
            .await
            .unwrap();
        assert_eq!(data, [1.5, 2.5]);
    }

    #[tokio::test]
    async fn test_rank_out_of_range() {
        let init = InitMethod::parse_url("tcp://127.0.0.1:1").unwrap();
        assert!(
            TcpProcessGroup::connect(&init, 2, 2, &RuntimeConfig::default())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_runtime_rejects_nccl() {
        let rt = TcpRuntime::default();
        let req = GroupRequest {
            backend: Backend::Nccl,
            init_method: InitMethod::parse_url("tcp://127.0.0.1:1").unwrap(),
            world_size: 2,
            rank: 0,
        };
        assert!(matches!(
            rt.init_process_group(&req).await,
            Err(DistError::UnsupportedBackend {
                backend: Backend::Nccl
            })
        ));
    }

    #[tokio::test]
    async fn test_epochs_increase() {
        let init = InitMethod::parse_url("tcp://127.0.0.1:1").unwrap();
        let group = TcpProcessGroup::connect(&init, 1, 0, &RuntimeConfig::default())
            .await
            .unwrap();
        let (g, e1) = group.next_epoch().await;
        drop(g);
        let (_g, e2) = group.next_epoch().await;
        assert_eq!((e1, e2), (1, 2));
    }
}
