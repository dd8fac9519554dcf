use std::sync::Arc;

use cudarc::nccl::safe::Id;
use futures::future::BoxFuture;
use procgroup::{
    Backend, CollectiveRuntime, DistError, GroupRequest, ProcessGroup, Rank, RuntimeConfig,
    TcpProcessGroup, TensorMut,
};
use tokio::sync::OnceCell;

use crate::comm::{NcclComm, id_from_bytes, id_to_bytes};
use crate::device::CudaDevices;
use crate::error::NcclBackendError;

/// Runtime for the `nccl` backend.
///
/// Rendezvous and barriers run over a TCP control group. Rank 0 generates
/// the NCCL unique id and broadcasts it over that group.
pub struct NcclRuntime {
    devices: Arc<CudaDevices>,
    config: RuntimeConfig,
}

impl NcclRuntime {
    pub fn new(devices: Arc<CudaDevices>, config: RuntimeConfig) -> Self {
        Self { devices, config }
    }
}

impl CollectiveRuntime for NcclRuntime {
    fn backend(&self) -> Backend {
        Backend::Nccl
    }

    fn init_process_group<'a>(
        &'a self,
        req: &'a GroupRequest,
    ) -> BoxFuture<'a, procgroup::Result<Arc<dyn ProcessGroup>>> {
        Box::pin(async move {
            if req.backend != Backend::Nccl {
                return Err(DistError::UnsupportedBackend {
                    backend: req.backend,
                });
            }
            let control =
                TcpProcessGroup::connect(&req.init_method, req.world_size, req.rank, &self.config)
                    .await?;

            let local_id = if req.rank == 0 {
                id_to_bytes(&Id::new().map_err(NcclBackendError::from)?)
            } else {
                Vec::new()
            };
            let id_bytes = control.broadcast_from_root(local_id).await?;
            let id = id_from_bytes(&id_bytes)?;
            tracing::debug!(rank = req.rank, "received NCCL unique id");

            Ok(Arc::new(NcclProcessGroup {
                control,
                id,
                devices: Arc::clone(&self.devices),
                comm: OnceCell::new(),
            }) as Arc<dyn ProcessGroup>)
        })
    }
}

/// Process group whose all-reduce runs through NCCL.
///
/// The communicator is created on the first all-reduce, once the process
/// has been bound to its GPU.
pub struct NcclProcessGroup {
    control: TcpProcessGroup,
    id: Id,
    devices: Arc<CudaDevices>,
    comm: OnceCell<NcclComm>,
}

impl NcclProcessGroup {
    fn init_comm(&self) -> Result<NcclComm, NcclBackendError> {
        let ctx = self.devices.context().ok_or(NcclBackendError::NotBound)?;
        NcclComm::init(
            Arc::clone(ctx),
            self.control.rank(),
            self.control.world_size(),
            &self.id,
        )
    }
}

impl ProcessGroup for NcclProcessGroup {
    fn rank(&self) -> Rank {
        self.control.rank()
    }

    fn world_size(&self) -> u32 {
        self.control.world_size()
    }

    fn barrier(&self) -> BoxFuture<'_, procgroup::Result<()>> {
        self.control.barrier()
    }

    fn all_reduce_sum<'a>(
        &'a self,
        mut tensor: TensorMut<'a>,
    ) -> BoxFuture<'a, procgroup::Result<()>> {
        Box::pin(async move {
            let comm = self
                .comm
                .get_or_try_init(|| async { self.init_comm() })
                .await?;
            comm.all_reduce_sum_host(&mut tensor)?;
            Ok(())
        })
    }

    fn broadcast_from_root(&self, payload: Vec<u8>) -> BoxFuture<'_, procgroup::Result<Vec<u8>>> {
        self.control.broadcast_from_root(payload)
    }
}
