use std::ffi::{c_char, c_void};
use std::mem::MaybeUninit;
use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaStream, result as driver};
use cudarc::nccl::{result as nccl, safe::Id, sys};
use procgroup::TensorMut;

use crate::error::{NcclBackendError, Result};
use crate::types::to_nccl_dtype;

/// Size of an NCCL unique id on the wire.
pub const NCCL_ID_SIZE: usize = 128;

/// Wrapper around a raw `ncclComm_t` spanning the whole process group.
///
/// Host tensors are staged through a device buffer on the context's default
/// stream for every all-reduce.
pub struct NcclComm {
    comm: sys::ncclComm_t,
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    rank: u32,
    world_size: u32,
}

// SAFETY: ncclComm_t is thread-safe per NCCL documentation when used with
// proper stream synchronization. Every operation here synchronizes before
// returning.
unsafe impl Send for NcclComm {}
unsafe impl Sync for NcclComm {}

impl NcclComm {
    /// Initialize the communicator. Every rank must call this with the same
    /// `id` and `world_size`, each with its own `rank`.
    pub fn init(ctx: Arc<CudaContext>, rank: u32, world_size: u32, id: &Id) -> Result<Self> {
        ctx.bind_to_thread()?;
        let stream = ctx.default_stream();
        let mut comm = MaybeUninit::uninit();
        unsafe {
            nccl::comm_init_rank(
                comm.as_mut_ptr(),
                world_size as i32,
                *id_to_sys(id),
                rank as i32,
            )?;
        }
        tracing::debug!(rank, world_size, "NCCL communicator ready");
        Ok(Self {
            comm: unsafe { comm.assume_init() },
            ctx,
            stream,
            rank,
            world_size,
        })
    }

    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// In-place sum of a host tensor across the group.
    pub fn all_reduce_sum_host(&self, tensor: &mut TensorMut<'_>) -> Result<()> {
        let bytes = tensor.size_in_bytes();
        if bytes == 0 {
            return Ok(());
        }
        self.ctx.bind_to_thread()?;
        let host = tensor.to_le_bytes();
        let count = tensor.len();
        let dtype = to_nccl_dtype(tensor.dtype());

        let reduced = unsafe {
            let dptr = driver::malloc_sync(bytes)?;
            let run = || -> Result<Vec<u8>> {
                driver::memcpy_htod_sync(dptr, &host)?;
                nccl::all_reduce(
                    dptr as *const c_void,
                    dptr as *mut c_void,
                    count,
                    dtype,
                    sys::ncclRedOp_t::ncclSum,
                    self.comm,
                    self.cu_stream(),
                )?;
                driver::stream::synchronize(self.stream.cu_stream())?;
                let mut out = vec![0u8; bytes];
                driver::memcpy_dtoh_sync(&mut out, dptr)?;
                Ok(out)
            };
            let result = run();
            let _ = driver::free_sync(dptr);
            result?
        };
        tensor.copy_from_le_bytes(&reduced)?;
        Ok(())
    }

    fn cu_stream(&self) -> sys::cudaStream_t {
        self.stream.cu_stream() as sys::cudaStream_t
    }
}

impl Drop for NcclComm {
    fn drop(&mut self) {
        unsafe {
            let _ = nccl::comm_abort(self.comm);
        }
    }
}

/// `ncclUniqueId` is `#[repr(C)]` with the single field `internal: [c_char; 128]`,
/// the same layout `Id::internal()` points at.
fn id_to_sys(id: &Id) -> &sys::ncclUniqueId {
    let internal = id.internal();
    unsafe { &*(internal as *const [c_char; NCCL_ID_SIZE] as *const sys::ncclUniqueId) }
}

/// Serialize an NCCL unique id for the control plane.
pub fn id_to_bytes(id: &Id) -> Vec<u8> {
    id.internal().iter().map(|&c| c as u8).collect()
}

/// Rebuild an NCCL unique id received over the control plane.
pub fn id_from_bytes(bytes: &[u8]) -> Result<Id> {
    if bytes.len() != NCCL_ID_SIZE {
        return Err(NcclBackendError::BadUniqueId(bytes.len()));
    }
    let mut internal = [0 as c_char; NCCL_ID_SIZE];
    for (slot, &b) in internal.iter_mut().zip(bytes) {
        *slot = b as c_char;
    }
    Ok(Id::uninit(internal))
}
