//! NCCL backend and CUDA device binding for `procgroup`.
//!
//! Register [`NcclRuntime`] for `Backend::Nccl` and use [`CudaDevices`] as
//! the device adapter, so that init binds each process to the GPU at its
//! local rank:
//!
//! ```no_run
//! # async fn run() -> procgroup::Result<()> {
//! use procgroup::{Backend, Distributed, RuntimeConfig};
//! use procgroup_nccl::{CudaDevices, NcclRuntime};
//! use std::sync::Arc;
//!
//! let devices = Arc::new(CudaDevices::detect());
//! let dist = Distributed::builder()
//!     .device(devices.clone())
//!     .runtime(Arc::new(NcclRuntime::new(devices, RuntimeConfig::from_env())))
//!     .build();
//! let local_rank = dist.init_from_env(Backend::Nccl).await?;
//! # let _ = local_rank;
//! # Ok(())
//! # }
//! ```

pub mod comm;
pub mod device;
pub mod error;
pub mod runtime;
pub mod types;

pub use comm::NcclComm;
pub use device::CudaDevices;
pub use error::{NcclBackendError, Result};
pub use runtime::{NcclProcessGroup, NcclRuntime};
pub use types::to_nccl_dtype;
