//! Process-group bootstrap for distributed training.
//!
//! Resolves address, port, world size, rank and local rank from the
//! environment (including SLURM) or from an explicit machine layout, forms
//! the group through a pluggable [`CollectiveRuntime`], and exposes rank
//! queries, a barrier and mean-reduce.
//!
//! ```no_run
//! # async fn run() -> procgroup::Result<()> {
//! use procgroup::Backend;
//!
//! let local_rank = procgroup::init_from_env(Backend::Gloo).await?;
//! let mut loss = [0.25f32];
//! procgroup::mean_reduce(&mut loss).await?;
//! if procgroup::is_master_process() {
//!     println!("local rank {local_rank}, mean loss {}", loss[0]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod device;
pub mod dist;
pub mod env;
pub mod error;
pub mod global;
pub mod group;
pub mod protocol;
pub mod runtime;
pub mod transport;
pub mod types;

pub use blocking::BlockingDistributed;
pub use bootstrap::{BootstrapConfig, ExplicitParams, InitMethod};
pub use config::RuntimeConfig;
pub use device::{DeviceAdapter, HostDevice};
pub use dist::{Distributed, DistributedBuilder};
pub use env::EnvSnapshot;
pub use error::{DistError, Result};
pub use global::{
    init_from_env, init_with_params, is_master_process, mean_reduce, rank, synchronize,
    world_size,
};
pub use group::{TcpProcessGroup, TcpRuntime};
pub use runtime::{CollectiveRuntime, GroupRequest, ProcessGroup};
pub use types::{Backend, DataType, Element, Rank, TensorMut};
