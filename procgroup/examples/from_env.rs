//! Join a process group described by the launcher environment.
//!
//! Start one process per rank, for example:
//!
//! ```bash
//! MASTER_PORT=29500 WORLD_SIZE=2 RANK=0 LOCAL_RANK=0 cargo run --example from_env &
//! MASTER_PORT=29500 WORLD_SIZE=2 RANK=1 LOCAL_RANK=1 cargo run --example from_env
//! ```
//!
//! Under SLURM only `MASTER_PORT` is needed.

use procgroup::Backend;

#[tokio::main]
async fn main() -> procgroup::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let local_rank = procgroup::init_from_env(Backend::Gloo).await?;
    let rank = procgroup::rank();

    let mut grads = vec![rank as f64; 4];
    procgroup::mean_reduce(&mut grads).await?;
    procgroup::synchronize().await?;

    if procgroup::is_master_process() {
        println!(
            "world size {}: averaged {:?} (local rank {local_rank})",
            procgroup::world_size(),
            grads
        );
    }
    Ok(())
}
