//! Average a value across four ranks running on this machine.
//!
//! Each rank gets its own launcher-style environment and joins the group
//! through the TCP (`gloo`) runtime.
//!
//! ```bash
//! RUST_LOG=procgroup=info cargo run --example mean_reduce
//! ```

use procgroup::env::{LOCAL_RANK, MASTER_ADDR, MASTER_PORT, RANK, WORLD_SIZE};
use procgroup::{Backend, Distributed, EnvSnapshot, HostDevice};
use std::sync::Arc;

#[tokio::main]
async fn main() -> procgroup::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let world_size = 4u32;
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();

    let mut handles = Vec::new();
    for rank in 0..world_size {
        handles.push(tokio::spawn(async move {
            let env = EnvSnapshot::from_pairs([
                (MASTER_ADDR, "127.0.0.1".to_string()),
                (MASTER_PORT, port.to_string()),
                (RANK, rank.to_string()),
                (WORLD_SIZE, world_size.to_string()),
                (LOCAL_RANK, rank.to_string()),
            ]);
            let dist = Distributed::builder()
                .device(Arc::new(HostDevice::new(world_size)))
                .build();
            let local_rank = dist.init_with_env(&env, Backend::Gloo).await?;

            let mut value = [rank as f32 * 10.0];
            dist.mean_reduce(&mut value).await?;
            println!(
                "rank {rank} (local {local_rank}, master={}): mean = {}",
                dist.is_master(),
                value[0]
            );
            procgroup::Result::Ok(())
        }));
    }

    for h in handles {
        h.await
            .map_err(|e| procgroup::DistError::transport_with_source("rank task", e))??;
    }
    Ok(())
}
