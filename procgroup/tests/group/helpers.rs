use procgroup::env::{LOCAL_RANK, MASTER_ADDR, MASTER_PORT, RANK, WORLD_SIZE};
use procgroup::{Distributed, EnvSnapshot, HostDevice, RuntimeConfig, TcpRuntime};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

/// A localhost port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_listen_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_formation_timeout(Duration::from_secs(10))
        .with_barrier_timeout(Duration::from_secs(10))
        .with_collective_timeout(Duration::from_secs(10))
}

/// Helper wired to the TCP runtime and plenty of host device slots.
pub fn helper(config: RuntimeConfig) -> Distributed {
    Distributed::builder()
        .runtime(Arc::new(TcpRuntime::new(config)))
        .device(Arc::new(HostDevice::new(64)))
        .build()
}

/// Launcher-style environment for one rank on localhost.
pub fn rank_env(port: u16, rank: u32, world_size: u32, local_rank: u32) -> EnvSnapshot {
    EnvSnapshot::from_pairs([
        (MASTER_ADDR, "127.0.0.1".to_string()),
        (MASTER_PORT, port.to_string()),
        (RANK, rank.to_string()),
        (WORLD_SIZE, world_size.to_string()),
        (LOCAL_RANK, local_rank.to_string()),
    ])
}

/// Run `f(rank, port)` for every rank concurrently; results come back in
/// rank order.
pub async fn run_ranks<F, Fut, T>(world_size: u32, f: F) -> Vec<T>
where
    F: Fn(u32, u16) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let port = free_port();
    let handles: Vec<_> = (0..world_size)
        .map(|rank| tokio::spawn(f(rank, port)))
        .collect();
    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}
