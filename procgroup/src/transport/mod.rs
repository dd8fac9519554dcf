pub mod connection;

pub use connection::{PeerLink, read_message, write_message};

use crate::error::{DistError, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

/// Bind the rendezvous listener on rank 0.
pub async fn bind_listener(ip: IpAddr, port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::new(ip, port);
    TcpListener::bind(addr)
        .await
        .map_err(|e| DistError::transport_with_source(format!("bind rendezvous {addr}"), e))
}

/// Connect to rank 0, retrying until `deadline` while it is not listening yet.
pub async fn connect_with_retry(
    host: &str,
    port: u16,
    deadline: Instant,
    retry_interval: Duration,
) -> Result<TcpStream> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let last_err = match tokio::time::timeout_at(deadline, TcpStream::connect((host, port)))
            .await
        {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).map_err(|e| {
                    DistError::transport_with_source("set_nodelay on rendezvous link", e)
                })?;
                tracing::debug!(host, port, attempts, "connected to rendezvous");
                return Ok(stream);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "deadline elapsed during connect".to_string(),
        };

        if Instant::now() + retry_interval >= deadline {
            return Err(DistError::ConnectionFailed {
                addr: format!("{host}:{port}"),
                reason: format!("{last_err} (after {attempts} attempts)"),
            });
        }
        tracing::debug!(host, port, attempts, "rendezvous not reachable yet: {last_err}");
        tokio::time::sleep(retry_interval).await;
    }
}
