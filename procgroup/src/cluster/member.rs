use crate::config::RuntimeConfig;
use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use crate::transport::{PeerLink, connect_with_retry};
use crate::types::{PROTOCOL_VERSION, Rank};

/// Join the group coordinated by rank 0 at `host:port`.
///
/// Keeps retrying the connection while rank 0 is not listening yet, then
/// waits for the `Welcome` that rank 0 sends once every rank has joined.
pub async fn join_group(
    host: &str,
    port: u16,
    rank: Rank,
    world_size: u32,
    config: &RuntimeConfig,
) -> Result<PeerLink> {
    let deadline = tokio::time::Instant::now() + config.formation_timeout;
    let stream = connect_with_retry(host, port, deadline, config.connect_retry_interval).await?;
    let link = PeerLink::new(0, stream);

    link.send(&GroupMessage::Hello {
        protocol_version: PROTOCOL_VERSION,
        rank,
        world_size,
    })
    .await?;

    let reply = tokio::time::timeout_at(deadline, link.recv())
        .await
        .map_err(|_| DistError::ConnectionFailed {
            addr: format!("{host}:{port}"),
            reason: "timed out waiting for the rest of the group".into(),
        })??;

    match reply {
        GroupMessage::Welcome { world_size: ws } if ws == world_size => {
            tracing::debug!(rank, world_size, "joined process group");
            Ok(link)
        }
        GroupMessage::Welcome { world_size: ws } => Err(DistError::Rejected {
            reason: format!("rank 0 formed a group of {ws}, expected {world_size}"),
        }),
        GroupMessage::Reject { reason } => Err(DistError::Rejected { reason }),
        other => Err(DistError::DecodeFailed(format!(
            "expected Welcome, got {}",
            other.kind()
        ))),
    }
}
