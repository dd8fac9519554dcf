use super::{Links, TcpProcessGroup, unexpected};
use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use futures::future::try_join_all;

/// Deliver rank 0's `payload` to every rank.
pub(crate) async fn broadcast_from_root(
    group: &TcpProcessGroup,
    payload: Vec<u8>,
) -> Result<Vec<u8>> {
    let (_guard, epoch) = group.next_epoch().await;
    let timeout = group.config().collective_timeout;

    match group.links() {
        Links::Solo => Ok(payload),
        Links::Root(peers) => {
            let msg = GroupMessage::Broadcast {
                epoch,
                payload: payload.clone(),
            };
            try_join_all(peers.iter().map(|peer| peer.send(&msg))).await?;
            Ok(payload)
        }
        Links::Member(root) => {
            let reply = tokio::time::timeout(timeout, root.recv())
                .await
                .map_err(|_| DistError::CollectiveFailed {
                    operation: "broadcast",
                    rank: group.rank(),
                    reason: format!("timed out after {}ms (epoch {epoch})", timeout.as_millis()),
                })??;
            match reply {
                GroupMessage::Broadcast { epoch: e, payload } if e == epoch => Ok(payload),
                other => Err(unexpected("broadcast", 0, epoch, &other)),
            }
        }
    }
}
