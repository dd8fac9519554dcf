use super::{Links, TcpProcessGroup, unexpected};
use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use futures::future::try_join_all;
use std::time::Duration;

/// Members report arrival to rank 0; rank 0 releases everyone once all
/// have arrived.
pub(crate) async fn barrier(group: &TcpProcessGroup) -> Result<()> {
    let (_guard, epoch) = group.next_epoch().await;
    let timeout = group.config().barrier_timeout;
    let timed_out = || timeout_error(epoch, timeout);

    match group.links() {
        Links::Solo => Ok(()),
        Links::Root(peers) => {
            let arrivals = try_join_all(peers.iter().map(|peer| async move {
                match peer.recv().await? {
                    GroupMessage::Barrier { epoch: e } if e == epoch => Ok(()),
                    other => Err(unexpected("barrier", peer.rank(), epoch, &other)),
                }
            }));
            tokio::time::timeout(timeout, arrivals)
                .await
                .map_err(|_| timed_out())??;

            let release = GroupMessage::BarrierRelease { epoch };
            try_join_all(peers.iter().map(|peer| peer.send(&release))).await?;
            tracing::debug!(epoch, "barrier released");
            Ok(())
        }
        Links::Member(root) => {
            root.send(&GroupMessage::Barrier { epoch }).await?;
            match tokio::time::timeout(timeout, root.recv())
                .await
                .map_err(|_| timed_out())??
            {
                GroupMessage::BarrierRelease { epoch: e } if e == epoch => Ok(()),
                other => Err(unexpected("barrier", 0, epoch, &other)),
            }
        }
    }
}

fn timeout_error(epoch: u64, timeout: Duration) -> DistError {
    DistError::BarrierTimeout {
        epoch,
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
