use super::{Links, TcpProcessGroup, unexpected};
use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use crate::types::TensorMut;
use futures::future::try_join_all;

/// Sum all-reduce through rank 0.
///
/// Rank 0 adds the members' buffers into its own in rank order and sends
/// the result back, so every rank ends with bit-identical values.
pub(crate) async fn all_reduce_sum(group: &TcpProcessGroup, mut tensor: TensorMut<'_>) -> Result<()> {
    let (_guard, epoch) = group.next_epoch().await;
    let timeout = group.config().collective_timeout;
    let dtype = tensor.dtype();
    let count = tensor.len();
    let timed_out = || DistError::CollectiveFailed {
        operation: "all_reduce",
        rank: group.rank(),
        reason: format!("timed out after {}ms (epoch {epoch})", timeout.as_millis()),
    };

    match group.links() {
        Links::Solo => Ok(()),
        Links::Root(peers) => {
            let contributions = try_join_all(peers.iter().map(|peer| async move {
                match peer.recv().await? {
                    GroupMessage::Reduce {
                        epoch: e,
                        dtype: d,
                        count: c,
                        payload,
                    } if e == epoch => {
                        if d != dtype as u8 {
                            return Err(DistError::CollectiveFailed {
                                operation: "all_reduce",
                                rank: peer.rank(),
                                reason: format!("dtype tag {d} does not match {dtype}"),
                            });
                        }
                        if c as usize != count {
                            return Err(DistError::BufferSizeMismatch {
                                expected: count,
                                actual: c as usize,
                            });
                        }
                        Ok(payload)
                    }
                    other => Err(unexpected("all_reduce", peer.rank(), epoch, &other)),
                }
            }));
            let contributions = tokio::time::timeout(timeout, contributions)
                .await
                .map_err(|_| timed_out())??;

            for payload in &contributions {
                tensor.add_le_bytes(payload)?;
            }

            let result = GroupMessage::ReduceResult {
                epoch,
                payload: tensor.to_le_bytes(),
            };
            try_join_all(peers.iter().map(|peer| peer.send(&result))).await?;
            tracing::debug!(epoch, count, %dtype, "all_reduce complete");
            Ok(())
        }
        Links::Member(root) => {
            root.send(&GroupMessage::Reduce {
                epoch,
                dtype: dtype as u8,
                count: count as u64,
                payload: tensor.to_le_bytes(),
            })
            .await?;
            match tokio::time::timeout(timeout, root.recv())
                .await
                .map_err(|_| timed_out())??
            {
                GroupMessage::ReduceResult { epoch: e, payload } if e == epoch => {
                    tensor.copy_from_le_bytes(&payload)
                }
                other => Err(unexpected("all_reduce", 0, epoch, &other)),
            }
        }
    }
}
