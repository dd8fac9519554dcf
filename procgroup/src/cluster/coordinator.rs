use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use crate::transport::{PeerLink, bind_listener, read_message, write_message};
use crate::types::{PROTOCOL_VERSION, Rank};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Rank 0's side of the rendezvous.
///
/// Listens on the rendezvous port, waits for every other rank to say Hello,
/// and answers each of them with `Welcome` once the group is complete.
pub struct Coordinator {
    listener: TcpListener,
    world_size: u32,
    formation_timeout: Duration,
}

impl Coordinator {
    /// Bind the rendezvous listener.
    pub async fn bind(ip: IpAddr, port: u16, world_size: u32) -> Result<Self> {
        let listener = bind_listener(ip, port).await?;
        Ok(Self {
            listener,
            world_size,
            formation_timeout: Duration::from_secs(60),
        })
    }

    /// Set the group formation timeout.
    pub fn with_formation_timeout(mut self, timeout: Duration) -> Self {
        self.formation_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for ranks `1..world_size` and return their links in rank order.
    ///
    /// Hellos are read concurrently with accepting, so a connection that
    /// never speaks cannot hold up the ranks behind it.
    pub async fn form_group(self) -> Result<Vec<PeerLink>> {
        let expected = self.world_size.saturating_sub(1) as usize;
        let mut slots: Vec<Option<TcpStream>> = (0..expected).map(|_| None).collect();
        let mut joined = 0usize;
        let mut handshakes = FuturesUnordered::new();

        let deadline = tokio::time::sleep(self.formation_timeout);
        tokio::pin!(deadline);

        while joined < expected {
            let (mut stream, peer_addr, hello) = tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer_addr) = result?;
                    stream.set_nodelay(true)?;
                    handshakes.push(read_hello(stream, peer_addr));
                    continue;
                }
                Some(handshake) = handshakes.next(), if !handshakes.is_empty() => handshake,
                _ = &mut deadline => {
                    return Err(DistError::GroupFormationTimeout {
                        // Rank 0 counts as joined.
                        joined: joined as u32 + 1,
                        expected: self.world_size,
                    });
                }
            };

            let hello = match hello {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(%peer_addr, "dropping rendezvous connection without Hello: {e}");
                    continue;
                }
            };

            let rank = match self.check_hello(&hello, &slots) {
                Ok(rank) => rank,
                Err(e) => {
                    tracing::warn!(%peer_addr, "rejecting rendezvous peer: {e}");
                    let reject = GroupMessage::Reject {
                        reason: e.to_string(),
                    };
                    let _ = write_message(&mut stream, &reject).await;
                    return Err(e);
                }
            };

            slots[rank as usize - 1] = Some(stream);
            joined += 1;
            tracing::info!(
                "rank joined: rank={rank}, total={}/{}",
                joined + 1,
                self.world_size
            );
        }
        // Connections still silent at this point are dropped.
        drop(handshakes);

        let welcome = GroupMessage::Welcome {
            world_size: self.world_size,
        };
        let mut links = Vec::with_capacity(expected);
        for (i, slot) in slots.into_iter().enumerate() {
            let rank = i as Rank + 1;
            let stream = slot.ok_or_else(|| {
                DistError::transport(format!("rank {rank} missing after formation"))
            })?;
            let link = PeerLink::new(rank, stream);
            link.send(&welcome).await?;
            links.push(link);
        }
        Ok(links)
    }

    fn check_hello(&self, msg: &GroupMessage, slots: &[Option<TcpStream>]) -> Result<Rank> {
        match *msg {
            GroupMessage::Hello {
                protocol_version,
                rank,
                world_size,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(DistError::ProtocolMismatch {
                        local: PROTOCOL_VERSION,
                        remote: protocol_version,
                    });
                }
                if world_size != self.world_size {
                    return Err(DistError::Rejected {
                        reason: format!(
                            "rank {rank} reports world size {world_size}, expected {}",
                            self.world_size
                        ),
                    });
                }
                if rank == 0 || rank >= self.world_size {
                    return Err(DistError::Rejected {
                        reason: format!(
                            "rank {rank} is not a member rank of a group of {}",
                            self.world_size
                        ),
                    });
                }
                if slots[rank as usize - 1].is_some() {
                    return Err(DistError::Rejected {
                        reason: format!("rank {rank} joined twice"),
                    });
                }
                Ok(rank)
            }
            ref other => Err(DistError::DecodeFailed(format!(
                "expected Hello, got {}",
                other.kind()
            ))),
        }
    }
}

async fn read_hello(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
) -> (TcpStream, SocketAddr, Result<GroupMessage>) {
    let hello = read_message(&mut stream).await;
    (stream, peer_addr, hello)
}
