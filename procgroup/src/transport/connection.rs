use crate::error::{DistError, Result};
use crate::protocol::GroupMessage;
use crate::protocol::codec::{HEADER_SIZE, decode_header, decode_payload, encode_message};
use crate::types::Rank;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Write one framed message and flush.
pub async fn write_message<W: AsyncWrite + Unpin>(w: &mut W, msg: &GroupMessage) -> Result<()> {
    let buf = encode_message(msg)?;
    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

/// Read one framed message.
pub async fn read_message<R: AsyncRead + Unpin>(r: &mut R) -> Result<GroupMessage> {
    let mut header = [0u8; HEADER_SIZE];
    r.read_exact(&mut header).await?;
    let len = decode_header(header)?;
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    decode_payload(&payload)
}

/// Framed TCP link to one peer rank.
///
/// Each collective issues at most one send and one receive per link, so a
/// single lock over the stream is enough.
#[derive(Debug)]
pub struct PeerLink {
    rank: Rank,
    stream: Mutex<TcpStream>,
}

impl PeerLink {
    pub fn new(rank: Rank, stream: TcpStream) -> Self {
        Self {
            rank,
            stream: Mutex::new(stream),
        }
    }

    /// Rank on the other end of the link.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub async fn send(&self, msg: &GroupMessage) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_message(&mut *stream, msg)
            .await
            .map_err(|e| self.map_io(e))
    }

    pub async fn recv(&self) -> Result<GroupMessage> {
        let mut stream = self.stream.lock().await;
        read_message(&mut *stream).await.map_err(|e| self.map_io(e))
    }

    fn map_io(&self, e: DistError) -> DistError {
        match e {
            DistError::Io(io)
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::UnexpectedEof
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                DistError::PeerDisconnected { rank: self.rank }
            }
            other => other,
        }
    }
}
