use crate::error::{DistError, Result};
use crate::protocol::message::GroupMessage;

/// Frame header: `[payload_len: u32 LE]`.
pub const HEADER_SIZE: usize = 4;

/// Largest accepted payload (1 GiB).
pub const MAX_FRAME_SIZE: usize = 1 << 30;

/// Encode a `GroupMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &GroupMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| DistError::EncodeFailed(e.to_string()))?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(DistError::EncodeFailed(format!(
            "{} payload of {} bytes exceeds frame limit of {MAX_FRAME_SIZE}",
            msg.kind(),
            payload.len()
        )));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Payload length from a frame header, checked against [`MAX_FRAME_SIZE`].
pub fn decode_header(header: [u8; HEADER_SIZE]) -> Result<usize> {
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(DistError::DecodeFailed(format!(
            "frame of {len} bytes exceeds limit of {MAX_FRAME_SIZE}"
        )));
    }
    Ok(len)
}

/// Decode an rkyv payload (the bytes after the header).
pub fn decode_payload(payload: &[u8]) -> Result<GroupMessage> {
    // rkyv validation needs an aligned buffer.
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);
    rkyv::from_bytes::<GroupMessage, rkyv::rancor::Error>(&aligned)
        .map_err(|e| DistError::DecodeFailed(e.to_string()))
}

/// Decode a complete frame.
pub fn decode_message(buf: &[u8]) -> Result<GroupMessage> {
    if buf.len() < HEADER_SIZE {
        return Err(DistError::DecodeFailed(format!(
            "buffer too short: {} < {HEADER_SIZE}",
            buf.len()
        )));
    }
    let len = decode_header([buf[0], buf[1], buf[2], buf[3]])?;
    let end = HEADER_SIZE + len;
    if buf.len() < end {
        return Err(DistError::DecodeFailed(format!(
            "buffer too short for payload: {} < {end}",
            buf.len()
        )));
    }
    decode_payload(&buf[HEADER_SIZE..end])
}
