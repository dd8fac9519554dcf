use crate::types::Rank;

/// Messages exchanged between rank 0 and the other ranks of the TCP group.
///
/// Epochs number the collectives issued on a group; both ends must agree
/// on the epoch of every exchange.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum GroupMessage {
    /// Initial handshake from a member to rank 0.
    Hello {
        protocol_version: u16,
        rank: Rank,
        world_size: u32,
    },

    /// Rank 0's reply once every rank has joined.
    Welcome { world_size: u32 },

    /// Rank 0 refused the handshake.
    Reject { reason: String },

    /// A member has entered barrier `epoch`.
    Barrier { epoch: u64 },

    /// Every rank has entered barrier `epoch`.
    BarrierRelease { epoch: u64 },

    /// A member's contribution to a sum all-reduce.
    Reduce {
        epoch: u64,
        dtype: u8,
        count: u64,
        payload: Vec<u8>,
    },

    /// The reduced buffer, identical for every member.
    ReduceResult { epoch: u64, payload: Vec<u8> },

    /// Rank 0's payload for a broadcast.
    Broadcast { epoch: u64, payload: Vec<u8> },
}

impl GroupMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            GroupMessage::Hello { .. } => "Hello",
            GroupMessage::Welcome { .. } => "Welcome",
            GroupMessage::Reject { .. } => "Reject",
            GroupMessage::Barrier { .. } => "Barrier",
            GroupMessage::BarrierRelease { .. } => "BarrierRelease",
            GroupMessage::Reduce { .. } => "Reduce",
            GroupMessage::ReduceResult { .. } => "ReduceResult",
            GroupMessage::Broadcast { .. } => "Broadcast",
        }
    }
}
