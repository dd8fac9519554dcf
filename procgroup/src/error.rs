use crate::types::{Backend, Rank};

pub type Result<T> = std::result::Result<T, DistError>;

#[derive(Debug, thiserror::Error)]
pub enum DistError {
    #[error("no compatible accelerator available (device: {device})")]
    DeviceUnavailable { device: String },

    #[error("cannot bind device {index}: {reason}")]
    DeviceBind { index: u32, reason: String },

    #[error("required environment variable {var} is not set")]
    MissingEnv { var: &'static str },

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid process-group configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid init method {0:?}")]
    InvalidInitMethod(String),

    #[error("no runtime registered for backend {backend}")]
    UnsupportedBackend { backend: Backend },

    #[error("process group already initialized")]
    AlreadyInitialized,

    #[error("connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("process group formation timed out: {joined}/{expected} ranks joined")]
    GroupFormationTimeout { joined: u32, expected: u32 },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("rendezvous rejected: {reason}")]
    Rejected { reason: String },

    #[error("barrier timed out after {timeout_ms}ms (epoch {epoch})")]
    BarrierTimeout { epoch: u64, timeout_ms: u64 },

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("device error: {message}")]
    Device {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DistError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Device` error with just a message.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Device` error with a message and a source error.
    pub fn device_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Device {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error came out of rendezvous / group formation.
    pub fn is_group_init_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::GroupFormationTimeout { .. }
                | Self::ProtocolMismatch { .. }
                | Self::Rejected { .. }
                | Self::Transport { .. }
                | Self::Io(_)
        )
    }
}
