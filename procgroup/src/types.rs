use crate::error::{DistError, Result};
use std::fmt;
use std::str::FromStr;

/// Rank of a process in the process group (0-indexed).
pub type Rank = u32;

/// Wire protocol version for the TCP rendezvous.
pub const PROTOCOL_VERSION: u16 = 1;

/// Collective-communication transport selected at init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// GPU-optimized transport. Use for training.
    #[default]
    Nccl,
    /// Host transport. Use for debugging.
    Gloo,
}

impl Backend {
    pub const fn name(self) -> &'static str {
        match self {
            Backend::Nccl => "nccl",
            Backend::Gloo => "gloo",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = DistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nccl" => Ok(Backend::Nccl),
            "gloo" => Ok(Backend::Gloo),
            other => Err(DistError::InvalidConfig(format!(
                "unknown backend {other:?} (expected \"nccl\" or \"gloo\")"
            ))),
        }
    }
}

/// Element types that can be mean-reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataType::F32),
            1 => Some(DataType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        })
    }
}

/// A mutable host tensor handed to a collective runtime.
#[derive(Debug)]
pub enum TensorMut<'a> {
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
}

impl TensorMut<'_> {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorMut::F32(_) => DataType::F32,
            TensorMut::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorMut::F32(s) => s.len(),
            TensorMut::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype().size_in_bytes()
    }

    /// Little-endian byte image of the elements.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TensorMut::F32(s) => s.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TensorMut::F64(s) => s.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// `self[i] += src[i]` where `src` is a little-endian byte image.
    pub fn add_le_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.check_image(src)?;
        match self {
            TensorMut::F32(s) => {
                for (dst, chunk) in s.iter_mut().zip(src.chunks_exact(4)) {
                    *dst += f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
            }
            TensorMut::F64(s) => {
                for (dst, chunk) in s.iter_mut().zip(src.chunks_exact(8)) {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    *dst += f64::from_le_bytes(b);
                }
            }
        }
        Ok(())
    }

    /// Overwrite the elements from a little-endian byte image.
    pub fn copy_from_le_bytes(&mut self, src: &[u8]) -> Result<()> {
        self.check_image(src)?;
        match self {
            TensorMut::F32(s) => {
                for (dst, chunk) in s.iter_mut().zip(src.chunks_exact(4)) {
                    *dst = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
            }
            TensorMut::F64(s) => {
                for (dst, chunk) in s.iter_mut().zip(src.chunks_exact(8)) {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    *dst = f64::from_le_bytes(b);
                }
            }
        }
        Ok(())
    }

    fn check_image(&self, src: &[u8]) -> Result<()> {
        let elem = self.dtype().size_in_bytes();
        if src.len() != self.size_in_bytes() {
            return Err(DistError::BufferSizeMismatch {
                expected: self.len(),
                actual: src.len() / elem,
            });
        }
        Ok(())
    }
}

/// Scalar types accepted by `mean_reduce`.
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DataType;

    fn tensor_mut(data: &mut [Self]) -> TensorMut<'_>;

    /// `self / n`, used for the averaging step.
    fn div_count(self, n: u32) -> Self;
}

impl Element for f32 {
    const DTYPE: DataType = DataType::F32;

    fn tensor_mut(data: &mut [Self]) -> TensorMut<'_> {
        TensorMut::F32(data)
    }

    fn div_count(self, n: u32) -> Self {
        self / n as f32
    }
}

impl Element for f64 {
    const DTYPE: DataType = DataType::F64;

    fn tensor_mut(data: &mut [Self]) -> TensorMut<'_> {
        TensorMut::F64(data)
    }

    fn div_count(self, n: u32) -> Self {
        self / f64::from(n)
    }
}
