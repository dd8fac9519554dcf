use cudarc::nccl::result::NcclError;
use procgroup::DistError;

pub type Result<T> = std::result::Result<T, NcclBackendError>;

#[derive(Debug, thiserror::Error)]
pub enum NcclBackendError {
    #[error("NCCL error: {0:?}")]
    Nccl(NcclError),

    #[error("procgroup error: {0}")]
    Group(#[from] DistError),

    #[error("CUDA driver error: {0}")]
    CudaDriver(#[from] cudarc::driver::result::DriverError),

    #[error("no CUDA device bound to this process")]
    NotBound,

    #[error("NCCL unique id has {0} bytes, expected 128")]
    BadUniqueId(usize),
}

impl From<NcclError> for NcclBackendError {
    fn from(e: NcclError) -> Self {
        NcclBackendError::Nccl(e)
    }
}

impl From<NcclBackendError> for DistError {
    fn from(e: NcclBackendError) -> Self {
        match e {
            NcclBackendError::Group(inner) => inner,
            other => DistError::device_with_source("nccl backend", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_error_unwraps() {
        let e: DistError = NcclBackendError::Group(DistError::AlreadyInitialized).into();
        assert!(matches!(e, DistError::AlreadyInitialized));
    }

    #[test]
    fn test_backend_error_becomes_device_error() {
        let e: DistError = NcclBackendError::BadUniqueId(3).into();
        assert!(matches!(e, DistError::Device { .. }));
        assert_eq!(e.to_string(), "device error: nccl backend");
    }
}
