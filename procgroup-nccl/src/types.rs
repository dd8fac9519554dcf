use cudarc::nccl::sys;
use procgroup::DataType;

/// Convert a procgroup `DataType` to the NCCL data type.
pub fn to_nccl_dtype(dt: DataType) -> sys::ncclDataType_t {
    match dt {
        DataType::F32 => sys::ncclDataType_t::ncclFloat32,
        DataType::F64 => sys::ncclDataType_t::ncclFloat64,
    }
}
