//! Tests for the NCCL backend.
//!
//! The multi-rank test needs two CUDA GPUs and NCCL. Gate it with:
//! `PROCGROUP_NCCL_TEST=1 cargo test -p procgroup-nccl`

use procgroup::DataType;
use procgroup_nccl::comm::{NCCL_ID_SIZE, id_from_bytes, id_to_bytes};
use procgroup_nccl::{NcclBackendError, to_nccl_dtype};

#[test]
fn test_type_mappings() {
    use cudarc::nccl::sys;

    assert_eq!(
        to_nccl_dtype(DataType::F32),
        sys::ncclDataType_t::ncclFloat32
    );
    assert_eq!(
        to_nccl_dtype(DataType::F64),
        sys::ncclDataType_t::ncclFloat64
    );
}

#[test]
fn test_nccl_id_serialization() {
    let bytes: Vec<u8> = (0..NCCL_ID_SIZE).map(|i| (i % 127) as u8).collect();
    let id = id_from_bytes(&bytes).unwrap();
    assert_eq!(id_to_bytes(&id), bytes);
}

#[test]
fn test_nccl_id_wrong_length() {
    assert!(matches!(
        id_from_bytes(&[0u8; 16]),
        Err(NcclBackendError::BadUniqueId(16))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_gpu_mean_reduce() {
    use procgroup::{Backend, DeviceAdapter, Distributed, ExplicitParams, RuntimeConfig};
    use procgroup_nccl::{CudaDevices, NcclRuntime};
    use std::sync::Arc;

    if std::env::var("PROCGROUP_NCCL_TEST").is_err() {
        return;
    }
    if CudaDevices::detect().device_count() < 2 {
        return;
    }

    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let url = format!("tcp://127.0.0.1:{port}");

    let mut handles = Vec::new();
    for local_rank in 0..2u32 {
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let devices = Arc::new(CudaDevices::detect());
            let dist = Distributed::builder()
                .device(devices.clone())
                .runtime(Arc::new(NcclRuntime::new(devices, RuntimeConfig::default())))
                .build();
            let params = ExplicitParams::new(local_rank, 0, 2, 1).with_rendezvous_url(url);
            dist.init_with_params(&params, Backend::Nccl).await.unwrap();

            let mut data = [local_rank as f32 + 1.0, 10.0];
            dist.mean_reduce(&mut data).await.unwrap();
            data
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), [1.5, 10.0]);
    }
}
