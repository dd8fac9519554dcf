use super::helpers::{helper, run_ranks, test_config};
use procgroup::{Backend, ExplicitParams};

#[tokio::test]
async fn test_two_machines_two_devices() {
    let results = run_ranks(4, |slot, port| async move {
        let (machine_rank, local_rank) = (slot / 2, slot % 2);
        let params = ExplicitParams::new(local_rank, machine_rank, 2, 2)
            .with_rendezvous_url(format!("tcp://127.0.0.1:{port}"));
        let dist = helper(test_config());
        let local = dist.init_with_params(&params, Backend::Gloo).await.unwrap();

        let mut v = [dist.rank() as f32];
        dist.mean_reduce(&mut v).await.unwrap();
        (local, dist.rank(), dist.world_size(), v[0])
    })
    .await;

    assert_eq!(
        results,
        vec![(0, 0, 4, 1.5), (1, 1, 4, 1.5), (0, 2, 4, 1.5), (1, 3, 4, 1.5)]
    );
}

#[tokio::test]
async fn test_single_machine_single_device_skips_rendezvous() {
    let params = ExplicitParams::new(0, 0, 1, 1).with_rendezvous_url("tcp://127.0.0.1:1");
    let dist = helper(test_config());
    assert_eq!(dist.init_with_params(&params, Backend::Gloo).await.unwrap(), 0);
    assert!(!dist.is_initialized());
    assert!(dist.is_master());
}
