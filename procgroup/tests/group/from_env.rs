use super::helpers::{helper, rank_env, run_ranks, test_config};
use procgroup::env::{MASTER_PORT, SLURM_LOCALID, SLURM_NODELIST, SLURM_NTASKS, SLURM_PROCID};
use procgroup::{Backend, EnvSnapshot};

#[tokio::test]
async fn test_four_ranks_from_env() {
    let results = run_ranks(4, |rank, port| async move {
        let dist = helper(test_config());
        let local = dist
            .init_with_env(&rank_env(port, rank, 4, rank % 2), Backend::Gloo)
            .await
            .unwrap();
        (local, dist.rank(), dist.world_size(), dist.is_master())
    })
    .await;

    assert_eq!(
        results,
        vec![
            (0, 0, 4, true),
            (1, 1, 4, false),
            (0, 2, 4, false),
            (1, 3, 4, false),
        ]
    );
}

#[tokio::test]
async fn test_slurm_only_environment() {
    let results = run_ranks(2, |rank, port| async move {
        let env = EnvSnapshot::from_pairs([
            (SLURM_NODELIST, "127.0.0.1".to_string()),
            (SLURM_PROCID, rank.to_string()),
            (SLURM_NTASKS, "2".to_string()),
            (SLURM_LOCALID, rank.to_string()),
            (MASTER_PORT, port.to_string()),
        ]);
        let dist = helper(test_config());
        dist.init_with_env(&env, Backend::Gloo).await.unwrap();
        let cfg = dist.config().unwrap().clone();
        (cfg.address, dist.rank(), dist.world_size(), dist.local_rank())
    })
    .await;

    assert_eq!(results[0], ("127.0.0.1".to_string(), 0, 2, 0));
    assert_eq!(results[1], ("127.0.0.1".to_string(), 1, 2, 1));
}

#[tokio::test]
async fn test_device_bound_to_local_rank() {
    let bound = run_ranks(2, |rank, port| async move {
        let dist = helper(test_config());
        dist.init_with_env(&rank_env(port, rank, 2, rank), Backend::Gloo)
            .await
            .unwrap();
        dist.device().bound()
    })
    .await;
    assert_eq!(bound, vec![Some(0), Some(1)]);
}
