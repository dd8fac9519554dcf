use super::helpers::{helper, rank_env, run_ranks, test_config};
use procgroup::Backend;

#[tokio::test]
async fn test_scalar_mean() {
    let n = 4u32;
    let results = run_ranks(n, |rank, port| async move {
        let dist = helper(test_config());
        dist.init_with_env(&rank_env(port, rank, n, rank), Backend::Gloo)
            .await
            .unwrap();
        let mut v = [(rank + 1) as f32 * 1.5];
        dist.mean_reduce(&mut v).await.unwrap();
        v[0]
    })
    .await;

    // (1.5 + 3.0 + 4.5 + 6.0) / 4
    for v in &results {
        assert!((v - 3.75).abs() < 1e-6, "got {v}");
    }
    // Every rank holds the identical bits.
    assert!(results.iter().all(|v| v.to_bits() == results[0].to_bits()));
}

#[tokio::test]
async fn test_vector_mean_f64() {
    let results = run_ranks(3, |rank, port| async move {
        let dist = helper(test_config());
        dist.init_with_env(&rank_env(port, rank, 3, rank), Backend::Gloo)
            .await
            .unwrap();
        let r = f64::from(rank);
        let mut v = vec![r, -r, 10.0 * r, 0.5];
        dist.mean_reduce(&mut v).await.unwrap();
        v
    })
    .await;

    for v in &results {
        assert_eq!(v, &vec![1.0, -1.0, 10.0, 0.5]);
    }
}

#[tokio::test]
async fn test_length_mismatch_fails() {
    let results = run_ranks(2, |rank, port| async move {
        let mut config = test_config();
        config.collective_timeout = std::time::Duration::from_millis(500);
        let dist = helper(config);
        dist.init_with_env(&rank_env(port, rank, 2, rank), Backend::Gloo)
            .await
            .unwrap();
        let mut v = vec![1.0f32; 2 + rank as usize];
        dist.mean_reduce(&mut v).await
    })
    .await;

    assert!(matches!(
        results[0],
        Err(procgroup::DistError::BufferSizeMismatch {
            expected: 2,
            actual: 3
        })
    ));
    assert!(results[1].is_err());
}
