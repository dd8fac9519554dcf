use super::helpers::{helper, rank_env, run_ranks, test_config};
use procgroup::Backend;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::test]
async fn test_nobody_leaves_early() {
    let arrived = Arc::new(AtomicU32::new(0));
    let seen = run_ranks(4, |rank, port| {
        let arrived = Arc::clone(&arrived);
        async move {
            let dist = helper(test_config());
            dist.init_with_env(&rank_env(port, rank, 4, rank), Backend::Gloo)
                .await
                .unwrap();

            // Stagger arrival.
            tokio::time::sleep(Duration::from_millis(u64::from(rank) * 30)).await;
            arrived.fetch_add(1, Ordering::SeqCst);
            dist.synchronize().await.unwrap();
            arrived.load(Ordering::SeqCst)
        }
    })
    .await;

    assert_eq!(seen, vec![4, 4, 4, 4]);
}

#[tokio::test]
async fn test_repeated_barriers() {
    let results = run_ranks(3, |rank, port| async move {
        let dist = helper(test_config());
        dist.init_with_env(&rank_env(port, rank, 3, rank), Backend::Gloo)
            .await
            .unwrap();
        for _ in 0..5 {
            dist.synchronize().await.unwrap();
        }
        let mut v = [rank as f32];
        dist.mean_reduce(&mut v).await.unwrap();
        dist.synchronize().await.unwrap();
        v[0]
    })
    .await;
    assert_eq!(results, vec![1.0, 1.0, 1.0]);
}
