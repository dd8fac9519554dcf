use super::helpers::{free_port, helper, rank_env, test_config};
use procgroup::{Backend, DistError};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_failed_rendezvous_logs_address_and_propagates() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .with_writer(move || writer.clone())
        .finish();

    // Nothing listens on this port, so rank 1 cannot reach rank 0.
    let port = free_port();
    let err = tracing::subscriber::with_default(subscriber, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let config = test_config().with_formation_timeout(Duration::from_millis(300));
            helper(config)
                .init_with_env(&rank_env(port, 1, 2, 1), Backend::Gloo)
                .await
                .unwrap_err()
        })
    });

    assert!(matches!(err, DistError::ConnectionFailed { .. }), "{err:?}");
    let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(
        logs.contains(&format!("dist url: 127.0.0.1:{port}")),
        "log output: {logs}"
    );
}

#[tokio::test]
async fn test_formation_timeout_on_rank_zero() {
    let port = free_port();
    let config = test_config().with_formation_timeout(Duration::from_millis(200));
    let err = helper(config)
        .init_with_env(&rank_env(port, 0, 3, 0), Backend::Gloo)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DistError::GroupFormationTimeout {
            joined: 1,
            expected: 3
        }
    ));
    assert!(err.is_group_init_failure());
}
