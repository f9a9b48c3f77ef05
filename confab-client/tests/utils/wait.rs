use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` every 10ms until it holds or `timeout_ms` passes.
pub async fn wait_for<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_millis(timeout_ms), poll)
        .await
        .is_ok()
}

/// Next broadcast event matching `pick`, skipping the rest.
pub async fn next_event<E, T, F>(
    rx: &mut broadcast::Receiver<E>,
    timeout_ms: u64,
    mut pick: F,
) -> anyhow::Result<T>
where
    E: Clone,
    F: FnMut(E) -> Option<T>,
{
    let search = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(found) = pick(event) {
                        return Ok(found);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => return Err(anyhow::anyhow!("event channel closed: {}", e)),
            }
        }
    };
    with_timeout(timeout_ms, search).await?
}

pub async fn with_timeout<T>(timeout_ms: u64, fut: impl Future<Output = T>) -> anyhow::Result<T> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), fut)
        .await
        .map_err(|_| anyhow::anyhow!("timed out after {}ms", timeout_ms))
}
