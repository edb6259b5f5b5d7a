//! Deadline-bounded suspension primitives.
//!
//! Nothing in fixloop blocks without a deadline. Collaborators poll with
//! `poll_until`; the engine's own delays go through `sleep_unless_cancelled`.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

/// Call `check` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The check always runs at least once, and once more at the deadline, so a
/// signal that lands during the final interval is still seen.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep_until((now + interval).min(deadline)).await;
    }
}

/// Sleep for `duration`, returning early with `false` if `cancel` fires
pub async fn sleep_unless_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
