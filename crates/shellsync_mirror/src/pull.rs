//! Snapshot pulls with retry.

use crate::config::RetryConfig;
use crate::engine::Engine;
use crate::error::{MirrorError, MirrorResult};
use shellsync_protocol::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Pulls a snapshot, retrying transient failures with backoff.
///
/// Non-retryable engine errors are returned immediately. With a bounded
/// `retry.max_attempts` the last failure becomes
/// [`MirrorError::RetriesExhausted`]. Setting `cancelled` aborts between
/// attempts and during backoff.
pub fn pull_with_retry<E>(
    engine: &E,
    retry: &RetryConfig,
    cancelled: &AtomicBool,
) -> MirrorResult<AppState>
where
    E: Engine + ?Sized,
{
    let mut attempt: u32 = 0;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(MirrorError::Cancelled);
        }
        attempt = attempt.saturating_add(1);

        match engine.pull_state() {
            Ok(state) => {
                if attempt > 1 {
                    tracing::info!(attempt, rev = %state.rev, "pull succeeded after retry");
                }
                return Ok(state);
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(attempt, error = %e, "pull failed permanently");
                return Err(e);
            }
            Err(e) => {
                if !retry.allows_attempt(attempt) {
                    tracing::warn!(attempt, error = %e, "pull retries exhausted");
                    return Err(MirrorError::RetriesExhausted { attempts: attempt });
                }
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %e, "pull failed, retrying");
                sleep_unless_cancelled(delay, cancelled)?;
            }
        }
    }
}

/// Sleeps for `delay`, waking early with `Cancelled` if the flag is set.
pub fn sleep_unless_cancelled(delay: Duration, cancelled: &AtomicBool) -> MirrorResult<()> {
    let deadline = Instant::now() + delay;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(MirrorError::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep((deadline - now).min(CANCEL_POLL));
    }
}
