//! Cooperative cancellation shared between a controller and its worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity at which [`CancelToken::sleep`] re-checks the flag.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Cancel token for a unit of work.
///
/// Cloning shares the flag. Once cancelled a token stays cancelled; a new run
/// gets a new token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Safe to call any number of times.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep for `duration`, waking early if the token is cancelled.
    ///
    /// Returns `false` if the sleep was cut short by cancellation (or the
    /// token was already cancelled), `true` if the full duration elapsed.
    ///
    /// A duration too large to represent as a deadline sleeps until cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(CANCEL_CHECK_INTERVAL)
                }
                None => CANCEL_CHECK_INTERVAL,
            };
            std::thread::sleep(slice);
        }
    }
}
