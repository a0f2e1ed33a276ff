//! Supervised transport loop with tiered backoff.
//!
//! Runs one transport session at a time. When a session fails, the error is
//! classified and the loop waits before building a brand new session:
//! - Network errors (connection resets, timeouts, 5xx): short backoff
//! - Anything else: long backoff. Unknown failures are retried, never fatal.
//!
//! Nothing from the failed session is reused.

use super::traits::TransportError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Default wait after a network-class failure.
pub const DEFAULT_NETWORK_BACKOFF: Duration = Duration::from_secs(30);

/// Default wait after any other failure.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Backoff tiers for restarting the transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub network: Duration,
    pub error: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK_BACKOFF,
            error: DEFAULT_ERROR_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Wait before restarting after `err`.
    pub fn delay_for(&self, err: &TransportError) -> Duration {
        if err.is_transient() {
            self.network
        } else {
            self.error
        }
    }
}

/// Run `run_session` until it ends cleanly.
///
/// Each call to `run_session` must build its transport from scratch. An
/// `Err` restarts after the policy's backoff; `Ok(())` stops the loop. The
/// production bot never returns `Ok`, so this runs until the process exits.
///
/// Returns the number of restarts performed.
pub async fn supervise<F, Fut>(policy: BackoffPolicy, mut run_session: F) -> u64
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), TransportError>>,
{
    let mut restarts = 0u64;

    loop {
        info!("Starting transport session");
        match run_session().await {
            Ok(()) => {
                info!("Transport session ended");
                return restarts;
            }
            Err(err) => {
                let delay = policy.delay_for(&err);
                if err.is_transient() {
                    error!("Network error: {}", err);
                } else {
                    error!("Unexpected error: {}", err);
                }
                info!("Retrying in {}", humantime::format_duration(delay));

                sleep(delay).await;
                restarts += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    fn fast_policy() -> BackoffPolicy {
        BackoffPolicy {
            network: Duration::from_millis(1),
            error: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_clean_exit_stops_immediately() {
        let restarts = supervise(fast_policy(), || async { Ok(()) }).await;
        assert_eq!(restarts, 0);
    }

    #[tokio::test]
    async fn test_restarts_after_failures() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();

        let restarts = supervise(fast_policy(), move || {
            let attempt = attempt_clone.clone();
            async move {
                match attempt.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(TransportError::Network("connection reset".to_string())),
                    1 => Err(TransportError::Protocol("bad payload".to_string())),
                    _ => Ok(()),
                }
            }
        })
        .await;

        assert_eq!(restarts, 2);
        assert_eq!(attempt.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_each_attempt_builds_a_fresh_session() {
        let built = Arc::new(Mutex::new(Vec::new()));
        let built_clone = built.clone();
        let mut generation = 0u32;

        supervise(fast_policy(), move || {
            generation += 1;
            built_clone.lock().unwrap().push(generation);
            let current = generation;
            async move {
                if current < 3 {
                    Err(TransportError::Network("down".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(*built.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unclassified_errors_wait_longer() {
        let attempt = Arc::new(AtomicU32::new(0));
        let attempt_clone = attempt.clone();
        let start = Instant::now();

        supervise(fast_policy(), move || {
            let attempt = attempt_clone.clone();
            async move {
                if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::Unauthorized("token revoked".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_delay_tiers() {
        let policy = BackoffPolicy::default();

        assert_eq!(
            policy.delay_for(&TransportError::Network("timeout".to_string())),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay_for(&TransportError::Api {
                code: 409,
                description: "Conflict".to_string()
            }),
            Duration::from_secs(60)
        );
    }
}
