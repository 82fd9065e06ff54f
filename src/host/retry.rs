//! Reconnect policy: a fixed number of attempts with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds or the attempts are used up. The last error wins.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => {
                    tracing::warn!("{} failed after {} attempt(s): {}", label, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label,
                        attempt,
                        self.attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(1500));
        assert_eq!(p.backoff(10), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run("connect", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Error::Connection("refused".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy(2)
            .run("connect", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Connection("refused".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(Error::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
