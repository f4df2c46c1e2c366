use crate::error::{CheckpointError, EngineError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
    /// The token fired while waiting to retry; holds the last error seen.
    Cancelled(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) | RetryError::AttemptsExceeded(e) | RetryError::Cancelled(e) => e,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Fraction in `[0, 1]` by which a delay may be randomly shortened.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Source reads: cheap to repeat, so wait long and try often.
    pub fn for_fetch() -> Self {
        Self::new(5, Duration::from_secs(15), Duration::from_secs(120)).with_jitter(0.2)
    }

    /// Target writes.
    pub fn for_insert() -> Self {
        Self::new(5, Duration::from_secs(10), Duration::from_secs(60)).with_jitter(0.2)
    }

    /// Checkpoint file writes; contention clears quickly.
    pub fn for_checkpoint() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(2))
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Executes the operation with the configured retry policy.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        op_name: &str,
        op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        self.run_inner(op_name, None, op, classify).await
    }

    /// Like [`RetryPolicy::run`], but gives up with [`RetryError::Cancelled`]
    /// as soon as `cancel` fires during a backoff. An attempt already in
    /// flight is never interrupted.
    pub async fn run_cancellable<F, Fut, T, E, Classifier>(
        &self,
        op_name: &str,
        cancel: &CancellationToken,
        op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        self.run_inner(op_name, Some(cancel), op, classify).await
    }

    async fn run_inner<F, Fut, T, E, Classifier>(
        &self,
        op_name: &str,
        cancel: Option<&CancellationToken>,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        let delay = self.backoff_delay(attempt);
                        warn!(
                            op = op_name,
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying after failure"
                        );
                        if let Some(cancel) = cancel {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => {
                                    debug!(op = op_name, attempt = attempt + 1, "Retry abandoned, cancelled");
                                    return Err(RetryError::Cancelled(err));
                                }
                                _ = sleep(delay) => {}
                            }
                        } else {
                            sleep(delay).await;
                        }
                        attempt += 1;
                    }
                },
            }
        }
    }

    /// `min(base * 2^attempt, max)`, shortened by up to `jitter` of itself but
    /// never below `base`.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(16);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis().max(base_ms)) as u64;

        let jittered = if self.jitter > 0.0 {
            let cut = rand::rng().random_range(0.0..=self.jitter);
            (capped as f64 * (1.0 - cut)) as u64
        } else {
            capped
        };
        Duration::from_millis(jittered.max(base_ms as u64))
    }
}

pub fn classify_engine_error(err: &EngineError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

pub fn classify_checkpoint_error(err: &CheckpointError) -> RetryDisposition {
    match err {
        CheckpointError::Io(_) => RetryDisposition::Retry,
        CheckpointError::Corrupt(_) | CheckpointError::Worker(_) => RetryDisposition::Stop,
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(p.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(350));
        assert_eq!(p.backoff_delay(9), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(1000))
            .with_jitter(0.5);
        for attempt in 0..6 {
            let d = p.backoff_delay(attempt).as_millis() as u64;
            let ceiling = (100u64 << attempt).min(1000);
            assert!(d >= 100 && d <= ceiling, "attempt {attempt}: {d}");
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicUsize::new(0);
        let out = RetryPolicy::immediate(3)
            .run(
                "op",
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("flaky")
                    } else {
                        Ok(7)
                    }
                },
                |_| RetryDisposition::Retry,
            )
            .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let out: Result<(), _> = RetryPolicy::immediate(4)
            .run(
                "op",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                },
                |_| RetryDisposition::Retry,
            )
            .await;
        assert!(matches!(out, Err(RetryError::AttemptsExceeded("down"))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let out: Result<(), _> = RetryPolicy::immediate(4)
            .run(
                "op",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("bad")
                },
                |_| RetryDisposition::Stop,
            )
            .await;
        assert!(matches!(out, Err(RetryError::Fatal("bad"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_cuts_the_backoff_short() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let policy = RetryPolicy::new(5, Duration::from_secs(60), Duration::from_secs(60));
        let out: Result<(), _> = tokio::time::timeout(
            Duration::from_secs(5),
            policy.run_cancellable(
                "op",
                &cancel,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down")
                },
                |_| RetryDisposition::Retry,
            ),
        )
        .await
        .expect("backoff should stop once the token fires");

        assert!(matches!(out, Err(RetryError::Cancelled("down"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_still_allows_success_without_backoff() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out: Result<i32, RetryError<&str>> = RetryPolicy::immediate(3)
            .run_cancellable("op", &cancel, || async { Ok(1) }, |_| RetryDisposition::Retry)
            .await;
        assert_eq!(out.unwrap(), 1);
    }

    #[test]
    fn policy_reads_millisecond_fields() {
        let p: RetryPolicy = serde_json::from_str(
            r#"{"max_attempts": 2, "base_delay_ms": 50, "max_delay_ms": 400, "jitter": 0.1}"#,
        )
        .unwrap();
        assert_eq!(p.base_delay, Duration::from_millis(50));
        assert_eq!(p.max_attempts, 2);
    }
}
