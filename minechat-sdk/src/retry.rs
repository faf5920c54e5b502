//! Indefinite retry around a fallible async operation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::backoff::{Backoff, BackoffConfig};
use crate::error::{ChatError, ErrorKind};

/// Re-runs an operation until it succeeds or fails with a kind outside
/// `retry_on`.
///
/// A run that lasted longer than `min_time_for_reset` counts as a healthy
/// session that later died, so the backoff starts over. A run that died
/// quickly keeps climbing the backoff curve.
#[derive(Debug)]
pub struct RetrySupervisor {
    name: &'static str,
    backoff: Backoff,
    retry_on: Vec<ErrorKind>,
    min_time_for_reset: Option<Duration>,
}

impl RetrySupervisor {
    pub fn new(name: &'static str, backoff: BackoffConfig, retry_on: &[ErrorKind]) -> Self {
        Self {
            name,
            backoff: Backoff::new(backoff),
            retry_on: retry_on.to_vec(),
            min_time_for_reset: None,
        }
    }

    pub fn reset_after(mut self, min_time_for_reset: Duration) -> Self {
        self.min_time_for_reset = Some(min_time_for_reset);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    pub fn retries(&self, kind: ErrorKind) -> bool {
        self.retry_on.contains(&kind)
    }

    pub async fn run_forever<T, F, Fut>(&mut self, mut operation: F) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        loop {
            let started = Instant::now();
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if self.retries(e.kind()) => e,
                Err(e) => {
                    tracing::debug!(supervisor = self.name, error = %e, "Not retrying");
                    return Err(e);
                }
            };

            let ran_for = started.elapsed();
            if self.min_time_for_reset.is_some_and(|min| ran_for > min) {
                self.backoff.reset();
            }
            let delay = self.backoff.next_delay();
            tracing::warn!(
                supervisor = self.name,
                error = %err,
                ran_for = ?ran_for,
                attempt = self.backoff.attempts(),
                "Retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimeoutPhase;
    use crate::event::ChannelRole;

    fn fixed_backoff() -> BackoffConfig {
        BackoffConfig {
            base: 2.0,
            factor: Duration::from_secs(1),
            max_wait: Some(Duration::from_secs(60)),
            jitter: None,
        }
    }

    fn timeout_err() -> ChatError {
        ChatError::Timeout {
            role: ChannelRole::Read,
            phase: TimeoutPhase::Read,
            after: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_k_times_with_configured_delays() {
        let mut sup = RetrySupervisor::new("test", fixed_backoff(), &[ErrorKind::Timeout]);
        let mut calls = Vec::new();

        let result = sup
            .run_forever(|| {
                calls.push(Instant::now());
                let n = calls.len();
                async move {
                    if n <= 3 { Err(timeout_err()) } else { Ok(n) }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.len(), 4);
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates_after_one_call() {
        let mut sup = RetrySupervisor::new("test", fixed_backoff(), &[ErrorKind::Timeout]);
        let mut calls = 0;

        let result: Result<(), _> = sup
            .run_forever(|| {
                calls += 1;
                async { Err(ChatError::WrongToken("nope".into())) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::WrongToken);
        assert_eq!(calls, 1);
        assert_eq!(sup.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_lived_run_resets_backoff() {
        let mut sup = RetrySupervisor::new("test", fixed_backoff(), &[ErrorKind::Timeout])
            .reset_after(Duration::from_secs(10));
        let mut calls = Vec::new();

        sup.run_forever(|| {
            calls.push(Instant::now());
            let n = calls.len();
            async move {
                match n {
                    // Two quick failures climb the curve to 1s then 2s.
                    1 | 2 => Err(timeout_err()),
                    // A healthy session that dies after 30s.
                    3 => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Err(timeout_err())
                    }
                    _ => Ok(()),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(1));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(2));
        // 30s of run time plus the reset first delay.
        assert_eq!(calls[3] - calls[2], Duration::from_secs(31));
    }
}
