//! Exponential backoff with jitter.
//!
//! The delay for attempt `n` is `factor * base^n`, clamped to `max_wait`,
//! then shifted by a uniform draw from `[-j/2, +j/2)` where
//! `j = min(raw / 2, jitter)`. Because `j` never exceeds half the raw delay
//! the result is never negative.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Growth per attempt. Must be greater than 1 to back off at all.
    pub base: f64,
    /// Delay of the first attempt.
    pub factor: Duration,
    /// Upper bound before jitter. `None` leaves the delay unclamped.
    pub max_wait: Option<Duration>,
    /// Jitter width. `None` disables jitter.
    pub jitter: Option<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: 2.0,
            factor: Duration::from_secs(1),
            max_wait: Some(Duration::from_secs(60)),
            jitter: Some(Duration::from_secs(1)),
        }
    }
}

/// Attempt counter plus the configuration it is evaluated against.
///
/// Owned by exactly one retry supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// The clamped delay for the current attempt, before jitter.
    pub fn raw_delay(&self) -> Duration {
        let exp = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        let secs = self.config.factor.as_secs_f64() * self.config.base.powi(exp);
        let raw = if secs.is_finite() {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        match self.config.max_wait {
            Some(max) => raw.min(max),
            None => raw,
        }
    }

    /// Next delay using the thread-local RNG.
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Next delay drawing jitter from `rng`. Advances the attempt counter.
    pub fn next_delay_with<R: Rng>(&mut self, rng: &mut R) -> Duration {
        let raw = self.raw_delay();
        self.attempts = self.attempts.saturating_add(1);

        let Some(jitter) = self.config.jitter else {
            return raw;
        };
        let width = (raw / 2).min(jitter).as_secs_f64();
        if width == 0.0 {
            return raw;
        }
        let shift = rng.gen_range(-width / 2.0..width / 2.0);
        Duration::try_from_secs_f64((raw.as_secs_f64() + shift).max(0.0)).unwrap_or(raw)
    }
}
