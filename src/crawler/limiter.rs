//! Outbound request pacing
//!
//! One [`RateLimiter`] guards one remote host and is shared by every task
//! talking to it. Callers queue on the gate inside [`RateLimiter::wait`], so
//! only one request passes at a time. A cooldown recorded while a caller is
//! already pausing at the gate still holds that caller back.

use crate::config::CrawlerConfig;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A limiter shared by every task talking to the same host
pub type SharedLimiter = Arc<RateLimiter>;

/// Gate enforcing a randomized minimum interval between outbound calls
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,

    /// Time the previous caller passed the gate; held while pausing
    last_call: Mutex<Option<Instant>>,

    /// Deadline of an active cooldown, readable without queueing at the gate
    cooldown_until: StdMutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter; the bounds are swapped if given in reverse
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };

        Self {
            min_delay,
            max_delay,
            last_call: Mutex::new(None),
            cooldown_until: StdMutex::new(None),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Draws the interval for the next call, uniform in `[min, max]`
    pub fn next_delay(&self) -> Duration {
        random_between(self.min_delay, self.max_delay)
    }

    /// Suspends until the interval since the previous call has elapsed and no
    /// cooldown is active, then returns the time the caller passed the gate
    ///
    /// The first call only waits for an active cooldown. The cooldown deadline
    /// is read again after every pause, so one recorded mid-pause extends it.
    pub async fn wait(&self) -> Instant {
        let mut last_call = self.last_call.lock().await;
        let paced = last_call.map(|last| last + self.next_delay());

        loop {
            let ready_at = match (paced, self.cooldown_deadline()) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };

            match ready_at {
                Some(ready_at) if ready_at > Instant::now() => {
                    tracing::trace!(
                        "Rate limiter pausing for {:?}",
                        ready_at - Instant::now()
                    );
                    tokio::time::sleep_until(ready_at.into()).await;
                }
                _ => break,
            }
        }

        let passed = Instant::now();
        *last_call = Some(passed);
        passed
    }

    /// Blocks the gate for an extended period after a rate-limit signal
    ///
    /// Takes effect immediately, including for a caller already pausing.
    pub fn cool_down(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut deadline = self
            .cooldown_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *deadline = Some(deadline.map_or(until, |existing| existing.max(until)));
        tracing::warn!("Remote host rate limited us, cooling down for {:?}", duration);
    }

    /// Deadline of the cooldown still in force, if any
    pub fn cooldown_deadline(&self) -> Option<Instant> {
        let deadline = *self
            .cooldown_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        deadline.filter(|until| *until > Instant::now())
    }

    /// Wraps the limiter for sharing across tasks
    pub fn shared(self) -> SharedLimiter {
        Arc::new(self)
    }
}

/// Uniform random duration in `[min, max]` at millisecond resolution
pub fn random_between(min: Duration, max: Duration) -> Duration {
    let low = min.as_millis() as u64;
    let high = max.as_millis() as u64;
    if high <= low {
        return min;
    }
    Duration::from_millis(fastrand::u64(low..=high))
}
