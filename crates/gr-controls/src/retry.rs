//! Bounded retries and cancellation for polling loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gr_config::RetryConfig;
use gr_core::Clock;
use gr_devices::LinkResult;
use tracing::warn;

use crate::error::{ControlError, ControlResult};

/// Exponential backoff between failed device reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    ) -> ControlResult<Self> {
        if max_attempts == 0 {
            return Err(ControlError::InvalidArg {
                what: "max_attempts must be at least 1",
            });
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ControlError::InvalidArg {
                what: "multiplier must be >= 1",
            });
        }
        Ok(Self {
            max_attempts,
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            multiplier,
        })
    }

    pub fn from_config(config: &RetryConfig) -> ControlResult<Self> {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.multiplier,
        )
    }

    /// A single attempt, no backoff.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exp);
        let cap = self.max_backoff.as_nanos() as f64;
        Duration::from_nanos(scaled.min(cap).round() as u64)
    }

    /// Run `op` until it succeeds, the attempts run out or `cancel` fires.
    pub fn run<T, C, F>(
        &self,
        clock: &C,
        cancel: &Cancellation,
        what: &'static str,
        mut op: F,
    ) -> ControlResult<T>
    where
        C: Clock + ?Sized,
        F: FnMut() -> LinkResult<T>,
    {
        let mut attempt = 1;
        loop {
            cancel.check(clock, what)?;
            match op() {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= self.max_attempts => {
                    return Err(ControlError::DeviceUnavailable {
                        what,
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    let pause = self.backoff(attempt);
                    warn!(
                        what,
                        attempt,
                        error = %err,
                        backoff_ms = pause.as_millis() as u64,
                        "read failed, retrying"
                    );
                    clock.sleep(pause);
                    attempt += 1;
                }
            }
        }
    }
}

/// Stop signal for long-running loops: an explicit flag, a deadline on the
/// loop's clock, or both.
///
/// Clones share the flag, so one clone can be handed to a signal handler
/// while the loop holds another.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Duration>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never fires unless [`cancel`](Self::cancel) is called.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fire once the clock reads `deadline` or later.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fire `timeout` after the clock's current time.
    pub fn after<C: Clock + ?Sized>(self, clock: &C, timeout: Duration) -> Self {
        self.with_deadline(clock.now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self, now: Duration) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| now >= d)
    }

    pub fn check<C: Clock + ?Sized>(&self, clock: &C, what: &'static str) -> ControlResult<()> {
        if self.is_cancelled(clock.now()) {
            return Err(ControlError::Cancelled { what });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_core::ManualClock;
    use gr_devices::{LinkError, LinkKind};

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            4,
            Duration::from_millis(50),
            Duration::from_millis(120),
            2.0,
        )
        .unwrap()
    }

    #[test]
    fn backoff_grows_then_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(50));
        assert_eq!(p.backoff(2), Duration::from_millis(100));
        assert_eq!(p.backoff(3), Duration::from_millis(120));
    }

    #[test]
    fn recovers_after_transient_failures() {
        let clock = ManualClock::new();
        let mut failures = 2;
        let value = policy()
            .run(&clock, &Cancellation::none(), "status read", || {
                if failures > 0 {
                    failures -= 1;
                    Err(LinkError::io(LinkKind::Temperature, "timeout"))
                } else {
                    Ok(42)
                }
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }

    #[test]
    fn exhausted_attempts_surface_device_unavailable() {
        let clock = ManualClock::new();
        let mut calls = 0;
        let err = policy()
            .run(&clock, &Cancellation::none(), "status read", || -> LinkResult<()> {
                calls += 1;
                Err(LinkError::io(LinkKind::Temperature, "timeout"))
            })
            .unwrap_err();
        assert_eq!(calls, 4);
        assert!(matches!(
            err,
            ControlError::DeviceUnavailable { attempts: 4, .. }
        ));
    }

    #[test]
    fn deadline_stops_retries() {
        let clock = ManualClock::new();
        let cancel = Cancellation::new().after(&clock, Duration::from_millis(60));
        let err = policy()
            .run(&clock, &cancel, "status read", || -> LinkResult<()> {
                Err(LinkError::io(LinkKind::Temperature, "timeout"))
            })
            .unwrap_err();
        assert_eq!(err, ControlError::Cancelled { what: "status read" });
    }

    #[test]
    fn flag_is_shared_between_clones() {
        let cancel = Cancellation::new();
        let handle = cancel.clone();
        assert!(!cancel.is_cancelled(Duration::ZERO));
        handle.cancel();
        assert!(cancel.is_cancelled(Duration::ZERO));
    }

    #[test]
    fn rejects_zero_attempts() {
        assert!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 2.0).is_err());
    }
}
