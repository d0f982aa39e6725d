//! Time sources for paced control loops.
//!
//! Every sleep and elapsed-time measurement in the rig goes through a
//! [`Clock`], so sequencers can run against the wall clock on hardware and
//! against a [`ManualClock`] in tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source that can also block.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
///
/// Clones share the same timeline, so one clock can be handed to several
/// components and still observed from a test.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    state: Rc<RefCell<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.state.borrow_mut().now += duration;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }

    /// Sum of all recorded sleeps.
    pub fn total_slept(&self) -> Duration {
        self.state.borrow().sleeps.iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Elapsed-time measurement against any [`Clock`].
pub struct Stopwatch<'a, C: Clock + ?Sized> {
    clock: &'a C,
    start: Duration,
}

impl<'a, C: Clock + ?Sized> Stopwatch<'a, C> {
    pub fn start(clock: &'a C) -> Self {
        Self {
            clock,
            start: clock.now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(300));
        clock.sleep(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_millis(1300));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn clones_share_a_timeline() {
        let clock = ManualClock::new();
        let other = clock.clone();
        other.sleep(Duration::from_secs(2));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(3));
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[test]
    fn stopwatch_measures_from_start() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(5));
        let watch = Stopwatch::start(&clock);
        clock.sleep(Duration::from_millis(250));
        assert_eq!(watch.elapsed(), Duration::from_millis(250));
    }
}
