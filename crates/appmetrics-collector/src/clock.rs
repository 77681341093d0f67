//! Time sources for the poll loop.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Supplies the current time and interval timers.
pub trait Clock: Send + Sync {
    /// Current time as unix nanoseconds.
    fn now(&self) -> i64;

    /// A one-shot timer that fires once `duration` has elapsed.
    fn new_timer(&self, duration: Duration) -> Timer;
}

/// A pending one-shot timer.
pub struct Timer {
    sleep: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Timer {
    pub fn new(sleep: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            sleep: Box::pin(sleep),
        }
    }

    /// Wait for the timer to fire.
    pub async fn fired(&mut self) {
        self.sleep.as_mut().await
    }

    /// Cancel the timer. Consuming it drops the boxed tokio `Sleep`, which
    /// deregisters it from the runtime's timer wheel.
    pub fn stop(self) {}
}

/// Wall-clock time with tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as i64
    }

    fn new_timer(&self, duration: Duration) -> Timer {
        Timer::new(tokio::time::sleep(duration))
    }
}

/// A clock anchored at a fixed epoch that advances with tokio's clock.
///
/// Under `tokio::time::pause()` both `now()` and timers only move when the
/// runtime advances time, so poll schedules are deterministic.
#[derive(Debug, Clone)]
pub struct FakeClock {
    origin_nanos: i64,
    origin: tokio::time::Instant,
}

impl FakeClock {
    /// A clock reading `origin_nanos` at the current tokio instant.
    pub fn new(origin_nanos: i64) -> Self {
        Self {
            origin_nanos,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> i64 {
        self.origin_nanos + self.origin.elapsed().as_nanos() as i64
    }

    fn new_timer(&self, duration: Duration) -> Timer {
        Timer::new(tokio::time::sleep(duration))
    }
}
