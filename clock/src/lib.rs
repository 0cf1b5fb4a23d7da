//! Abstract wall clock so that TTL-driven logic (session expiry, the
//! Sweeper) can be driven deterministically in tests instead of racing the
//! real system clock.

use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns seconds since the Unix epoch as a floating point value, mirroring
/// the original Python service's `TimeService.now` (a `datetime.timestamp()`
/// float). `Session::created`/`expires_at` are stored in this unit.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Defers to the OS clock. The only `Clock` implementation wired up in
/// production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// A fake clock whose value is set explicitly. Used by tests that need to
/// assert TTL-boundary behavior (e.g. "still present at t, gone at t+1").
#[derive(Debug, Default)]
pub struct TestClock {
    time: Mutex<f64>,
}

impl TestClock {
    pub fn new(start_time: f64) -> Self {
        Self {
            time: Mutex::new(start_time),
        }
    }

    pub fn set(&self, value: f64) {
        *self.time.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }

    pub fn advance(&self, seconds: f64) {
        let mut guard = self.time.lock().unwrap_or_else(|e| e.into_inner());
        *guard += seconds;
    }
}

impl Clock for TestClock {
    fn now(&self) -> f64 {
        *self.time.lock().unwrap_or_else(|e| e.into_inner())
    }
}
