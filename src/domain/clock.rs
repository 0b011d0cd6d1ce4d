use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// Time source for the scheduler.
///
/// All window comparisons go through this trait so tests can drive the
/// scheduler with a settable clock instead of waiting for wall time.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests. Cloning shares the underlying time, so a test
/// can keep one handle and advance the clock between scheduler ticks.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { time: Arc::new(RwLock::new(start)) }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.time.write().expect("RwLock poisoned") = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.time.write().expect("RwLock poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().expect("RwLock poisoned")
    }
}
