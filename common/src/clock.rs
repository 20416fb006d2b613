use chrono::{DateTime, Utc};

/// An injected source of "now", per §9's mandate that clock and rand be
/// explicit collaborators rather than ambient calls to `Utc::now()`, so
/// tests can simulate stale leases and backoff deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable/advanceable clock for tests, grounded in the same
/// collaborator-injection pattern the teacher uses for its `Database`
/// and `s3::Client` handles: the test fixture constructs one of these
/// instead of the real clock and hands it to the same component struct.
#[cfg(any(test, feature = "testing"))]
pub struct FakeClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(any(test, feature = "testing"))]
impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        FakeClock(std::sync::Mutex::new(start))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard = *guard + delta;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().unwrap() = to;
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
