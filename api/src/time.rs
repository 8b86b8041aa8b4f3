use jiff::{Timestamp, Zoned, civil::Date, tz::TimeZone};
#[cfg(feature = "mock-time")]
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct TimeSource {
    #[cfg(feature = "mock-time")]
    time: Arc<Mutex<Timestamp>>,
}

impl TimeSource {
    #[allow(clippy::new_without_default)]
    #[cfg(not(feature = "mock-time"))]
    pub fn new() -> Self {
        Self {}
    }

    #[cfg(feature = "mock-time")]
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(initial_time)),
        }
    }

    #[cfg(not(feature = "mock-time"))]
    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    #[cfg(feature = "mock-time")]
    pub fn now(&self) -> Timestamp {
        *self.time.lock().unwrap()
    }

    /// The current instant in the scheduling timezone. Wall-clock cadences
    /// (daily at 08:00, weekly Sunday 03:00) are evaluated against this.
    pub fn zoned_now(&self) -> Zoned {
        self.now().to_zoned(self.tz())
    }

    /// The current calendar date. Movement rows, subscription charges and
    /// reminder dispatch all key off this.
    pub fn today(&self) -> Date {
        self.zoned_now().date()
    }

    // Mocked runs pin the zone so tests don't depend on the host machine.
    #[cfg(feature = "mock-time")]
    fn tz(&self) -> TimeZone {
        TimeZone::UTC
    }

    #[cfg(not(feature = "mock-time"))]
    fn tz(&self) -> TimeZone {
        TimeZone::system()
    }

    /// Advance the mocked clock. Calendar units (days and up) are applied
    /// in UTC so they stay deterministic.
    #[cfg(feature = "mock-time")]
    pub fn advance(&self, duration: jiff::Span) {
        let mut time = self.time.lock().unwrap();
        *time = time
            .to_zoned(TimeZone::UTC)
            .checked_add(duration)
            .unwrap()
            .timestamp();
    }

    #[cfg(feature = "mock-time")]
    pub fn set(&self, time: Timestamp) {
        *self.time.lock().unwrap() = time;
    }
}
