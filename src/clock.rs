//! Wall-clock access for the timer and alarm services.
//!
//! Services take an `Arc<dyn Clock>` instead of calling `Utc::now()` directly so
//! tests can drive suspension, drift and alarm matching with a [`FakeClock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};

pub trait Clock: Send + Sync {
    /// Current instant, used for epoch timestamps and history records.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current local wall-clock time, used for alarm matching.
    fn now_local(&self) -> NaiveDateTime;

    fn epoch_ms(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually advanced clock. Local time is the UTC time with no offset applied.
#[derive(Debug, Clone)]
pub struct FakeClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl FakeClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.lock() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        match self.now.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clock for FakeClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.lock().and_utc()
    }

    fn now_local(&self) -> NaiveDateTime {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fake_clock_advances_both_views() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let clock = FakeClock::new(start);
        let before = clock.epoch_ms();

        clock.advance(Duration::seconds(90));

        assert_eq!(clock.epoch_ms() - before, 90_000);
        assert_eq!(clock.now_local(), start + Duration::seconds(90));
    }
}
