use application::command::shared::Clock;
use chrono::{NaiveDateTime, Utc};

/// Wall clock in UTC, the time source of the running service
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
