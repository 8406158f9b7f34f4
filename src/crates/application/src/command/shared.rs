use chrono::NaiveDateTime;

/// Wall-clock source for throttle decisions, UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}
