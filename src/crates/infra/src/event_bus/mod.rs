use std::time::Duration;

pub mod in_memory;

/// How the in-memory bus delivers envelopes to handlers.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Spawn deliveries instead of awaiting them inside `publish`
    pub fire_and_forget: bool,
    /// Attempts per handler delivery, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled on every further one
    pub retry_backoff: Duration,
    /// Deliveries allowed to run at the same time
    pub max_in_flight: usize,
}

impl DispatchPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1u32 << exp)
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            fire_and_forget: true,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            max_in_flight: 64,
        }
    }
}

/// Snapshot of delivery outcomes since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
}
