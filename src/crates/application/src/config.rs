use chrono::Duration;

/// Interaction state machine settings, read on every call
pub trait InteractionConfig: Send + Sync {
    /// Repeat plays within this window of the last counted play are not counted.
    fn play_throttle_window(&self) -> Duration;
}
