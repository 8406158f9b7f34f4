pub trait DomainEvent: Send + Sync {
    fn aggregate_id(&self) -> i64;
    /// Stable name used in logs and dispatch diagnostics.
    fn kind(&self) -> &'static str;
}
