pub mod repository;

pub mod event_bus;
pub use event_bus::{DispatchPolicy, DispatchStats};

pub mod clock;
pub use clock::SystemClock;

pub mod config;
pub use config::{DatabaseConfig, LogConfig};
