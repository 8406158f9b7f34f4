pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod projector;
