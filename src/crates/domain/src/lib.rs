pub mod event;
pub mod interaction;
pub mod value;
