pub mod interaction;
pub mod shared;
