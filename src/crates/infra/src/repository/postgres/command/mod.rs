pub mod db_data;
pub mod interaction;

pub use interaction::InteractionRecordStoreImpl;
