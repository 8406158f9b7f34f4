pub mod item_stats;
pub mod registry;
pub mod view_history;
