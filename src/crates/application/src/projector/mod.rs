pub mod item_stats;
pub mod view_history;
