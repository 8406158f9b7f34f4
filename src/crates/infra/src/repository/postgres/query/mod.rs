pub mod db_data;
pub mod item_stats;
pub mod view_history;

pub use item_stats::ItemStatsRepositoryImpl;
pub use view_history::ViewHistoryRepositoryImpl;
