pub mod interaction;
pub mod item_stats;
pub mod view_history;

pub use interaction::InMemoryInteractionRecordStore;
pub use item_stats::InMemoryItemStatsRepository;
pub use view_history::InMemoryViewHistoryRepository;
