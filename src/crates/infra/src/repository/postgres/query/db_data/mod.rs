pub mod video_stats;
pub mod view_history;
