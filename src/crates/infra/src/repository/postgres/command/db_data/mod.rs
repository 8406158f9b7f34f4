pub mod user_video;
