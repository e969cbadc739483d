pub use super::episodes::Entity as Episodes;
pub use super::series::Entity as Series;
pub use super::watch_progress::Entity as WatchProgress;
