pub mod episode;
pub mod series;

pub use episode::{Episode, EpisodeInput, WatchState};
pub use series::{Series, SeriesMetadata};
