pub mod episode;
pub mod series;
pub mod watch;
