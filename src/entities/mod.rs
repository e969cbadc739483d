pub mod prelude;

pub mod episodes;
pub mod series;
pub mod watch_progress;
