pub mod filename;
pub mod natural;

pub use filename::{ParsedName, clean_title, parse, season_from_hints};
pub use natural::natural_cmp;
