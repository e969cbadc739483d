pub mod catalog;
pub use catalog::{Catalog, CatalogError, PlaybackSink, Thumbnailer};

pub mod covers;
pub use covers::CoverCache;

pub mod enricher;
pub use enricher::{EnrichOutcome, EnrichReport, EnrichStatus, Enricher};

pub mod media;
pub use media::MediaService;

pub mod rate_limit;
pub use rate_limit::RateLimiter;

pub mod scanner;
pub use scanner::{LibraryScanner, ScanError, ScanIssue, ScanReport};
