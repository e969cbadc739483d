//! Domain primitives for the catalog.
//!
//! Series and episode ids are wrapped in newtypes so one can never be passed
//! where the other is expected.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }
    };
}

catalog_id!(
    /// Unique identifier of a series row.
    ///
    /// ```rust
    /// use anicat::domain::SeriesId;
    ///
    /// let id = SeriesId::new(42);
    /// assert_eq!(id.value(), 42);
    /// assert_eq!(id.to_string(), "42");
    /// ```
    SeriesId
);

catalog_id!(
    /// Unique identifier of an episode row.
    EpisodeId
);

/// Result of writing one episode row during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(EpisodeId),
    Updated(EpisodeId),
    /// The row already matched what the scan found.
    Unchanged(EpisodeId),
}

impl UpsertOutcome {
    #[must_use]
    pub const fn episode_id(&self) -> EpisodeId {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Unchanged(id) => *id,
        }
    }

    #[must_use]
    pub const fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}
