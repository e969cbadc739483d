//! Catalog events.
//!
//! Scans and enrichment runs publish these on the event bus. Each run emits
//! zero or more progress events followed by exactly one terminal event.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum CatalogEvent {
    ScanStarted {
        root: String,
    },
    SeriesDiscovered {
        title: String,
    },
    ScanProgress {
        current: usize,
        total: usize,
    },
    ScanFinished {
        series_touched: usize,
        episodes_added: usize,
        episodes_updated: usize,
        errors: usize,
        cancelled: bool,
    },
    ScanFailed {
        message: String,
    },

    EnrichStarted {
        pending: usize,
    },
    SeriesEnriched {
        title: String,
        success: bool,
    },
    EnrichFinished {
        enriched: usize,
        failed: usize,
        cancelled: bool,
    },
}

impl CatalogEvent {
    /// Whether this event closes a scan or enrichment run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ScanFinished { .. } | Self::ScanFailed { .. } | Self::EnrichFinished { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = CatalogEvent::SeriesEnriched {
            title: "Show".to_string(),
            success: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SeriesEnriched");
        assert_eq!(json["payload"]["title"], "Show");
    }

    #[test]
    fn terminal_events() {
        assert!(CatalogEvent::ScanFailed { message: String::new() }.is_terminal());
        assert!(!CatalogEvent::ScanStarted { root: String::new() }.is_terminal());
    }
}
