//! Progress-callback trait for per-place extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as each report is parsed. The CLI uses it to drive its progress bar;
//! library callers can forward events anywhere. The trait is `Send + Sync`
//! because places are parsed on blocking worker threads.
//!
//! # Example
//!
//! ```rust
//! use mobility_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RecordCounter {
//!     records: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RecordCounter {
//!     fn on_place_complete(&self, _place: &str, _total: usize, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RecordCounter { records: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each place.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_place_*` may be called concurrently from
/// different threads when `concurrency > 1`.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after discovery, before any report is opened.
    fn on_corpus_start(&self, total_places: usize) {
        let _ = total_places;
    }

    /// Called just before a place's report is opened.
    fn on_place_start(&self, place: &str, total_places: usize) {
        let _ = (place, total_places);
    }

    /// Called when a report was parsed. `records` may be zero.
    fn on_place_complete(&self, place: &str, total_places: usize, records: usize) {
        let _ = (place, total_places, records);
    }

    /// Called when a report could not be opened. The run aborts afterwards.
    fn on_place_error(&self, place: &str, total_places: usize, error: &str) {
        let _ = (place, total_places, error);
    }

    /// Called once after every place has been attempted.
    ///
    /// # Arguments
    /// * `total_places`: places attempted
    /// * `with_records`: places that produced at least one record
    fn on_corpus_complete(&self, total_places: usize, with_records: usize) {
        let _ = (total_places, with_records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
