//! Error types for the mobility-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MobilityError`]: **Fatal**: the run cannot proceed at all (a report
//!   that cannot be opened, an unreadable input directory, contradictory
//!   configuration, an output file that cannot be written). Returned as
//!   `Err(MobilityError)` from the top-level `extract*` functions.
//!
//! * [`RegionSkip`]: **Non-fatal**: one chart region of one page was
//!   abandoned (label and chart counts disagree, no usable axis labels) but
//!   every other region is fine. Stored inside
//!   [`crate::output::PlaceReport`] so callers can see what was dropped.
//!
//! A wrong pairing of chart and label corrupts data silently, so a region is
//! always dropped whole rather than partially recovered.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mobility-extract library.
///
/// Region-level failures use [`RegionSkip`] and are stored in
/// [`crate::output::PlaceReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum MobilityError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Report file was not found at the given path.
    #[error("Report not found: '{path}'\nCheck the --pdfdir and --date values match the downloaded files.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// lopdf could not parse the document structure.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The input directory could not be listed.
    #[error("Cannot read report directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Discovery found nothing to parse after applying the place allow-list.
    #[error("No mobility reports found in '{dir}'{filter}")]
    NoReports { dir: PathBuf, filter: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pivot table could not be serialised.
    #[error("Failed to serialise '{path}': {detail}")]
    SerializeFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal reason for dropping one chart region.
///
/// `page` is the 0-based page index the region was read from (the aggregate
/// region reports page 1, matching the page tag on its records).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RegionSkip {
    /// The number of labelled categories differs from the number of charts.
    #[error("Page {page}: {labels} labelled categories but {charts} charts; region dropped")]
    CountMismatch {
        page: usize,
        labels: usize,
        charts: usize,
    },

    /// None of the axis tick labels could be read as a date.
    #[error("Page {page}: no readable axis tick dates; region dropped")]
    NoTickDates { page: usize },
}
