//! # mobility-extract
//!
//! Recover the time series behind the line charts in Google's COVID-19
//! Community Mobility PDF reports and reshape them into tables.
//!
//! ## Why this crate?
//!
//! The reports publish their data only as charts. The charts are vector
//! paths, though, so the numbers are still in the file: every point of every
//! line is a `x y l` instruction inside a form XObject. This crate reads
//! those instructions back, pairs each chart with the label and headline
//! printed next to it, and maps the x-axis onto calendar dates.
//!
//! ## Pipeline Overview
//!
//! ```text
//! report PDF
//!  │
//!  ├─ 1. Source   page text + chart XObjects in draw order (lopdf)
//!  ├─ 2. Stream   decode path operators, find the zero line, keep usable charts
//!  ├─ 3. Labels   county blocks, category labels, headline %, tick dates
//!  ├─ 4. Series   pair charts with labels, x → date, recompute end value
//!  ├─ 5. Page     front pages (aggregate) and detail pages (counties)
//!  └─ 6. Corpus   long rows → backfill from "Overall" → two pivots → JSON/CSV
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mobility_extract::{extract_to_dir, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .place_codes(["Alaska", "New_York"])
//!         .build()?;
//!     let (output, files) = extract_to_dir("reports/", "output/", &config).await?;
//!     eprintln!("{} records, {} backfilled", output.stats.records, output.stats.backfilled);
//!     for path in files.all() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Parsing a report you already have open with another backend only needs a
//! [`ReportSource`] implementation and [`parse_place`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mobility2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mobility-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod corpus;
pub mod discover;
pub mod error;
pub mod export;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, RegionSelection};
pub use corpus::{BackfillEntry, Corpus, LongRow, Pivot};
pub use error::{MobilityError, RegionSkip};
pub use extract::{extract_corpus, extract_corpus_sync, extract_place, extract_to_dir};
pub use output::{CategoryRecord, CorpusOutput, ExtractionStats, PlaceReport, WrittenFiles};
pub use pipeline::labels::Category;
pub use pipeline::page::parse_place;
pub use pipeline::series::SeriesPoint;
pub use pipeline::source::{ChartObject, InMemoryReport, PdfReport, ReportSource};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
