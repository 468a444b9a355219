//! Output types produced by the extraction pipeline.

use crate::corpus::Corpus;
use crate::error::RegionSkip;
use crate::pipeline::labels::Category;
use crate::pipeline::series::SeriesPoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One chart recovered from a report, with its label and date-mapped values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Place code as used in the report file name, e.g. `New_York` or `GB`.
    pub place: String,

    /// County name, or `"Overall"` for the front-page aggregate.
    pub county: String,

    pub category: Category,

    /// Page the chart was read from (the aggregate region is tagged 1).
    pub page: usize,

    /// Headline percent printed next to the chart.
    pub change: i32,

    /// Percent recomputed from the last point of the chart.
    pub changecalc: f64,

    /// Axis tick labels the dates were derived from.
    pub tick_labels: Vec<String>,

    pub points: Vec<SeriesPoint>,
}

/// Everything recovered from one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceReport {
    pub place: String,

    /// Records in page order, then county and category order within a page.
    pub records: Vec<CategoryRecord>,

    /// Regions that were dropped, with the reason.
    pub skipped: Vec<RegionSkip>,
}

impl PlaceReport {
    pub fn new(place: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            ..Self::default()
        }
    }

    /// Number of distinct counties with at least one record.
    pub fn county_count(&self) -> usize {
        let mut counties: Vec<&str> = self.records.iter().map(|r| r.county.as_str()).collect();
        counties.sort_unstable();
        counties.dedup();
        counties.len()
    }

    /// Total number of dated values across all records.
    pub fn point_count(&self) -> usize {
        self.records.iter().map(|r| r.points.len()).sum()
    }
}

/// Aggregate statistics for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Places attempted.
    pub places: usize,

    /// Places that produced at least one record.
    pub places_with_records: usize,

    pub records: usize,

    /// Dated values across all records, before backfill.
    pub points: usize,

    /// Regions dropped across all places.
    pub skipped_regions: usize,

    /// (state, county, category) combinations filled from the state aggregate.
    pub backfilled: usize,

    /// Combinations that could not be filled because the aggregate lacked them.
    pub unfilled: usize,

    pub duration_ms: u64,
}

/// Result of [`crate::extract_corpus`].
#[derive(Debug, Clone)]
pub struct CorpusOutput {
    /// Per-place results, in place order.
    pub reports: Vec<PlaceReport>,

    /// Long rows, backfill audit and both pivots.
    pub corpus: Corpus,

    pub stats: ExtractionStats,
}

/// Paths written by [`crate::extract_to_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenFiles {
    pub normal_json: PathBuf,
    pub normal_csv: PathBuf,
    pub covariates_json: PathBuf,
    pub covariates_csv: PathBuf,

    /// Backfill log; `None` when nothing was backfilled.
    pub backfill_log: Option<PathBuf>,
}

impl WrittenFiles {
    pub fn all(&self) -> Vec<&PathBuf> {
        let mut v = vec![
            &self.normal_json,
            &self.covariates_json,
            &self.normal_csv,
            &self.covariates_csv,
        ];
        v.extend(self.backfill_log.as_ref());
        v
    }
}
