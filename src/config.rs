//! Configuration types for chart extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct keeps every knob shareable
//! across the worker threads that parse places concurrently.

use crate::error::MobilityError;
use crate::progress::ProgressCallback;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Report date used in file names when none is given.
pub const DEFAULT_REPORT_DATE: &str = "2020-03-29";

/// Configuration for a corpus extraction run.
///
/// # Example
/// ```rust
/// use mobility_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .report_date("2020-04-05")
///     .place_codes(["Alaska", "GB"])
///     .aggregate_only(true)
///     .build()
///     .unwrap();
/// assert!(!config.regions.includes_detail());
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Which chart regions to read from each report. Default: both.
    pub regions: RegionSelection,

    /// Report date stamp, `YYYY-MM-DD`. Default: `2020-03-29`.
    ///
    /// Only used to locate input files and name outputs. Tick labels are
    /// always read as 2020 dates (see [`crate::pipeline::series::REPORT_YEAR`]).
    pub report_date: String,

    /// Allow-list of place codes (Google's naming, e.g. `New_York`, `GB`).
    /// Empty means every discovered report.
    pub place_codes: Vec<String>,

    /// Number of reports parsed at once. Default: 4.
    ///
    /// Places are independent until backfill, so this only changes wall-clock
    /// time; results are always collected in place order.
    pub concurrency: usize,

    /// Optional per-place progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            regions: RegionSelection::default(),
            report_date: DEFAULT_REPORT_DATE.to_string(),
            place_codes: Vec::new(),
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("regions", &self.regions)
            .field("report_date", &self.report_date)
            .field("place_codes", &self.place_codes)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
            aggregate_only: false,
            no_aggregate: false,
        }
    }

    /// Whether `place` passes the allow-list.
    pub fn wants_place(&self, place: &str) -> bool {
        self.place_codes.is_empty() || self.place_codes.iter().any(|p| p == place)
    }
}

/// Builder for [`ExtractionConfig`].
///
/// The two region flags mirror the CLI switches and are reconciled in
/// [`build`](Self::build), which rejects setting both.
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
    aggregate_only: bool,
    no_aggregate: bool,
}

impl ExtractionConfigBuilder {
    pub fn aggregate_only(mut self, v: bool) -> Self {
        self.aggregate_only = v;
        self
    }

    pub fn no_aggregate(mut self, v: bool) -> Self {
        self.no_aggregate = v;
        self
    }

    pub fn report_date(mut self, date: impl Into<String>) -> Self {
        self.config.report_date = date.into();
        self
    }

    pub fn place_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.place_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, MobilityError> {
        self.config.regions = match (self.aggregate_only, self.no_aggregate) {
            (true, true) => {
                return Err(MobilityError::InvalidConfig(
                    "Can't have only aggregate and no aggregate".into(),
                ))
            }
            (true, false) => RegionSelection::AggregateOnly,
            (false, true) => RegionSelection::DetailOnly,
            (false, false) => RegionSelection::Both,
        };
        if self.config.concurrency == 0 {
            return Err(MobilityError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if NaiveDate::parse_from_str(&self.config.report_date, "%Y-%m-%d").is_err() {
            return Err(MobilityError::InvalidConfig(format!(
                "Report date must be YYYY-MM-DD, got '{}'",
                self.config.report_date
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which regions of a report are turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionSelection {
    /// Front-page aggregate and every detail page. (default)
    #[default]
    Both,
    /// Only the front-page "Overall" charts.
    AggregateOnly,
    /// Only the per-county detail pages.
    DetailOnly,
}

impl RegionSelection {
    pub fn includes_aggregate(self) -> bool {
        !matches!(self, RegionSelection::DetailOnly)
    }

    pub fn includes_detail(self) -> bool {
        !matches!(self, RegionSelection::AggregateOnly)
    }

    /// Suffix appended to output file stems.
    pub fn file_suffix(self) -> &'static str {
        match self {
            RegionSelection::Both => "",
            RegionSelection::AggregateOnly => "_aggregate_only",
            RegionSelection::DetailOnly => "_no_aggregate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_read_both_regions() {
        let c = ExtractionConfig::builder().build().unwrap();
        assert_eq!(c.regions, RegionSelection::Both);
        assert_eq!(c.report_date, DEFAULT_REPORT_DATE);
        assert!(c.wants_place("Anything"));
    }

    #[test]
    fn region_flags_are_mutually_exclusive() {
        let err = ExtractionConfig::builder()
            .aggregate_only(true)
            .no_aggregate(true)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("only aggregate"), "got: {err}");
    }

    #[test]
    fn region_flags_map_to_selection() {
        let c = ExtractionConfig::builder().no_aggregate(true).build().unwrap();
        assert_eq!(c.regions, RegionSelection::DetailOnly);
        assert!(!c.regions.includes_aggregate());
        assert!(c.regions.includes_detail());
        assert_eq!(c.regions.file_suffix(), "_no_aggregate");
    }

    #[test]
    fn rejects_zero_concurrency_and_bad_dates() {
        assert!(ExtractionConfig::builder().concurrency(0).build().is_err());
        assert!(ExtractionConfig::builder()
            .report_date("29/03/2020")
            .build()
            .is_err());
    }

    #[test]
    fn allow_list_filters_places() {
        let c = ExtractionConfig::builder()
            .place_codes(["Alaska"])
            .build()
            .unwrap();
        assert!(c.wants_place("Alaska"));
        assert!(!c.wants_place("Alabama"));
    }
}
