//! Corpus assembly: merge place reports, backfill gaps, and pivot.
//!
//! ```text
//! PlaceReport* ──▶ long rows ──▶ backfill ──▶ normal pivot      (state, county, category) × date
//!                  (one per       (plan, then  └▶ covariates pivot (state, county, date) × category
//!                   dated value)   apply)
//! ```
//!
//! A county missing a category entirely gets a copy of the state's
//! `Overall` series for it, and every copy is recorded in the audit list.

use crate::output::PlaceReport;
use crate::pipeline::labels::OVERALL;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

/// One dated value in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRow {
    /// Place code with underscores replaced by spaces.
    pub state: String,
    pub county: String,
    /// Column form of the category, e.g. `retail/recreation`.
    pub category: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Display form of a place code: `New_York` → `New York`.
pub fn state_name(place: &str) -> String {
    place.replace('_', " ")
}

/// Flatten place reports into long rows, one per dated value.
pub fn long_rows(reports: &[PlaceReport]) -> Vec<LongRow> {
    reports
        .iter()
        .flat_map(|report| {
            let state = state_name(&report.place);
            report.records.iter().flat_map(move |record| {
                let state = state.clone();
                let category = record.category.column_name();
                record.points.iter().map(move |p| LongRow {
                    state: state.clone(),
                    county: record.county.clone(),
                    category: category.clone(),
                    date: p.date,
                    value: p.value,
                })
            })
        })
        .collect()
}

/// A (state, county, category) combination touched by backfill.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackfillEntry {
    pub state: String,
    pub county: String,
    pub category: String,
}

impl fmt::Display for BackfillEntry {
    /// Audit-log form: `state county category`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.state, self.county, self.category)
    }
}

/// Outcome of [`backfill`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backfill {
    pub rows: Vec<LongRow>,
    /// Combinations copied from the state aggregate.
    pub filled: Vec<BackfillEntry>,
    /// Combinations the state aggregate could not supply.
    pub unfilled: Vec<BackfillEntry>,
}

/// Fill every missing (state, county, category) from the state's `Overall` rows.
///
/// Categories are those observed anywhere in `rows`. The plan is computed
/// from the input snapshot, so copied rows never feed later copies.
pub fn backfill(rows: Vec<LongRow>) -> Backfill {
    let categories: BTreeSet<&str> = rows.iter().map(|r| r.category.as_str()).collect();
    let pairs: BTreeSet<(&str, &str)> = rows
        .iter()
        .map(|r| (r.state.as_str(), r.county.as_str()))
        .collect();
    let present: BTreeSet<(&str, &str, &str)> = rows
        .iter()
        .map(|r| (r.state.as_str(), r.county.as_str(), r.category.as_str()))
        .collect();

    // ── Phase 1: plan ────────────────────────────────────────────────────
    let mut filled = Vec::new();
    let mut unfilled = Vec::new();
    for &(state, county) in &pairs {
        for &category in &categories {
            if present.contains(&(state, county, category)) {
                continue;
            }
            let entry = BackfillEntry {
                state: state.to_string(),
                county: county.to_string(),
                category: category.to_string(),
            };
            if county != OVERALL && present.contains(&(state, OVERALL, category)) {
                filled.push(entry);
            } else {
                warn!("No aggregate to backfill {entry}");
                unfilled.push(entry);
            }
        }
    }

    // ── Phase 2: apply ───────────────────────────────────────────────────
    let mut copies = Vec::new();
    for entry in &filled {
        copies.extend(
            rows.iter()
                .filter(|r| {
                    r.state == entry.state && r.county == OVERALL && r.category == entry.category
                })
                .map(|r| LongRow {
                    county: entry.county.clone(),
                    ..r.clone()
                }),
        );
        debug!("Backfilled {entry}");
    }

    let mut rows = rows;
    rows.extend(copies);
    if !filled.is_empty() {
        info!("Backfilled {} county/category combinations", filled.len());
    }

    Backfill {
        rows,
        filled,
        unfilled,
    }
}

/// A wide table keyed by three index columns.
///
/// Rows and columns are sorted; absent cells read as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pivot {
    pub index_columns: [String; 3],
    pub value_columns: Vec<String>,
    pub rows: BTreeMap<[String; 3], BTreeMap<String, f64>>,
}

impl Pivot {
    fn build<'a, F>(index_columns: [&str; 3], rows: &'a [LongRow], split: F) -> Self
    where
        F: Fn(&'a LongRow) -> ([String; 3], String),
    {
        let mut columns = BTreeSet::new();
        let mut table: BTreeMap<[String; 3], BTreeMap<String, f64>> = BTreeMap::new();
        let mut duplicates = 0usize;

        for row in rows {
            let (key, column) = split(row);
            columns.insert(column.clone());
            let cells = table.entry(key).or_default();
            if let Some(prev) = cells.insert(column, row.value) {
                duplicates += 1;
                debug!("Duplicate cell {row:?} replaced {prev}");
            }
        }
        if duplicates > 0 {
            warn!(
                "{duplicates} duplicate cells in {} pivot; kept the last value",
                index_columns[2]
            );
        }

        Self {
            index_columns: index_columns.map(String::from),
            value_columns: columns.into_iter().collect(),
            rows: table,
        }
    }

    /// `(state, county, category)` × date.
    pub fn normal(rows: &[LongRow]) -> Self {
        Self::build(["state", "county", "category"], rows, |r| {
            (
                [r.state.clone(), r.county.clone(), r.category.clone()],
                r.date.to_string(),
            )
        })
    }

    /// `(state, county, date)` × category.
    pub fn covariates(rows: &[LongRow]) -> Self {
        Self::build(["state", "county", "date"], rows, |r| {
            (
                [r.state.clone(), r.county.clone(), r.date.to_string()],
                r.category.clone(),
            )
        })
    }

    pub fn cell(&self, key: &[String; 3], column: &str) -> Option<f64> {
        self.rows.get(key)?.get(column).copied()
    }

    /// Rows with one cell per value column, in column order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (&[String; 3], Vec<Option<f64>>)> + '_ {
        self.rows.iter().map(move |(key, cells)| {
            let values = self
                .value_columns
                .iter()
                .map(|c| cells.get(c).copied())
                .collect();
            (key, values)
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything derived from a set of place reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    /// Long rows after backfill.
    pub rows: Vec<LongRow>,
    pub filled: Vec<BackfillEntry>,
    pub unfilled: Vec<BackfillEntry>,
    pub normal: Pivot,
    pub covariates: Pivot,
}

impl Corpus {
    pub fn assemble(reports: &[PlaceReport]) -> Self {
        let Backfill {
            rows,
            filled,
            unfilled,
        } = backfill(long_rows(reports));
        let normal = Pivot::normal(&rows);
        let covariates = Pivot::covariates(&rows);
        info!(
            "Corpus: {} rows, {} normal rows, {} covariate rows",
            rows.len(),
            normal.len(),
            covariates.len()
        );
        Self {
            rows,
            filled,
            unfilled,
            normal,
            covariates,
        }
    }
}
