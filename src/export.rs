//! Writers for the pivot tables and the backfill audit log.
//!
//! Each pivot is written twice: as a JSON array of row objects and as CSV.
//! Both carry the three index columns first, then one column per value
//! column; an absent cell is `null` in JSON and empty in CSV.
//!
//! Files are written to a temp file in the target directory and renamed
//! into place, so a failed run never leaves a truncated table behind.

use crate::corpus::{BackfillEntry, Corpus, Pivot};
use crate::discover::OutputLayout;
use crate::error::MobilityError;
use crate::output::WrittenFiles;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Pivot as a JSON array of records.
pub fn pivot_to_json(pivot: &Pivot) -> Value {
    let records = pivot
        .iter_rows()
        .map(|(key, values)| {
            let mut obj = Map::new();
            for (name, v) in pivot.index_columns.iter().zip(key) {
                obj.insert(name.clone(), Value::String(v.clone()));
            }
            for (name, v) in pivot.value_columns.iter().zip(values) {
                let cell = v
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                obj.insert(name.clone(), cell);
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

/// Pivot as CSV with a header row. Missing cells are empty fields.
pub fn pivot_to_csv(pivot: &Pivot) -> csv::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(pivot.index_columns.iter().chain(&pivot.value_columns))?;

    for (key, values) in pivot.iter_rows() {
        let cells = values.into_iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default());
        writer.write_record(key.iter().cloned().chain(cells))?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// One `state county category` line per backfilled combination.
pub fn backfill_log(entries: &[BackfillEntry]) -> String {
    entries.iter().map(|e| format!("{e}\n")).collect()
}

/// Write `contents` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), MobilityError> {
    let fail = |e: std::io::Error| MobilityError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(contents).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

fn write_csv(path: &Path, pivot: &Pivot) -> Result<(), MobilityError> {
    let bytes = pivot_to_csv(pivot).map_err(|e| MobilityError::SerializeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    write_atomic(path, &bytes)
}

fn write_json(path: &Path, value: &Value) -> Result<(), MobilityError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| MobilityError::SerializeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    write_atomic(path, text.as_bytes())
}

/// Write both pivots and the audit log under `layout`.
///
/// A stale audit log from an earlier run is removed; a new one is written
/// only when something was backfilled.
pub fn write_corpus(corpus: &Corpus, layout: &OutputLayout) -> Result<WrittenFiles, MobilityError> {
    let files = WrittenFiles {
        normal_json: layout.file("_normal.json"),
        covariates_json: layout.file("_covariates.json"),
        normal_csv: layout.file("_normal.csv"),
        covariates_csv: layout.file("_covariates.csv"),
        backfill_log: (!corpus.filled.is_empty()).then(|| layout.backfill_log()),
    };

    let log_path = layout.backfill_log();
    match std::fs::remove_file(&log_path) {
        Ok(()) => debug!("Removed stale {}", log_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(MobilityError::OutputWriteFailed {
                path: log_path,
                source: e,
            })
        }
    }

    write_json(&files.normal_json, &pivot_to_json(&corpus.normal))?;
    write_json(&files.covariates_json, &pivot_to_json(&corpus.covariates))?;
    write_csv(&files.normal_csv, &corpus.normal)?;
    write_csv(&files.covariates_csv, &corpus.covariates)?;
    if let Some(ref path) = files.backfill_log {
        write_atomic(path, backfill_log(&corpus.filled).as_bytes())?;
    }

    info!(
        "Wrote {} files to {} (stem {})",
        files.all().len(),
        layout.dir.display(),
        layout.stem
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::LongRow;
    use chrono::NaiveDate;

    fn rows() -> Vec<LongRow> {
        let row = |county: &str, category: &str, day: u32, value: f64| LongRow {
            state: "New York".into(),
            county: county.into(),
            category: category.into(),
            date: NaiveDate::from_ymd_opt(2020, 3, day).unwrap(),
            value,
        };
        vec![
            row("Overall", "parks", 1, 5.5),
            row("Overall", "parks", 2, -1.25),
            row("Bronx County, NY", "parks", 2, 3.0),
        ]
    }

    #[test]
    fn json_records_keep_column_order_and_nulls() {
        let json = pivot_to_json(&Pivot::normal(&rows()));
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);

        let bronx = records[0].as_object().unwrap();
        let keys: Vec<&str> = bronx.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["state", "county", "category", "2020-03-01", "2020-03-02"]);
        assert_eq!(bronx["2020-03-01"], Value::Null);
        assert_eq!(bronx["2020-03-02"], serde_json::json!(3.0));
    }

    #[test]
    fn csv_quotes_fields_and_leaves_missing_cells_empty() {
        let csv = String::from_utf8(pivot_to_csv(&Pivot::normal(&rows())).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "state,county,category,2020-03-01,2020-03-02");
        assert_eq!(lines[1], "New York,\"Bronx County, NY\",parks,,3");
        assert_eq!(lines[2], "New York,Overall,parks,5.5,-1.25");
    }

    #[test]
    fn covariates_csv_has_category_columns() {
        let csv = String::from_utf8(pivot_to_csv(&Pivot::covariates(&rows())).unwrap()).unwrap();
        assert!(csv.starts_with("state,county,date,parks\n"));
        assert!(csv.contains("New York,Overall,2020-03-02,-1.25\n"));
    }

    #[test]
    fn audit_log_lines() {
        let entries = vec![BackfillEntry {
            state: "New York".into(),
            county: "Kings County".into(),
            category: "workplace".into(),
        }];
        assert_eq!(backfill_log(&entries), "New York Kings County workplace\n");
    }

    #[test]
    fn write_corpus_creates_files_and_clears_stale_log() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout {
            dir: dir.path().join("New_York"),
            stem: "2020-03-29_US_New_York".into(),
        };
        std::fs::create_dir_all(&layout.dir).unwrap();
        std::fs::write(layout.backfill_log(), "old\n").unwrap();

        let rows = rows();
        let corpus = Corpus {
            normal: Pivot::normal(&rows),
            covariates: Pivot::covariates(&rows),
            rows,
            ..Corpus::default()
        };
        let files = write_corpus(&corpus, &layout).unwrap();

        assert_eq!(
            files.normal_csv,
            dir.path().join("New_York/2020-03-29_US_New_York_normal.csv")
        );
        for path in files.all() {
            assert!(path.exists(), "{}", path.display());
        }
        assert!(files.backfill_log.is_none());
        assert!(!layout.backfill_log().exists());

        let json: Value =
            serde_json::from_str(&std::fs::read_to_string(&files.covariates_json).unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);
    }
}
