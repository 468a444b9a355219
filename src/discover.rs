//! Report file naming, place discovery and output naming.
//!
//! Reports are named by the publisher as:
//!
//! ```text
//! 2020-03-29_US_New_York_Mobility_Report_en.pdf   (US states)
//! 2020-03-29_GB_GB_Mobility_Report_en.pdf         (everything else)
//! ```
//!
//! The place code is the third `_`-separated field of the part before
//! `_Mobility`; it may itself contain underscores.

use crate::config::ExtractionConfig;
use crate::error::MobilityError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// US states, as they appear in report file names.
pub const US_STATES: [&str; 50] = [
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New_Hampshire",
    "New_Jersey",
    "New_Mexico",
    "New_York",
    "North_Carolina",
    "North_Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode_Island",
    "South_Carolina",
    "South_Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West_Virginia",
    "Wisconsin",
    "Wyoming",
];

const NAME_MARKER: &str = "_Mobility";
const NAME_SUFFIX: &str = "_Mobility_Report_en.pdf";

pub fn is_us_state(place: &str) -> bool {
    US_STATES.contains(&place)
}

/// The two name fields that follow the date: `US_<state>` or `<code>_<code>`.
fn name_fields(place: &str) -> (&str, &str) {
    if is_us_state(place) {
        ("US", place)
    } else {
        (place, place)
    }
}

/// File name of the report for `place` published on `date`.
pub fn report_file_name(date: &str, place: &str) -> String {
    let (a, b) = name_fields(place);
    format!("{date}_{a}_{b}{NAME_SUFFIX}")
}

/// Place code encoded in a report file name, if it follows the convention.
pub fn place_from_file_name(file_name: &str) -> Option<&str> {
    let (stem, _) = file_name.split_once(NAME_MARKER)?;
    let place = stem.splitn(3, '_').nth(2)?;
    (!place.is_empty()).then_some(place)
}

/// A report found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub place: String,
    pub path: PathBuf,
}

/// Find the places with reports in `dir`, filtered by the config's allow-list.
///
/// Places are sorted and deduplicated. Each place resolves to the report
/// for `config.report_date`; whether that file opens is checked later.
pub fn discover_reports(
    dir: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<ReportFile>, MobilityError> {
    let entries = std::fs::read_dir(dir).map_err(|e| MobilityError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut places = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| MobilityError::InputDirUnreadable {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        let name = entry.file_name();
        let Some(place) = name.to_str().and_then(place_from_file_name) else {
            debug!("Ignoring {}: not a report file name", path.display());
            continue;
        };
        if config.wants_place(place) {
            places.insert(place.to_string());
        }
    }

    if places.is_empty() {
        let filter = if config.place_codes.is_empty() {
            String::new()
        } else {
            format!(" matching [{}]", config.place_codes.join(", "))
        };
        return Err(MobilityError::NoReports {
            dir: dir.to_path_buf(),
            filter,
        });
    }

    info!("Found {} places in {}", places.len(), dir.display());
    Ok(places
        .into_iter()
        .map(|place| ReportFile {
            path: dir.join(report_file_name(&config.report_date, &place)),
            place,
        })
        .collect())
}

/// Where a run writes its files, and the stem they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub stem: String,
}

/// Backfill audit log file name.
pub const BACKFILL_LOG: &str = "counties_categories_filled.txt";

impl OutputLayout {
    /// A single place gets its own sub-directory and a place-specific stem;
    /// several places share `outdir` and the `{date}_all` stem.
    pub fn for_places(outdir: &Path, places: &[String], config: &ExtractionConfig) -> Self {
        let date = &config.report_date;
        let (dir, stem) = match places {
            [place] => {
                let (a, b) = name_fields(place);
                (outdir.join(place), format!("{date}_{a}_{b}"))
            }
            _ => (outdir.to_path_buf(), format!("{date}_all")),
        };
        Self {
            dir,
            stem: stem + config.regions.file_suffix(),
        }
    }

    pub fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", self.stem))
    }

    pub fn backfill_log(&self) -> PathBuf {
        self.dir.join(BACKFILL_LOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(codes: &[&str]) -> ExtractionConfig {
        ExtractionConfig::builder()
            .place_codes(codes.iter().copied())
            .build()
            .unwrap()
    }

    #[test]
    fn report_names_follow_publisher_convention() {
        assert_eq!(
            report_file_name("2020-03-29", "New_York"),
            "2020-03-29_US_New_York_Mobility_Report_en.pdf"
        );
        assert_eq!(
            report_file_name("2020-03-29", "GB"),
            "2020-03-29_GB_GB_Mobility_Report_en.pdf"
        );
    }

    #[test]
    fn place_is_third_field_before_marker() {
        assert_eq!(
            place_from_file_name("2020-03-29_US_New_York_Mobility_Report_en.pdf"),
            Some("New_York")
        );
        assert_eq!(
            place_from_file_name("2020-03-29_GB_GB_Mobility_Report_en.pdf"),
            Some("GB")
        );
        assert_eq!(place_from_file_name("notes.pdf"), None);
        assert_eq!(place_from_file_name("2020_US_Mobility.pdf"), None);
    }

    #[test]
    fn all_states_round_trip_through_file_names() {
        for state in US_STATES {
            let name = report_file_name("2020-03-29", state);
            assert_eq!(place_from_file_name(&name), Some(state));
        }
    }

    #[test]
    fn discovery_sorts_filters_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2020-03-29_US_Texas_Mobility_Report_en.pdf",
            "2020-03-29_US_Alaska_Mobility_Report_en.pdf",
            "2020-03-29_GB_GB_Mobility_Report_en.pdf",
            "readme.txt",
        ] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }

        let all = discover_reports(dir.path(), &config(&[])).unwrap();
        let places: Vec<&str> = all.iter().map(|r| r.place.as_str()).collect();
        assert_eq!(places, vec!["Alaska", "GB", "Texas"]);
        assert_eq!(
            all[0].path,
            dir.path().join("2020-03-29_US_Alaska_Mobility_Report_en.pdf")
        );

        let some = discover_reports(dir.path(), &config(&["Texas", "Peru"])).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].place, "Texas");
    }

    #[test]
    fn discovery_errors_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_reports(dir.path(), &config(&["Peru"])).unwrap_err();
        assert!(matches!(err, MobilityError::NoReports { .. }));
        assert!(err.to_string().contains("Peru"));

        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_reports(&missing, &config(&[])),
            Err(MobilityError::InputDirUnreadable { .. })
        ));
    }

    #[test]
    fn output_layout_for_one_and_many_places() {
        let out = Path::new("/out");
        let cfg = config(&[]);

        let state = OutputLayout::for_places(out, &["New_York".into()], &cfg);
        assert_eq!(state.dir, PathBuf::from("/out/New_York"));
        assert_eq!(state.stem, "2020-03-29_US_New_York");

        let country = OutputLayout::for_places(out, &["GB".into()], &cfg);
        assert_eq!(country.stem, "2020-03-29_GB_GB");

        let many = OutputLayout::for_places(out, &["GB".into(), "Utah".into()], &cfg);
        assert_eq!(many.dir, PathBuf::from("/out"));
        assert_eq!(many.file("_normal.csv"), PathBuf::from("/out/2020-03-29_all_normal.csv"));

        let agg = ExtractionConfig::builder().aggregate_only(true).build().unwrap();
        let layout = OutputLayout::for_places(out, &["GB".into()], &agg);
        assert_eq!(layout.stem, "2020-03-29_GB_GB_aggregate_only");
        assert_eq!(layout.backfill_log(), PathBuf::from("/out/GB/counties_categories_filled.txt"));
    }
}
