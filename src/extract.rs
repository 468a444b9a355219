//! Top-level extraction entry points.
//!
//! ```text
//! pdfdir ──▶ discover ──▶ parse places (concurrent, in order) ──▶ corpus ──▶ export
//! ```
//!
//! Opening and parsing a report is CPU-bound and lopdf is synchronous, so each
//! place runs on a blocking worker thread; up to `config.concurrency` places
//! are in flight at once. Results are collected in place order, so the
//! output does not depend on which report finishes first.

use crate::config::{ExtractionConfig, RegionSelection};
use crate::corpus::Corpus;
use crate::discover::{self, OutputLayout, ReportFile};
use crate::error::MobilityError;
use crate::export;
use crate::output::{CorpusOutput, ExtractionStats, PlaceReport, WrittenFiles};
use crate::pipeline::page::parse_place;
use crate::pipeline::source::PdfReport;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Open one report and parse the requested regions.
///
/// # Errors
/// Fails only when the file cannot be opened as a PDF. Regions that cannot
/// be parsed are listed in the returned report's `skipped` field.
pub fn extract_place(
    path: impl AsRef<Path>,
    place: &str,
    regions: RegionSelection,
) -> Result<PlaceReport, MobilityError> {
    let report = PdfReport::open(path)?;
    debug!("Parsing {place} from {}", report.path().display());
    Ok(parse_place(place, &report, regions))
}

/// Parse every report in `pdfdir` and assemble the corpus.
///
/// # Returns
/// Per-place reports, the backfilled and pivoted corpus, and run statistics.
///
/// # Errors
/// Returns `Err(MobilityError)` only for fatal errors:
/// - `pdfdir` unreadable, or no report matches the allow-list
/// - a report that fails to open (missing, unreadable, not a PDF, corrupt)
pub async fn extract_corpus(
    pdfdir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<CorpusOutput, MobilityError> {
    let start = Instant::now();
    let pdfdir = pdfdir.as_ref();
    info!("Starting extraction: {}", pdfdir.display());

    // ── Step 1: Discover places ──────────────────────────────────────────
    let reports = discover::discover_reports(pdfdir, config)?;
    let total = reports.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_corpus_start(total);
    }

    // ── Step 2: Parse places ─────────────────────────────────────────────
    let places = parse_reports(reports, config).await?;

    // ── Step 3: Assemble corpus ──────────────────────────────────────────
    let corpus = tokio::task::spawn_blocking({
        let places = places.clone();
        move || Corpus::assemble(&places)
    })
    .await
    .map_err(|e| MobilityError::Internal(format!("corpus task failed: {e}")))?;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let with_records = places.iter().filter(|p| !p.records.is_empty()).count();
    let stats = ExtractionStats {
        places: total,
        places_with_records: with_records,
        records: places.iter().map(|p| p.records.len()).sum(),
        points: places.iter().map(PlaceReport::point_count).sum(),
        skipped_regions: places.iter().map(|p| p.skipped.len()).sum(),
        backfilled: corpus.filled.len(),
        unfilled: corpus.unfilled.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} records ({} points) from {}/{} places, {} regions skipped, {}ms",
        stats.records, stats.points, with_records, total, stats.skipped_regions, stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_corpus_complete(total, with_records);
    }

    Ok(CorpusOutput {
        reports: places,
        corpus,
        stats,
    })
}

/// Extract the corpus and write the pivots and audit log under `outdir`.
///
/// A single place writes into `outdir/<place>/`; several places write into
/// `outdir` directly with an `_all` stem.
pub async fn extract_to_dir(
    pdfdir: impl AsRef<Path>,
    outdir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(CorpusOutput, WrittenFiles), MobilityError> {
    let output = extract_corpus(pdfdir, config).await?;

    let places: Vec<String> = output.reports.iter().map(|r| r.place.clone()).collect();
    let layout = OutputLayout::for_places(outdir.as_ref(), &places, config);
    debug!("Output layout: {:?}", layout);

    let files = tokio::task::spawn_blocking({
        let corpus = output.corpus.clone();
        move || export::write_corpus(&corpus, &layout)
    })
    .await
    .map_err(|e| MobilityError::Internal(format!("export task failed: {e}")))??;

    Ok((output, files))
}

/// Synchronous wrapper around [`extract_corpus`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_corpus_sync(
    pdfdir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<CorpusOutput, MobilityError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MobilityError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_corpus(pdfdir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Parse reports on blocking threads, keeping discovery order.
async fn parse_reports(
    reports: Vec<ReportFile>,
    config: &ExtractionConfig,
) -> Result<Vec<PlaceReport>, MobilityError> {
    let total = reports.len();
    let regions = config.regions;

    stream::iter(reports.into_iter().map(|report| {
        let cb = config.progress_callback.clone();
        async move {
            if let Some(ref cb) = cb {
                cb.on_place_start(&report.place, total);
            }
            let place = report.place.clone();
            let result = tokio::task::spawn_blocking(move || {
                extract_place(&report.path, &report.place, regions)
            })
            .await
            .map_err(|e| MobilityError::Internal(format!("parse task for {place} failed: {e}")))
            .and_then(|r| r);

            if let Some(ref cb) = cb {
                match &result {
                    Ok(r) => cb.on_place_complete(&place, total, r.records.len()),
                    Err(e) => cb.on_place_error(&place, total, &e.to_string()),
                }
            }
            result
        }
    }))
    .buffered(config.concurrency)
    .try_collect()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_pdfdir_is_fatal() {
        let config = ExtractionConfig::default();
        let err = extract_corpus("/definitely/not/here", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, MobilityError::InputDirUnreadable { .. }));
    }

    #[tokio::test]
    async fn non_pdf_report_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2020-03-29_US_Utah_Mobility_Report_en.pdf"),
            b"not a pdf",
        )
        .unwrap();
        let err = extract_corpus(dir.path(), &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MobilityError::NotAPdf { .. }), "got {err:?}");
    }

    #[test]
    fn report_for_another_date_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("2020-04-05_GB_GB_Mobility_Report_en.pdf"),
            b"%PDF-1.5",
        )
        .unwrap();
        let err = extract_corpus_sync(dir.path(), &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, MobilityError::FileNotFound { .. }), "got {err:?}");
    }
}
