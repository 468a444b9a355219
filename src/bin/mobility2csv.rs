//! CLI binary for mobility-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints a run summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mobility_extract::{
    extract_to_dir, ExtractionConfig, ExtractionProgressCallback, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per report.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_corpus_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning report directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} reports  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, place: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(place))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_corpus_start(&self, total_places: usize) {
        self.activate_bar(total_places);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_places} reports…"))
        ));
    }

    fn on_place_start(&self, place: &str, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(place.to_string(), Instant::now());
        }
        self.bar.set_message(place.to_string());
    }

    fn on_place_complete(&self, place: &str, _total: usize, records: usize) {
        let secs = self.elapsed_secs(place);
        let mark = if records > 0 { green("✓") } else { cyan("∅") };
        self.bar.println(format!(
            "  {mark} {place:<24}  {:<12}  {}",
            dim(&format!("{records:>4} charts")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_place_error(&self, place: &str, _total: usize, error: &str) {
        let secs = self.elapsed_secs(place);
        // Keep error lines to one terminal row.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {place:<24}  {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_corpus_complete(&self, total_places: usize, with_records: usize) {
        self.bar.finish_and_clear();
        let empty = total_places.saturating_sub(with_records);
        if empty == 0 {
            eprintln!(
                "{} {} reports parsed",
                green("✔"),
                bold(&with_records.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} reports produced charts  ({} empty)",
                cyan("⚠"),
                bold(&with_records.to_string()),
                total_places,
                empty,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every report in a directory
  mobility2csv --pdfdir reports/ --outdir output/

  # A single state (written to output/New_York/)
  mobility2csv --pdfdir reports/ --outdir output/ --place-codes New_York

  # Several places, state-level aggregates only
  mobility2csv --pdfdir reports/ --outdir output/ --place-codes Alaska GB --aggregate-only

  # Reports published on another date
  mobility2csv --pdfdir reports/ --outdir output/ --date 2020-04-05

INPUT FILE NAMES:
  {date}_US_{State}_Mobility_Report_en.pdf     US states (e.g. New_York)
  {date}_{CODE}_{CODE}_Mobility_Report_en.pdf  everything else (e.g. GB)

OUTPUT FILES:
  {stem}_normal.json / .csv      (state, county, category) × date
  {stem}_covariates.json / .csv  (state, county, date) × category
  counties_categories_filled.txt one "state county category" line per backfill

  stem is {date}_US_{State} or {date}_{CODE}_{CODE} for one place, {date}_all
  otherwise, with _aggregate_only / _no_aggregate appended when set.

ENVIRONMENT VARIABLES:
  RUST_LOG                Override the log filter (e.g. mobility_extract=debug)
"#;

/// Extract Community Mobility time series from report PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "mobility2csv",
    version,
    about = "Extract Community Mobility time series from report PDFs into CSV and JSON",
    long_about = "Recover the daily values behind the line charts in Community Mobility \
report PDFs, fill counties missing a category from the state aggregate, and write the \
result as two pivot tables in CSV and JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory the downloaded report PDFs live in.
    #[arg(long, env = "MOBILITY_PDFDIR")]
    pdfdir: PathBuf,

    /// Directory to write the tables to.
    #[arg(long, env = "MOBILITY_OUTDIR")]
    outdir: PathBuf,

    /// Only output the aggregate (front-page) charts.
    #[arg(long, env = "MOBILITY_AGGREGATE_ONLY", conflicts_with = "no_aggregate")]
    aggregate_only: bool,

    /// Don't add aggregate-level data.
    #[arg(long, env = "MOBILITY_NO_AGGREGATE")]
    no_aggregate: bool,

    /// Place codes to parse (as in the file names). All places when omitted.
    #[arg(long, num_args = 1.., value_name = "CODE")]
    place_codes: Vec<String>,

    /// Publication date of the reports (YYYY-MM-DD).
    #[arg(long, env = "MOBILITY_DATE", default_value = mobility_extract::config::DEFAULT_REPORT_DATE)]
    date: String,

    /// Number of reports parsed at once.
    #[arg(short, long, env = "MOBILITY_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Disable progress bar.
    #[arg(long, env = "MOBILITY_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MOBILITY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MOBILITY_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let (output, files) = extract_to_dir(&cli.pdfdir, &cli.outdir, &config)
        .await
        .context("Extraction failed")?;

    if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {} charts ({} daily values) from {}/{} places  {}ms",
            if stats.skipped_regions == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.records,
            stats.points,
            stats.places_with_records,
            stats.places,
            stats.duration_ms,
        );
        if stats.skipped_regions > 0 {
            eprintln!(
                "   {} regions skipped (label/chart mismatch or unreadable axis)",
                dim(&stats.skipped_regions.to_string())
            );
        }
        if stats.backfilled > 0 || stats.unfilled > 0 {
            eprintln!(
                "   {} combinations backfilled from state aggregates, {} left empty",
                dim(&stats.backfilled.to_string()),
                dim(&stats.unfilled.to_string()),
            );
        }
        for path in files.all() {
            eprintln!("   → {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .aggregate_only(cli.aggregate_only)
        .no_aggregate(cli.no_aggregate)
        .place_codes(cli.place_codes.iter().cloned())
        .report_date(cli.date.clone())
        .concurrency(cli.concurrency);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
