//! Series reconstruction: pair charts with labels and read dates off the x-axis.
//!
//! There is no identifier tying a chart XObject to its label in the PDF. The
//! generator emits both in the same order, so position is the only key. When
//! the counts disagree the whole region is dropped: a shifted pairing would
//! silently attach one category's curve to another.

use crate::error::RegionSkip;
use crate::pipeline::labels::{PageVariant, RegionLabel};
use crate::pipeline::stream::ParsedChart;
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Year assumed for every tick label.
///
/// The labels carry no year. The report date given on the command line is
/// not consulted here, so reports from another year would be mis-dated; kept
/// as-is until a non-2020 report needs parsing.
pub const REPORT_YEAR: i32 = 2020;

/// Width of every chart's x-axis in chart units. The first tick date sits at
/// x = 0 and the last at x = 200, one evenly spaced step per day.
pub const AXIS_WIDTH: f64 = 200.0;

/// Front-page charts are drawn shorter than detail charts. Scaling their
/// values by this factor makes the recomputed end value agree with the
/// printed headline. Calibrated against published reports; do not change.
pub const FRONT_PAGE_SCALE: f64 = 0.801;

/// Headline and recomputed values further apart than this get a debug note.
const CHANGECALC_TOLERANCE: f64 = 5.0;

static RE_TICK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\S+\s+)?(?P<month>[A-Za-z]{3,9})\.?\s+(?P<day>\d{1,2}),?$").unwrap()
});

/// Read a tick label (`Sun Mar 1`, or just `Mar 1`) as a date in [`REPORT_YEAR`].
pub fn parse_tick_label(label: &str) -> Option<NaiveDate> {
    let caps = RE_TICK.captures(label.trim())?;
    let text = format!("{} {}, {}", &caps["month"], &caps["day"], REPORT_YEAR);
    NaiveDate::parse_from_str(&text, "%b %d, %Y").ok()
}

/// Lookup from x position to calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateAxis {
    anchors: Vec<(f64, NaiveDate)>,
}

impl DateAxis {
    /// Build the axis from the earliest and latest readable tick labels.
    /// Returns `None` when no label reads as a date.
    pub fn from_tick_labels<'a, I>(labels: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let dates: Vec<NaiveDate> = labels
            .into_iter()
            .filter_map(|l| {
                let d = parse_tick_label(l);
                if d.is_none() {
                    debug!("Ignoring tick label {l:?}");
                }
                d
            })
            .collect();
        let first = *dates.iter().min()?;
        let last = *dates.iter().max()?;
        Self::spanning(first, last)
    }

    /// One anchor per day from `first` to `last` inclusive across the axis.
    /// `None` when `last` is before `first`.
    pub fn spanning(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        if last < first {
            return None;
        }
        let days: Vec<NaiveDate> = (0..)
            .map_while(|i| first.checked_add_days(Days::new(i)).filter(|d| *d <= last))
            .collect();
        let steps = days.len().saturating_sub(1);
        let anchors = days
            .into_iter()
            .enumerate()
            .map(|(i, d)| {
                let x = if steps == 0 {
                    0.0
                } else {
                    AXIS_WIDTH * i as f64 / steps as f64
                };
                (x, d)
            })
            .collect();
        Some(Self { anchors })
    }

    pub fn first(&self) -> NaiveDate {
        self.anchors[0].1
    }

    pub fn last(&self) -> NaiveDate {
        self.anchors[self.anchors.len() - 1].1
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Date of the anchor nearest to `x`; the earlier anchor wins a tie.
    pub fn date_at(&self, x: f64) -> NaiveDate {
        let mut best = self.anchors[0];
        for &anchor in &self.anchors[1..] {
            if (anchor.0 - x).abs() < (best.0 - x).abs() {
                best = anchor;
            }
        }
        best.1
    }
}

/// One recovered observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// Percent change from baseline, rounded to 3 decimals.
    pub value: f64,
}

/// A chart's points mapped onto dates, plus the value recomputed at its end.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub points: Vec<SeriesPoint>,
    /// Value at the right-most x; should track the printed headline.
    pub changecalc: f64,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Map a usable chart onto `axis`, scaling every value by `scale`.
pub fn reconstruct(chart: &ParsedChart, axis: &DateAxis, scale: f64) -> Series {
    let mut pts = chart.points.clone();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let changecalc = end_value(&pts) * scale;
    let points = pts
        .iter()
        .map(|&(x, y)| SeriesPoint {
            date: axis.date_at(x),
            value: round3(y * scale),
        })
        .collect();

    Series { points, changecalc }
}

/// y at the maximum x; among several, the one furthest from zero.
fn end_value(sorted: &[(f64, f64)]) -> f64 {
    let Some(&(max_x, _)) = sorted.last() else {
        return 0.0;
    };
    let mut best: Option<f64> = None;
    for &(_, y) in sorted.iter().filter(|(x, _)| *x == max_x) {
        if best.map_or(true, |b| y.abs() > b.abs()) {
            best = Some(y);
        }
    }
    best.unwrap_or(0.0)
}

/// How charts are counted against labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    /// Unusable charts are discarded before counting (front pages, where
    /// decorative paths share the pages with the charts).
    UsableOnly,
    /// Every chart object keeps its slot; unusable ones are skipped after
    /// pairing (detail pages emit exactly one object per labelled category).
    KeepSlots,
}

impl Pairing {
    pub fn for_variant(variant: PageVariant) -> Self {
        match variant {
            PageVariant::Front => Pairing::UsableOnly,
            PageVariant::Detail => Pairing::KeepSlots,
        }
    }
}

/// Pair labels with charts by position.
pub fn pair_charts(
    page: usize,
    labels: &[RegionLabel],
    charts: Vec<ParsedChart>,
    pairing: Pairing,
) -> Result<Vec<(RegionLabel, ParsedChart)>, RegionSkip> {
    let charts: Vec<ParsedChart> = match pairing {
        Pairing::UsableOnly => charts.into_iter().filter(|c| c.usable).collect(),
        Pairing::KeepSlots => charts,
    };

    if labels.len() != charts.len() {
        return Err(RegionSkip::CountMismatch {
            page,
            labels: labels.len(),
            charts: charts.len(),
        });
    }

    Ok(labels
        .iter()
        .cloned()
        .zip(charts)
        .filter(|(_, chart)| chart.usable)
        .collect())
}

/// A label with its reconstructed series.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledSeries {
    pub label: RegionLabel,
    pub series: Series,
}

/// Reconstruct every chart in one region.
pub fn reconstruct_region<'a, I>(
    page: usize,
    variant: PageVariant,
    labels: &[RegionLabel],
    tick_labels: I,
    charts: Vec<ParsedChart>,
) -> Result<Vec<LabelledSeries>, RegionSkip>
where
    I: IntoIterator<Item = &'a str>,
{
    let pairs = pair_charts(page, labels, charts, Pairing::for_variant(variant))?;
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let axis = DateAxis::from_tick_labels(tick_labels).ok_or(RegionSkip::NoTickDates { page })?;
    let scale = match variant {
        PageVariant::Front => FRONT_PAGE_SCALE,
        PageVariant::Detail => 1.0,
    };

    let out: Vec<LabelledSeries> = pairs
        .into_iter()
        .map(|(label, chart)| {
            let series = reconstruct(&chart, &axis, scale);
            let gap = (series.changecalc - f64::from(label.headline)).abs();
            if gap > CHANGECALC_TOLERANCE {
                debug!(
                    "Page {page}: {} / {} headline {}% but chart ends at {:.1}%",
                    label.county, label.category, label.headline, series.changecalc
                );
            }
            LabelledSeries { label, series }
        })
        .collect();

    if out.iter().all(|s| s.series.points.is_empty()) {
        warn!("Page {page}: every paired chart was empty");
    }

    Ok(out)
}
