//! Page orchestration: turn a [`ReportSource`] into a [`PlaceReport`].
//!
//! A report is laid out as:
//!
//! ```text
//! page 0, 1        front pages: one aggregate chart per category
//! page 2 .. n-2    detail pages: two county blocks each
//! page n-1         closing notes, no charts
//! ```
//!
//! Each region is parsed on its own; a region that cannot be reconciled is
//! recorded as a [`RegionSkip`] and the rest of the report carries on.

use crate::config::RegionSelection;
use crate::error::RegionSkip;
use crate::output::{CategoryRecord, PlaceReport};
use crate::pipeline::labels::{self, PageLabels, PageVariant};
use crate::pipeline::series::{self, LabelledSeries};
use crate::pipeline::source::{sort_by_draw_order, ChartObject, ReportSource};
use crate::pipeline::stream::ParsedChart;
use tracing::{debug, info, warn};

/// Page tag carried by every aggregate record.
pub const FRONT_PAGE_TAG: usize = 1;

/// First page index of the county section.
pub const FIRST_DETAIL_PAGE: usize = 2;

/// Drop whitespace-only lines, keeping trailing spaces on the rest.
///
/// A label's trailing space is meaningful (it marks a category without
/// data), so lines are never trimmed here.
fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn parse_charts(objects: &[ChartObject]) -> Vec<ParsedChart> {
    objects
        .iter()
        .map(|o| {
            let chart = ParsedChart::from_stream(&o.stream);
            if !chart.usable {
                debug!(
                    "{}: unusable chart ({} subpaths, {} points)",
                    o.name,
                    chart.subpaths,
                    chart.points.len()
                );
            }
            chart
        })
        .collect()
}

fn to_records(
    place: &str,
    page: usize,
    labels: &PageLabels,
    series: Vec<LabelledSeries>,
) -> Vec<CategoryRecord> {
    let tick_labels: Vec<String> = labels.tick_labels.iter().cloned().collect();
    series
        .into_iter()
        .map(|ls| CategoryRecord {
            place: place.to_string(),
            county: ls.label.county,
            category: ls.label.category,
            page,
            change: ls.label.headline,
            changecalc: ls.series.changecalc,
            tick_labels: tick_labels.clone(),
            points: ls.series.points,
        })
        .collect()
}

/// Parse the aggregate region spread over the first two pages.
pub fn parse_front_pages<S>(source: &S, place: &str) -> Result<Vec<CategoryRecord>, RegionSkip>
where
    S: ReportSource + ?Sized,
{
    let pages = 0..source.page_count().min(2);

    let mut text = String::new();
    let mut objects = Vec::new();
    for page in pages {
        text.push_str(&clean_text(&source.page_text(page)));
        objects.extend(source.chart_objects(page));
    }
    // One chart sequence across both pages.
    sort_by_draw_order(&mut objects);

    let labels = labels::extract_front(&text);
    let charts = parse_charts(&objects);
    debug!(
        "{place} front pages: {} labels, {} chart objects",
        labels.labels.len(),
        charts.len()
    );

    let series = series::reconstruct_region(
        FRONT_PAGE_TAG,
        PageVariant::Front,
        &labels.labels,
        labels.tick_labels.iter().map(String::as_str),
        charts,
    )?;
    Ok(to_records(place, FRONT_PAGE_TAG, &labels, series))
}

/// Parse one detail page.
pub fn parse_detail_page<S>(
    source: &S,
    place: &str,
    page: usize,
) -> Result<Vec<CategoryRecord>, RegionSkip>
where
    S: ReportSource + ?Sized,
{
    let text = clean_text(&source.page_text(page));
    let labels = labels::extract_detail(&text);
    let charts = parse_charts(&source.chart_objects(page));
    debug!(
        "{place} page {page}: {} labels, {} chart objects",
        labels.labels.len(),
        charts.len()
    );

    let series = series::reconstruct_region(
        page,
        PageVariant::Detail,
        &labels.labels,
        labels.tick_labels.iter().map(String::as_str),
        charts,
    )?;
    Ok(to_records(place, page, &labels, series))
}

/// Page indices holding county charts. The final page is never one.
pub fn detail_pages(page_count: usize) -> std::ops::Range<usize> {
    FIRST_DETAIL_PAGE..page_count.saturating_sub(1).max(FIRST_DETAIL_PAGE)
}

/// Parse every requested region of one report.
///
/// Never fails: dropped regions are listed in [`PlaceReport::skipped`], and
/// a report with no records is a valid (empty) result.
pub fn parse_place<S>(place: &str, source: &S, regions: RegionSelection) -> PlaceReport
where
    S: ReportSource + ?Sized,
{
    let mut report = PlaceReport::new(place);

    let mut absorb = |result: Result<Vec<CategoryRecord>, RegionSkip>| match result {
        Ok(records) => report.records.extend(records),
        Err(skip) => {
            warn!("{place}: {skip}");
            report.skipped.push(skip);
        }
    };

    if regions.includes_aggregate() {
        absorb(parse_front_pages(source, place));
    }
    if regions.includes_detail() {
        for page in detail_pages(source.page_count()) {
            absorb(parse_detail_page(source, place, page));
        }
    }

    if !report.records.is_empty() {
        info!(
            "Parsed {} plots for {} counties in {place}",
            report.records.len(),
            report.county_count()
        );
    } else {
        info!("No plots recovered for {place}");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::labels::{Category, OVERALL};
    use crate::pipeline::source::InMemoryReport;

    /// A usable chart ending `end` percent off baseline.
    fn chart(name: &str, end: f64) -> ChartObject {
        let y = 60.0 - end * 0.6;
        ChartObject::new(name, format!("0 60 m\n0 60 l\n100 54 l\n200 {y} l\n0 60 l\n"))
    }

    fn front_text(cats: &[(&str, i32)]) -> String {
        let mut s = String::from("Alaska\nMarch 29, 2020\n");
        for (label, pct) in cats {
            s.push_str(&format!("{label}\n{pct}%\ncompared to baseline\n"));
        }
        s.push_str("Sun Feb 16\nSun Mar 8\nSun Mar 29\n");
        s
    }

    fn detail_text() -> String {
        [
            "Anchorage Municipality",
            "Retail & recreation",
            "-41% compared to baseline",
            "Parks ",
            "Not enough data for this date",
            "Residential",
            "+12% compared to baseline",
            "Bethel Census Area",
            "Retail & recreation",
            "-20% compared to baseline",
            "Sun Feb 16",
            "Sun Mar 29",
        ]
        .join("\n")
    }

    fn report() -> InMemoryReport {
        let front = front_text(&[
            ("Retail & recreation", -40),
            ("Grocery & pharmacy", -12),
            ("Parks", 5),
        ]);
        let front2 = front_text(&[
            ("Transit stations", -60),
            ("Workplaces", -35),
            ("Residential", 14),
        ]);
        InMemoryReport::new()
            .with_page(front, vec![chart("X1", -40.0), chart("X2", -12.0), chart("X3", 5.0)])
            .with_page(front2, vec![chart("X4", -60.0), chart("X5", -35.0), chart("X6", 14.0)])
            .with_page(
                detail_text(),
                vec![chart("X7", -41.0), chart("X8", 12.0), chart("X9", -20.0)],
            )
            .with_page("About this data", vec![])
    }

    #[test]
    fn detail_page_range_excludes_front_and_last_pages() {
        assert_eq!(detail_pages(10), 2..9);
        assert_eq!(detail_pages(3), 2..2);
        assert!(detail_pages(0).is_empty());
    }

    #[test]
    fn clean_text_keeps_trailing_space() {
        assert_eq!(clean_text("Parks \n\n  \nX"), "Parks \nX\n");
    }

    #[test]
    fn front_pages_merge_into_one_aggregate_region() {
        let records = parse_front_pages(&report(), "Alaska").unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.county == OVERALL && r.page == FRONT_PAGE_TAG));
        let cats: Vec<Category> = records.iter().map(|r| r.category).collect();
        assert_eq!(cats, Category::ALL.to_vec());
        assert_eq!(records[4].change, -35);
        // Front-page geometry is scaled down.
        assert!((records[0].changecalc - (-40.0 * 0.801)).abs() < 1e-6);
    }

    #[test]
    fn detail_page_tags_counties_and_page() {
        let records = parse_detail_page(&report(), "Alaska", 2).unwrap();
        let keys: Vec<(&str, Category)> = records
            .iter()
            .map(|r| (r.county.as_str(), r.category))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Anchorage Municipality", Category::RetailRecreation),
                ("Anchorage Municipality", Category::Residential),
                ("Bethel Census Area", Category::RetailRecreation),
            ]
        );
        assert!(records.iter().all(|r| r.page == 2));
        assert!((records[1].changecalc - 12.0).abs() < 1e-6);
    }

    #[test]
    fn region_selection_controls_parsed_pages() {
        let src = report();
        let agg = parse_place("Alaska", &src, RegionSelection::AggregateOnly);
        assert!(agg.records.iter().all(|r| r.county == OVERALL));

        let detail = parse_place("Alaska", &src, RegionSelection::DetailOnly);
        assert!(detail.records.iter().all(|r| r.county != OVERALL));

        let both = parse_place("Alaska", &src, RegionSelection::Both);
        assert_eq!(both.records.len(), agg.records.len() + detail.records.len());
    }

    #[test]
    fn mismatched_detail_page_is_skipped_not_fatal() {
        let src = InMemoryReport::new()
            .with_page("", vec![])
            .with_page("", vec![])
            .with_page(detail_text(), vec![chart("X1", -41.0)])
            .with_page("", vec![]);
        let report = parse_place("Alaska", &src, RegionSelection::DetailOnly);
        assert!(report.records.is_empty());
        assert_eq!(
            report.skipped,
            vec![RegionSkip::CountMismatch {
                page: 2,
                labels: 3,
                charts: 1
            }]
        );
    }

    #[test]
    fn empty_report_gives_empty_place() {
        let report = parse_place("Alaska", &InMemoryReport::new(), RegionSelection::Both);
        assert!(report.records.is_empty());
        assert!(report.skipped.is_empty());
    }
}
