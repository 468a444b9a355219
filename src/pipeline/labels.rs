//! Label/metadata extraction from a page's plain text.
//!
//! The report text comes out of the PDF in drawing order, one text run per
//! line. A detail page looks roughly like this (two county blocks):
//!
//! ```text
//! Anchorage Municipality
//! Retail & recreation
//! -41% compared to baseline
//! Grocery & pharmacy
//! -10% compared to baseline
//! Parks                          ← label ends in a space: no data
//! Not enough data for this date
//! ...
//! Fairbanks North Star Borough
//! Retail & recreation
//! ...
//! Sun Feb 16                     ← x-axis tick labels near the page end
//! Sun Mar 8
//! Sun Mar 29
//! ```
//!
//! Categories come back in canonical order per county, which matches the order
//! the generator draws their charts in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

/// County name given to the front-page aggregate region.
pub const OVERALL: &str = "Overall";

/// Text that marks the line carrying the headline percent.
const BASELINE_PHRASE: &str = "compared to baseline";

/// Lines dropped before any parsing.
const BOILERPLATE: [&str; 2] = ["* Not enough data", "needs a significant volume of data"];

/// Only the last few text lines of a detail page hold its tick labels.
const DETAIL_TICK_WINDOW: usize = 10;

/// The six mobility categories, in the order the reports draw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    RetailRecreation,
    GroceryPharmacy,
    Parks,
    TransitStations,
    Workplace,
    Residential,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::RetailRecreation,
        Category::GroceryPharmacy,
        Category::Parks,
        Category::TransitStations,
        Category::Workplace,
        Category::Residential,
    ];

    /// Label as printed on detail pages.
    pub fn label(self) -> &'static str {
        match self {
            Category::RetailRecreation => "Retail & recreation",
            Category::GroceryPharmacy => "Grocery & pharmacy",
            Category::Parks => "Parks",
            Category::TransitStations => "Transit stations",
            Category::Workplace => "Workplace",
            Category::Residential => "Residential",
        }
    }

    /// Column name used in the exported tables, e.g. `retail/recreation`.
    pub fn column_name(self) -> String {
        self.label().replace(" & ", "/").replace(' ', "").to_lowercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two page layouts a report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageVariant {
    /// Pages 1–2: one aggregate chart per category.
    Front,
    /// Every later page but the last: two county blocks.
    Detail,
}

impl PageVariant {
    /// How `category` is labelled on this layout.
    pub fn label(self, category: Category) -> &'static str {
        match (self, category) {
            (PageVariant::Front, Category::Workplace) => "Workplaces",
            _ => category.label(),
        }
    }

    fn labels(self) -> impl Iterator<Item = (Category, &'static str)> {
        Category::ALL.into_iter().map(move |c| (c, self.label(c)))
    }

    fn opens_category(self, line: &str) -> bool {
        self.labels().any(|(_, l)| line.starts_with(l))
    }

    fn mentions_category(self, line: &str) -> bool {
        self.labels().any(|(_, l)| line.contains(l))
    }

    /// Category whose label is exactly `label`.
    fn category_named(self, label: &str) -> Option<Category> {
        self.labels().find(|(_, l)| *l == label).map(|(c, _)| c)
    }
}

/// One labelled chart slot: where it is, what it measures, what the text says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLabel {
    pub county: String,
    pub category: Category,
    /// Headline percent change printed next to the chart.
    pub headline: i32,
}

/// Everything the text layer of a region yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLabels {
    /// Labels in chart draw order.
    pub labels: Vec<RegionLabel>,
    /// Distinct raw tick-label lines, e.g. `Sun Mar 1`.
    pub tick_labels: BTreeSet<String>,
}

fn is_boilerplate(line: &str) -> bool {
    BOILERPLATE.iter().any(|b| line.contains(b))
}

/// Lines captured under one category label, keyed by the label line as-is.
#[derive(Debug, Default)]
struct Accumulator {
    entries: Vec<(String, Vec<String>)>,
}

impl Accumulator {
    fn push(&mut self, label: &str, line: &str) {
        match self.entries.iter_mut().find(|(l, _)| l == label) {
            Some((_, lines)) => lines.push(line.to_string()),
            None => self.entries.push((label.to_string(), vec![line.to_string()])),
        }
    }

    /// Headline percent per category, skipping labels flagged as lacking data.
    fn headlines(&self, variant: PageVariant) -> Vec<(Category, i32)> {
        let mut out = Vec::new();
        for (label, lines) in &self.entries {
            // The asterisk after a no-data label is drawn separately, leaving
            // a dangling space in the text run.
            if label.ends_with(char::is_whitespace) {
                trace!("Skipping '{}': not enough data", label.trim());
                continue;
            }
            let Some(category) = variant.category_named(label.trim()) else {
                continue;
            };
            let Some(line) = lines.iter().find(|l| l.contains(BASELINE_PHRASE)) else {
                continue;
            };
            match parse_headline(line) {
                Some(pct) => out.push((category, pct)),
                None => debug!("Unreadable headline for {category}: {line:?}"),
            }
        }
        out
    }
}

/// Leading percent token of a headline line, e.g. `-41% compared to baseline`.
pub fn parse_headline(line: &str) -> Option<i32> {
    line.split_whitespace()
        .next()?
        .replace('%', "")
        .parse()
        .ok()
}

static RE_FRONT_TICK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S{3}\s+\S{3}\s+\S+$").unwrap());

fn has_three_tokens(line: &str) -> bool {
    line.split_whitespace().count() == 3
}

/// Parse the text of the two front pages (concatenated) as the aggregate region.
pub fn extract_front(text: &str) -> PageLabels {
    let lines: Vec<&str> = text.lines().collect();
    let variant = PageVariant::Front;

    // Front pages carry a lot of prose, so tick labels must also look like
    // "Sun Mar 1" (three-letter weekday and month).
    let tick_labels = lines
        .iter()
        .filter(|l| has_three_tokens(l) && RE_FRONT_TICK.is_match(l.trim()))
        .map(|l| l.to_string())
        .collect();

    let mut acc = Accumulator::default();
    let mut current: Option<&str> = None;
    for &line in &lines {
        if is_boilerplate(line) {
            continue;
        }
        if variant.opens_category(line) {
            current = Some(line);
        } else if let Some(label) = current {
            acc.push(label, line);
        }
    }

    // The percent and the baseline phrase are separate text runs here.
    for (_, captured) in acc.entries.iter_mut() {
        if captured.len() >= 2 {
            let joined = format!("{} {}", captured[0], captured[1]);
            *captured = vec![joined];
        } else {
            captured.truncate(1);
        }
    }

    let headlines = acc.headlines(variant);
    let labels = Category::ALL
        .iter()
        .filter_map(|c| headlines.iter().find(|(hc, _)| hc == c))
        .map(|&(category, headline)| RegionLabel {
            county: OVERALL.to_string(),
            category,
            headline,
        })
        .collect();

    PageLabels {
        labels,
        tick_labels,
    }
}

/// Parse one detail page (two county blocks).
pub fn extract_detail(text: &str) -> PageLabels {
    let lines: Vec<&str> = text.lines().collect();
    let variant = PageVariant::Detail;

    let tail = lines.len().saturating_sub(DETAIL_TICK_WINDOW);
    let tick_labels = lines[tail..]
        .iter()
        .filter(|l| has_three_tokens(l))
        .map(|l| l.to_string())
        .collect();

    // Per county (None until the first county line), in encounter order.
    let mut blocks: Vec<(Option<String>, Accumulator)> = Vec::new();
    let mut counties: Vec<String> = Vec::new();
    let mut county: Option<String> = None;
    let mut current: Option<&str> = None;

    for &line in &lines {
        if is_boilerplate(line) {
            continue;
        }

        if variant.opens_category(line) {
            current = Some(line);
        } else if let Some(label) = current {
            let idx = match blocks.iter().position(|(c, _)| *c == county) {
                Some(i) => i,
                None => {
                    blocks.push((county.clone(), Accumulator::default()));
                    blocks.len() - 1
                }
            };
            blocks[idx].1.push(label, line);
        }

        let is_county = !variant.mentions_category(line)
            && !line.contains(BASELINE_PHRASE)
            && !line.contains("Not enough data");
        if is_county {
            if blocks.len() == 2 {
                break;
            }
            counties.push(line.to_string());
            county = Some(line.to_string());
        }
    }

    let mut labels = Vec::new();
    for name in &counties {
        let Some((_, acc)) = blocks.iter().find(|(c, _)| c.as_deref() == Some(name.as_str()))
        else {
            continue;
        };
        let headlines = acc.headlines(variant);
        for category in Category::ALL {
            if let Some(&(_, headline)) = headlines.iter().find(|(c, _)| *c == category) {
                labels.push(RegionLabel {
                    county: name.clone(),
                    category,
                    headline,
                });
            }
        }
    }

    debug!(
        "Detail page: {} counties, {} labelled charts",
        counties.len(),
        labels.len()
    );

    PageLabels {
        labels,
        tick_labels,
    }
}
