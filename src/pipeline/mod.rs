//! Pipeline stages for turning one report into labelled series.
//!
//! Each submodule implements one step and is testable without a PDF.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ stream ──▶ labels ──▶ series ──▶ page
//! (lopdf)    (paths)    (text)     (pairing,   (regions,
//!                                   dates)      records)
//! ```
//!
//! 1. [`source`]: page text and chart XObjects in draw order, behind the
//!    [`source::ReportSource`] trait
//! 2. [`stream`]: decode `cm`/`l`/`m` operators and recover percent values
//!    relative to the chart's zero line
//! 3. [`labels`]: county blocks, category labels, headline percents and
//!    axis tick labels from the page text
//! 4. [`series`]: pair charts with labels by position and map x onto dates
//! 5. [`page`]: run the above per region and tag records with place,
//!    county and page

pub mod labels;
pub mod page;
pub mod series;
pub mod source;
pub mod stream;
