//! Path-stream interpreter: turn one chart's drawing instructions into points.
//!
//! Each chart in a mobility report is a form XObject whose content stream is
//! a single stroked polyline. The generator writes one operator per line:
//!
//! ```text
//! q
//! 1 0 0 -1 36 410 cm      ← placement transform
//! 0 12.4 m                ← start of the (only) subpath
//! 0.9 12.1 l
//! ...
//! 200 9.8 l
//! 0 60 l                  ← terminal point on the zero line, x = 0
//! S
//! ```
//!
//! Only `cm`, `l` and `m` matter; everything else (colour, width, stroke) is
//! skipped. The terminal `l` back to x = 0 sits on the chart's 0 % line, which
//! is how the baseline is recovered without reading any axis.

use tracing::{debug, trace};

/// Chart units per 100 percentage points: the plot is drawn 60 units tall
/// for a 100 % swing.
pub const PERCENT_PER_UNIT: f64 = 100.0 / 60.0;

/// x-coordinate of the generator's terminal baseline anchor.
pub const BASELINE_ANCHOR_X: f64 = 0.0;

/// One drawing operation, in stream order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    /// `a b c d e f cm`: replaces the active transform.
    Transform([f64; 6]),
    /// `x y l`
    LineTo(f64, f64),
    /// `x y m`: opens a new subpath; its coordinates are not needed.
    MoveTo,
}

/// Decode the operators we care about, preserving order.
///
/// Lines whose numbers do not parse are skipped; a chart with a damaged
/// line will usually fail the usability checks anyway.
pub fn decode_ops(stream: &[u8]) -> Vec<DrawOp> {
    let text = String::from_utf8_lossy(stream);
    let mut ops = Vec::new();

    for line in text.split(['\n', '\r']).map(str::trim_end) {
        if let Some(args) = line.strip_suffix(" cm") {
            match parse_numbers::<6>(args) {
                Some(m) => ops.push(DrawOp::Transform(m)),
                None => debug!("Ignoring malformed transform: {line:?}"),
            }
        } else if let Some(args) = line.strip_suffix(" l") {
            match parse_leading::<2>(args) {
                Some([x, y]) => ops.push(DrawOp::LineTo(x, y)),
                None => debug!("Ignoring malformed line-to: {line:?}"),
            }
        } else if line.ends_with(" m") {
            ops.push(DrawOp::MoveTo);
        }
    }

    ops
}

/// Exactly `N` whitespace-separated numbers.
fn parse_numbers<const N: usize>(s: &str) -> Option<[f64; N]> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    if tokens.len() != N {
        return None;
    }
    parse_leading::<N>(s)
}

/// The first `N` whitespace-separated numbers.
fn parse_leading<const N: usize>(s: &str) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    let mut tokens = s.split_whitespace();
    for slot in out.iter_mut() {
        *slot = tokens.next()?.parse().ok()?;
    }
    Some(out)
}

/// Apply a PDF `cm` matrix `[a b c d e f]` to a point.
pub fn apply_transform(m: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    let [a, b, c, d, e, f] = *m;
    (a * x + c * y + e, b * x + d * y + f)
}

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Points recovered from one stream before any chart interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathTrace {
    /// Line-to coordinates exactly as written.
    pub raw: Vec<(f64, f64)>,
    /// The same points through the transform active when each was drawn.
    pub transformed: Vec<(f64, f64)>,
    /// Number of `m` operators seen.
    pub subpaths: usize,
}

/// Run the operations through a minimal graphics state.
pub fn trace_path(ops: &[DrawOp]) -> PathTrace {
    let mut ctm = IDENTITY;
    let mut trace = PathTrace::default();

    for op in ops {
        match *op {
            DrawOp::Transform(m) => ctm = m,
            DrawOp::LineTo(x, y) => {
                trace.raw.push((x, y));
                trace.transformed.push(apply_transform(&ctm, x, y));
            }
            DrawOp::MoveTo => trace.subpaths += 1,
        }
    }

    trace
}

/// A chart stream interpreted as a line series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedChart {
    /// `(x, percent)` in chart units: x is the raw 0–200 axis position, the
    /// value is the distance above the zero line converted to percent.
    /// Points that land exactly on the zero line are removed.
    pub points: Vec<(f64, f64)>,
    /// Every line-to point in page space, for inspection.
    pub page_points: Vec<(f64, f64)>,
    pub subpaths: usize,
    pub usable: bool,
}

impl ParsedChart {
    /// Decode and interpret one raw content stream.
    pub fn from_stream(stream: &[u8]) -> Self {
        Self::from_trace(trace_path(&decode_ops(stream)))
    }

    pub fn from_trace(trace: PathTrace) -> Self {
        let PathTrace {
            raw,
            transformed,
            subpaths,
        } = trace;

        let Some(&(base_x, base_y)) = raw.last() else {
            trace!("Empty chart stream");
            return Self {
                subpaths,
                ..Self::default()
            };
        };

        if base_x != BASELINE_ANCHOR_X {
            trace!("Last point x={base_x} is not a baseline anchor; not a line chart");
            return Self {
                points: raw,
                page_points: transformed,
                subpaths,
                usable: false,
            };
        }

        // Raw y grows downward inside the form, so the baseline minus y is
        // the height above the zero line.
        let points: Vec<(f64, f64)> = raw
            .iter()
            .map(|&(x, y)| (x, (base_y - y) * PERCENT_PER_UNIT))
            .filter(|&(_, v)| v != 0.0)
            .collect();

        let usable = subpaths == 1 && !points.is_empty();
        Self {
            points,
            page_points: transformed,
            subpaths,
            usable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = "q\n1 0 0 -1 36 410 cm\n0 30 m\n0 30 l\n100 24 l\n200 36 l\n0 30 l\nS\nQ";

    #[test]
    fn decodes_only_path_operators_in_order() {
        let ops = decode_ops(b"q\n1 0 0 1 5 6 cm\n0 0 m\n10 20 l\n0.5 w\nS\n");
        assert_eq!(
            ops,
            vec![
                DrawOp::Transform([1.0, 0.0, 0.0, 1.0, 5.0, 6.0]),
                DrawOp::MoveTo,
                DrawOp::LineTo(10.0, 20.0),
            ]
        );
    }

    #[test]
    fn crlf_and_malformed_lines_are_tolerated() {
        let ops = decode_ops(b"1 0 0 1 0 0 cm\r\nabc def l\r\n3 4 l\r\n1 2 cm\r\n");
        assert_eq!(
            ops,
            vec![
                DrawOp::Transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
                DrawOp::LineTo(3.0, 4.0),
            ]
        );
    }

    #[test]
    fn line_to_uses_active_transform() {
        let trace = trace_path(&decode_ops(b"2 0 0 -1 10 100 cm\n5 5 l\n1 0 0 1 0 0 cm\n5 5 l"));
        assert_eq!(trace.raw, vec![(5.0, 5.0), (5.0, 5.0)]);
        assert_eq!(trace.transformed, vec![(20.0, 95.0), (5.0, 5.0)]);
    }

    #[test]
    fn line_to_before_any_transform_uses_identity() {
        let trace = trace_path(&[DrawOp::LineTo(3.0, 4.0)]);
        assert_eq!(trace.transformed, vec![(3.0, 4.0)]);
    }

    #[test]
    fn baseline_anchor_gives_percent_values() {
        let chart = ParsedChart::from_stream(CHART.as_bytes());
        assert!(chart.usable);
        assert_eq!(chart.subpaths, 1);
        // (0,30) and the anchor sit on the zero line and are dropped.
        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.points[0].0, 100.0);
        assert!((chart.points[0].1 - 10.0).abs() < 1e-9);
        assert!((chart.points[1].1 + 10.0).abs() < 1e-9);
        assert_eq!(chart.page_points.len(), 4);
    }

    #[test]
    fn nonzero_terminal_x_is_unusable() {
        let stream = CHART.replace("0 30 l\nS", "1 30 l\nS");
        let chart = ParsedChart::from_stream(stream.as_bytes());
        assert!(!chart.usable);
    }

    #[test]
    fn second_subpath_is_unusable() {
        let stream = CHART.replace("100 24 l", "100 24 l\n100 24 m");
        let chart = ParsedChart::from_stream(stream.as_bytes());
        assert_eq!(chart.subpaths, 2);
        assert!(!chart.usable);
    }

    #[test]
    fn empty_stream_soft_fails() {
        let chart = ParsedChart::from_stream(b"");
        assert!(!chart.usable);
        assert!(chart.points.is_empty());
        assert_eq!(chart.subpaths, 0);
    }

    #[test]
    fn flat_chart_on_zero_line_has_no_points() {
        let chart = ParsedChart::from_stream(b"0 10 m\n0 10 l\n200 10 l\n0 10 l");
        assert!(chart.points.is_empty());
        assert!(!chart.usable);
    }

    #[test]
    fn path_without_move_to_is_unusable() {
        // Anchored at x = 0, but with no opening `m` there is no subpath, so
        // this never becomes a series. A flat line needs the `m` first.
        let stream = b"1 0 0 1 0 0 cm\n10 50 l\n190 50 l\n0 0 l";
        let chart = ParsedChart::from_stream(stream);
        assert_eq!(chart.subpaths, 0);
        assert!(!chart.usable);
        assert_eq!(chart.points.len(), 2);
        assert!((chart.points[0].1 + 50.0 * PERCENT_PER_UNIT).abs() < 1e-9);

        let opened = ParsedChart::from_stream(b"0 0 m\n10 50 l\n190 50 l\n0 0 l");
        assert_eq!(opened.subpaths, 1);
        assert!(opened.usable);
    }
}
