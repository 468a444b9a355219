//! Document source: the seam between the chart pipeline and the PDF library.
//!
//! The pipeline needs three things from a report: the plain text of a page,
//! the chart objects drawn on that page in their native index order, and the
//! raw drawing stream of each chart. [`ReportSource`] captures exactly that,
//! so the pipeline can be driven by [`PdfReport`] (lopdf) in production and
//! by [`InMemoryReport`] in tests or by callers with their own PDF backend.
//!
//! ## Draw order
//!
//! The report generator names its form XObjects `X1`, `X2`, … in the order it
//! draws them, and the text layer follows the same order. The numeric suffix
//! is therefore the only link between a chart and its label; objects are
//! sorted by it and nothing else.

use crate::error::MobilityError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One embedded chart object with its decoded drawing stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartObject {
    /// Resource name, e.g. `X12`.
    pub name: String,
    /// Draw-order index parsed from the name (`X12` → 12).
    pub index: Option<u32>,
    /// Decompressed content stream.
    pub stream: Vec<u8>,
}

impl ChartObject {
    pub fn new(name: impl Into<String>, stream: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let index = draw_index(&name);
        Self {
            name,
            index,
            stream: stream.into(),
        }
    }
}

/// Numeric part of an XObject resource name.
pub fn draw_index(name: &str) -> Option<u32> {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Sort chart objects by draw index. Unnumbered objects go last, in the
/// order they were found.
pub fn sort_by_draw_order(objects: &mut [ChartObject]) {
    objects.sort_by_key(|o| o.index.unwrap_or(u32::MAX));
}

/// Read access to one mobility report.
///
/// Page indices are 0-based. Implementations soft-fail: a page whose text or
/// objects cannot be read yields an empty result rather than an error.
pub trait ReportSource {
    fn page_count(&self) -> usize;

    /// Plain text of a page, one text run per line.
    fn page_text(&self, page: usize) -> String;

    /// Chart objects on a page, sorted by draw index.
    fn chart_objects(&self, page: usize) -> Vec<ChartObject>;
}

// ── lopdf implementation ─────────────────────────────────────────────────

/// A report PDF loaded with lopdf.
pub struct PdfReport {
    path: PathBuf,
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfReport {
    /// Open a report, validating existence, permissions and the PDF magic bytes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MobilityError> {
        let path = path.as_ref().to_path_buf();
        check_local(&path)?;

        let doc = Document::load(&path).map_err(|e| MobilityError::CorruptPdf {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        info!("Opened {} ({} pages)", path.display(), pages.len());

        Ok(Self { path, doc, pages })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Resources of a page, following `Parent` links for inherited ones.
    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        const MAX_DEPTH: usize = 16;
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_DEPTH {
            if let Ok(res) = node.get(b"Resources") {
                return self.resolve(res)?.as_dict().ok();
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn decode_form(&self, page: usize, name: &str, obj: &Object) -> Option<ChartObject> {
        let stream = self.resolve(obj)?.as_stream().ok()?;
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|s| s == b"Form")
            .unwrap_or(true);
        if !is_form {
            return None;
        }

        let content = if stream.dict.has(b"Filter") {
            match stream.decompressed_content() {
                Ok(c) => c,
                Err(e) => {
                    warn!("Page {}: cannot decompress {name}: {e}", page + 1);
                    Vec::new()
                }
            }
        } else {
            stream.content.clone()
        };
        Some(ChartObject::new(name, content))
    }
}

impl ReportSource for PdfReport {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> String {
        let page_no = page as u32 + 1;
        match self.doc.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Page {page_no}: text extraction failed: {e}");
                String::new()
            }
        }
    }

    fn chart_objects(&self, page: usize) -> Vec<ChartObject> {
        let Some(&page_id) = self.pages.get(page) else {
            return Vec::new();
        };
        let Some(xobjects) = self
            .page_resources(page_id)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| self.resolve(x))
            .and_then(|x| x.as_dict().ok())
        else {
            debug!("Page {}: no XObject resources", page + 1);
            return Vec::new();
        };

        let mut objects: Vec<ChartObject> = xobjects
            .iter()
            .filter_map(|(name, obj)| {
                let name = String::from_utf8_lossy(name);
                self.decode_form(page, &name, obj)
            })
            .collect();
        sort_by_draw_order(&mut objects);
        objects
    }
}

/// Validate a local report path before handing it to lopdf.
fn check_local(path: &Path) -> Result<(), MobilityError> {
    if !path.exists() {
        return Err(MobilityError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(MobilityError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(MobilityError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(MobilityError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

// ── In-memory implementation ─────────────────────────────────────────────

/// A report assembled from already-extracted page text and chart streams.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReport {
    pages: Vec<(String, Vec<ChartObject>)>,
}

impl InMemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page. Charts are sorted by draw index as a PDF source would.
    pub fn with_page(mut self, text: impl Into<String>, mut charts: Vec<ChartObject>) -> Self {
        sort_by_draw_order(&mut charts);
        self.pages.push((text.into(), charts));
        self
    }
}

impl ReportSource for InMemoryReport {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> String {
        self.pages
            .get(page)
            .map(|(t, _)| t.clone())
            .unwrap_or_default()
    }

    fn chart_objects(&self, page: usize) -> Vec<ChartObject> {
        self.pages
            .get(page)
            .map(|(_, c)| c.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    #[test]
    fn draw_index_parses_numeric_suffix() {
        assert_eq!(draw_index("X12"), Some(12));
        assert_eq!(draw_index("Fm3"), Some(3));
        assert_eq!(draw_index("Im"), None);
    }

    #[test]
    fn sorting_uses_native_index_not_name() {
        let mut objs = vec![
            ChartObject::new("X10", "a"),
            ChartObject::new("X9", "b"),
            ChartObject::new("Logo", "c"),
            ChartObject::new("X2", "d"),
        ];
        sort_by_draw_order(&mut objs);
        let names: Vec<&str> = objs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["X2", "X9", "X10", "Logo"]);
    }

    #[test]
    fn in_memory_report_serves_pages() {
        let report = InMemoryReport::new()
            .with_page("page one", vec![ChartObject::new("X2", "b"), ChartObject::new("X1", "a")]);
        assert_eq!(report.page_count(), 1);
        assert_eq!(report.page_text(0), "page one");
        assert_eq!(report.chart_objects(0)[0].name, "X1");
        assert!(report.chart_objects(5).is_empty());
        assert_eq!(report.page_text(5), "");
    }

    #[test]
    fn open_rejects_missing_and_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            PdfReport::open(&missing),
            Err(MobilityError::FileNotFound { .. })
        ));

        let html = dir.path().join("page.pdf");
        std::fs::write(&html, b"<html></html>").unwrap();
        assert!(matches!(
            PdfReport::open(&html),
            Err(MobilityError::NotAPdf { .. })
        ));
    }

    #[test]
    fn pdf_report_lists_form_xobjects_in_draw_order() {
        let chart_body = "0 0 m\n".to_string() + &"100 20 l\n".repeat(200) + "0 0 l\n";

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let form = |body: &[u8]| {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 200.into(), 100.into()],
                },
                body.to_vec(),
            )
        };
        let x1 = doc.add_object(form(chart_body.as_bytes()));
        let x10 = doc.add_object(form(b"10 10 l"));
        let x2 = doc.add_object(form(b"20 20 l"));
        let image = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Image", "Width" => 1, "Height" => 1 },
            vec![0],
        ));
        let resources = doc.add_object(dictionary! {
            "XObject" => dictionary! { "X10" => x10, "X2" => x2, "X1" => x1, "Im0" => image },
        });
        let content = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc.compress();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2020-03-29_US_Alaska_Mobility_Report_en.pdf");
        doc.save(&path).unwrap();

        let report = PdfReport::open(&path).unwrap();
        assert_eq!(report.page_count(), 1);
        let charts = report.chart_objects(0);
        let names: Vec<&str> = charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["X1", "X2", "X10"]);
        assert_eq!(charts[0].stream, chart_body.as_bytes());
        assert!(report.chart_objects(3).is_empty());
    }
}
