//! Home-inspection PDF report generation.
//!
//! Takes an inspection record (JSON), fetches and normalizes its photo
//! media, and produces one of two outputs: a freestanding styled report
//! (cover, executive summary, linked table of contents, section chapters,
//! inline photos and video links), or the official fixed-layout form with
//! the record's values bound onto its fields and flattened, plus appended
//! overflow pages for comments that did not fit.
//!
//! The layout engine is a small retained-command pipeline: flowables are
//! wrapped and split into page frames, pages accumulate drawing commands,
//! and serialization emits the PDF via `lopdf`.

mod canvas;
mod doc_context;
mod doc_template;
mod error;
mod extract;
mod flowable;
mod font;
mod frame;
mod media;
mod page_template;
mod pdf;
mod report;
mod rich;
mod style;
mod template;
mod types;

pub use canvas::{Canvas, Command, Document, JpegImage, LinkTarget, OutlineEntry, Page};
pub use doc_context::DocContext;
pub use doc_template::DocTemplate;
pub use error::ReportError;
pub use extract::{Header, Inspection, Item, MediaKind, MediaRef};
pub use flowable::{BreakAfter, BreakBefore, Flowable, Pagination, Paragraph, Spacer, TextAlign};
pub use frame::{AddResult, Frame};
pub use media::{HttpFetcher, ImageFetcher, MediaMap, build_media_map};
pub use page_template::{FrameSpec, PageTemplate};
pub use template::{BindOutcome, WidgetInfo, WidgetKind};
pub use types::{Color, Margins, Pt, Rect, Size};

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What a pipeline run produced.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub pages: usize,
    /// Items routed to overflow pages. Always zero on the freestanding path.
    pub overflow_items: usize,
}

/// Configures and runs the full pipeline: parse, fetch media, render, write.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    json_path: PathBuf,
    out_path: PathBuf,
    template_path: Option<PathBuf>,
    verbose_media: bool,
    timing: bool,
}

impl ReportBuilder {
    pub fn new(json_path: impl Into<PathBuf>, out_path: impl Into<PathBuf>) -> Self {
        Self {
            json_path: json_path.into(),
            out_path: out_path.into(),
            template_path: None,
            verbose_media: false,
            timing: false,
        }
    }

    /// Bind onto this form template instead of rendering freestanding.
    pub fn with_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Print raw video URLs under their link labels.
    pub fn verbose_media(mut self, on: bool) -> Self {
        self.verbose_media = on;
        self
    }

    /// Log per-phase durations at info level.
    pub fn timing(mut self, on: bool) -> Self {
        self.timing = on;
        self
    }

    pub fn run(&self) -> Result<RunSummary, ReportError> {
        let total = Instant::now();

        let phase = Instant::now();
        let json = std::fs::read_to_string(&self.json_path)
            .map_err(|_| ReportError::MissingInput(self.json_path.clone()))?;
        let inspection = extract::parse(&json)?;
        info!(
            "parsed {} items, {} media references",
            inspection.items.len(),
            inspection.media.len()
        );
        self.phase_done("parse", phase);

        let phase = Instant::now();
        let fetcher = HttpFetcher::new()?;
        let media = build_media_map(&inspection.media, &fetcher);
        self.phase_done("media", phase);

        let phase = Instant::now();
        let summary = match &self.template_path {
            Some(path) => self.run_template(path, &inspection, &media)?,
            None => self.run_freestanding(&inspection, &media)?,
        };
        self.phase_done("render", phase);

        info!(
            "wrote {} ({} pages)",
            self.out_path.display(),
            summary.pages
        );
        self.phase_done("total", total);
        Ok(summary)
    }

    fn run_freestanding(
        &self,
        inspection: &Inspection,
        media: &MediaMap,
    ) -> Result<RunSummary, ReportError> {
        let doc = report::render_report(inspection, media, self.verbose_media)?;
        let pages = doc.pages.len();
        pdf::write_to_file(&doc, &self.out_path)?;
        Ok(RunSummary {
            pages,
            overflow_items: 0,
        })
    }

    fn run_template(
        &self,
        template_path: &Path,
        inspection: &Inspection,
        media: &MediaMap,
    ) -> Result<RunSummary, ReportError> {
        let mut outcome = template::bind(template_path, &inspection.header, &inspection.items)?;
        let overflow_items = outcome.overflow.len();
        let mut pages = outcome.page_count;
        if !outcome.overflow.is_empty() {
            warn!(
                "{} items routed to overflow pages after the form's fields",
                overflow_items
            );
            let appendix = report::render_appendix(
                &inspection.header,
                &outcome.overflow,
                media,
                self.verbose_media,
                outcome.page_count,
            )?;
            pages += appendix.pages.len();
            let appendix_pdf = pdf::serialize(&appendix)?;
            template::append_document_pages(&mut outcome.document, appendix_pdf)?;
        }
        outcome.document.compress();
        outcome.document.save(&self.out_path)?;
        Ok(RunSummary {
            pages,
            overflow_items,
        })
    }

    fn phase_done(&self, name: &str, started: Instant) {
        if self.timing {
            info!("timing: {} {:.1}ms", name, started.elapsed().as_secs_f64() * 1000.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("punchlist-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_input_is_reported_with_its_path() {
        let builder = ReportBuilder::new("/nonexistent/record.json", temp_path("never.pdf"));
        let err = builder.run().unwrap_err();
        assert!(matches!(err, ReportError::MissingInput(_)));
    }

    #[test]
    fn freestanding_pipeline_writes_a_pdf() {
        let json = r#"{
            "inspection": {
                "clientInfo": {"name": "Jane Roe"},
                "schedule": {"date": 1714521600000},
                "address": {"street": "12 Oak St", "city": "Austin", "state": "TX"},
                "inspector": {"name": "Pat Lee", "license": "9999"},
                "sections": [{
                    "name": "Roof",
                    "sectionNumber": 2,
                    "lineItems": [{
                        "title": "Roof Covering",
                        "inspectionStatus": "NI",
                        "comments": [{"commentText": "Not inspected due to weather."}]
                    }]
                }]
            }
        }"#;
        let in_path = temp_path("in.json");
        let out_path = temp_path("out.pdf");
        std::fs::write(&in_path, json).unwrap();

        let summary = ReportBuilder::new(&in_path, &out_path).run().unwrap();
        assert!(summary.pages >= 4);
        assert_eq!(summary.overflow_items, 0);
        let bytes = std::fs::read(&out_path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        std::fs::remove_file(&in_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
