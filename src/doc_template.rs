use crate::canvas::{Canvas, Document, JpegImage};
use crate::doc_context::DocContext;
use crate::error::ReportError;
use crate::flowable::{BreakAfter, BreakBefore, Flowable};
use crate::frame::AddResult;
use crate::page_template::PageTemplate;
use std::collections::VecDeque;

/// Plays a story of flowables through a sequence of page templates.
///
/// Template selection: page 1 uses the first template, page 2 the second,
/// and the last template repeats for every page after it.
pub struct DocTemplate {
    page_templates: Vec<PageTemplate>,
    story: Vec<Box<dyn Flowable>>,
    images: Vec<JpegImage>,
    start_page_number: usize,
}

impl DocTemplate {
    pub fn new(page_templates: Vec<PageTemplate>) -> Self {
        Self {
            page_templates,
            story: Vec::new(),
            images: Vec::new(),
            start_page_number: 1,
        }
    }

    /// Pre-registers images so flowables can reference them by index.
    pub fn with_images(mut self, images: Vec<JpegImage>) -> Self {
        self.images = images;
        self
    }

    /// First page gets this final document page number (1-based). Used when
    /// front matter of known length precedes this document.
    pub fn starting_at(mut self, page_number: usize) -> Self {
        self.start_page_number = page_number.max(1);
        self
    }

    pub fn add_flowable(&mut self, flowable: Box<dyn Flowable>) {
        self.story.push(flowable);
    }

    pub fn build(self) -> Result<Document, ReportError> {
        if self.page_templates.is_empty() {
            return Err(ReportError::InvalidConfiguration(
                "no page templates".to_string(),
            ));
        }

        fn select_template(page_templates: &[PageTemplate], page_index: usize) -> &PageTemplate {
            let idx = page_index.min(page_templates.len() - 1);
            &page_templates[idx]
        }

        let start = self.start_page_number;
        let template = select_template(&self.page_templates, 0);
        let mut canvas = Canvas::new(template.page_size);
        for image in self.images {
            canvas.register_image(image);
        }
        let mut page_index = 0usize;
        let mut frames = template.instantiate_frames();
        let mut frame_index = 0usize;
        let mut placed_on_page = false;

        if let Some(callback) = template.on_page() {
            callback(&mut canvas, &DocContext::new(start, &template.name));
        }

        let mut story: VecDeque<Box<dyn Flowable>> = self.story.into();

        macro_rules! next_page {
            () => {{
                canvas.show_page();
                page_index += 1;
                let template = select_template(&self.page_templates, page_index);
                frames = template.instantiate_frames();
                frame_index = 0;
                placed_on_page = false;
                if let Some(callback) = template.on_page() {
                    callback(
                        &mut canvas,
                        &DocContext::new(start + page_index, &template.name),
                    );
                }
            }};
        }

        while let Some(flowable) = story.pop_front() {
            let mut current = flowable;
            let mut suppress_break_before = false;
            loop {
                let pagination = current.pagination();
                if !suppress_break_before
                    && matches!(pagination.break_before, BreakBefore::Page)
                    && (placed_on_page || frame_index > 0)
                {
                    next_page!();
                }

                if frame_index >= frames.len() {
                    next_page!();
                }
                if frames.is_empty() {
                    return Err(ReportError::InvalidConfiguration(
                        "page template has no frames".to_string(),
                    ));
                }

                let is_last_frame = frame_index + 1 >= frames.len();
                let frame = &mut frames[frame_index];
                match frame.add(current, &mut canvas) {
                    AddResult::Placed => {
                        placed_on_page = true;
                        if matches!(pagination.break_after, BreakAfter::Page) {
                            next_page!();
                        }
                        break;
                    }
                    AddResult::Split(remaining) => {
                        placed_on_page = true;
                        suppress_break_before = true;
                        current = remaining;
                        frame_index += 1;
                    }
                    AddResult::Overflow(remaining) => {
                        if !placed_on_page && is_last_frame {
                            return Err(ReportError::UnplaceableFlowable(
                                remaining.debug_name().to_string(),
                            ));
                        }
                        current = remaining;
                        frame_index += 1;
                    }
                }
            }
        }

        Ok(canvas.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowable::{Paragraph, Spacer};
    use crate::style;
    use crate::types::{Pt, Rect, Size};

    fn letter_template() -> PageTemplate {
        let page = Size::letter();
        let margin = Pt::from_f32(style::PAGE_MARGIN);
        PageTemplate::new("body", page).with_frame(Rect::new(
            margin,
            margin,
            page.width - margin * 2,
            page.height - margin * 2,
        ))
    }

    #[test]
    fn long_story_paginates() {
        let mut doc = DocTemplate::new(vec![letter_template()]);
        for _ in 0..4 {
            let text = "filler ".repeat(600);
            doc.add_flowable(Box::new(Paragraph::body(text.trim())));
            doc.add_flowable(Box::new(Spacer::new(Pt::from_f32(12.0))));
        }
        let document = doc.build().unwrap();
        assert!(document.pages.len() > 1);
    }

    #[test]
    fn break_before_starts_new_page() {
        use crate::flowable::Pagination;
        let mut doc = DocTemplate::new(vec![letter_template()]);
        doc.add_flowable(Box::new(Paragraph::body("first page")));
        doc.add_flowable(Box::new(Paragraph::body("second page").pagination(
            Pagination {
                break_before: BreakBefore::Page,
                ..Pagination::default()
            },
        )));
        let document = doc.build().unwrap();
        assert_eq!(document.pages.len(), 2);
    }

    #[test]
    fn empty_story_yields_one_blank_page() {
        let doc = DocTemplate::new(vec![letter_template()]);
        let document = doc.build().unwrap();
        assert_eq!(document.pages.len(), 1);
    }

    #[test]
    fn no_templates_is_an_error() {
        let doc = DocTemplate::new(Vec::new());
        assert!(doc.build().is_err());
    }
}
