//! Freestanding report assembly.
//!
//! Page numbering is deterministic: front matter (cover, summary, contents)
//! has a page count computable before layout, so the body is built first
//! with its numbering offset by that count, section start pages are read
//! back from canvas metadata, and the front matter is then rendered with
//! final numbers and spliced ahead of the body.

use crate::canvas::{Canvas, Command, Document, JpegImage, OutlineEntry};
use crate::doc_template::DocTemplate;
use crate::error::ReportError;
use crate::extract::{Header, Inspection, Item};
use crate::flowable::{
    BreakBefore, Flowable, MetaMarker, Pagination, Paragraph, Spacer,
};
use crate::font::{self, Font};
use crate::media::MediaMap;
use crate::page_template::PageTemplate;
use crate::rich::{self, MediaImageIds};
use crate::style;
use crate::types::{Color, Pt, Rect, Size};

const META_SECTION_START: &str = "section_start";
const TOC_ROW: f32 = 18.0;

pub fn render_report(
    inspection: &Inspection,
    media: &MediaMap,
    verbose_media: bool,
) -> Result<Document, ReportError> {
    let page = Size::letter();
    let sections = group_sections(&inspection.items);
    let front_pages = 2 + toc_page_count(sections.len(), page);

    let (images, image_ids) = collect_images(media);
    let cover_image = if inspection.has_cover_image {
        media.get(1).and_then(|entry| entry.image.clone())
    } else {
        None
    };

    // Body first: section chapters with final page numbers.
    let mut body = build_body(
        &sections,
        media,
        &image_ids,
        images,
        page,
        front_pages,
        verbose_media,
    )?;

    let section_pages = read_section_pages(&body, front_pages);
    for (label, page_index) in &section_pages {
        body.outline.push(OutlineEntry {
            title: label.clone(),
            level: 0,
            page: *page_index,
        });
    }
    apply_footers(&mut body, front_pages);

    let front = build_front(
        inspection,
        &sections,
        &section_pages,
        cover_image,
        page,
        front_pages,
    );

    Ok(Document::splice(front, body))
}

/// Renders overflow items routed out of a bound form template. Pages are
/// numbered continuing from `start_page`.
pub fn render_appendix(
    header: &Header,
    items: &[Item],
    media: &MediaMap,
    verbose_media: bool,
    start_page: usize,
) -> Result<Document, ReportError> {
    let page = Size::letter();
    let (images, image_ids) = collect_images(media);
    let mut doc_template = DocTemplate::new(vec![body_template(page)])
        .starting_at(start_page + 1)
        .with_images(images);

    doc_template.add_flowable(Box::new(MetaMarker::new(META_SECTION_START, "Overflow")));
    doc_template.add_flowable(Box::new(heading("Overflow", 20.0)));
    doc_template.add_flowable(Box::new(
        Paragraph::body(format!(
            "Comments that did not fit their form fields. Property: {}",
            header.address
        ))
        .color(style::INK_MUTED),
    ));
    doc_template.add_flowable(Box::new(Spacer::new(Pt::from_f32(14.0))));
    for item in items {
        push_item_card(&mut doc_template, item, media, &image_ids, verbose_media);
    }

    let mut doc = doc_template.build()?;
    doc.outline.push(OutlineEntry {
        title: "Overflow".to_string(),
        level: 0,
        page: start_page,
    });
    apply_footers(&mut doc, start_page);
    Ok(doc)
}

struct SectionGroup<'a> {
    label: String,
    items: Vec<&'a Item>,
}

fn group_sections(items: &[Item]) -> Vec<SectionGroup<'_>> {
    let mut groups: Vec<(i64, String, SectionGroup)> = Vec::new();
    for item in items {
        let label = section_label(item);
        if let Some((_, _, group)) = groups.iter_mut().find(|(_, key, _)| *key == label) {
            group.items.push(item);
            continue;
        }
        let order = item.section_number.parse::<i64>().unwrap_or(9999);
        groups.push((
            order,
            label.clone(),
            SectionGroup {
                label,
                items: vec![item],
            },
        ));
    }
    groups.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    groups.into_iter().map(|(_, _, group)| group).collect()
}

fn section_label(item: &Item) -> String {
    let label = format!("{}. {}", item.section_number, item.section);
    label
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

fn toc_page_count(entries: usize, page: Size) -> usize {
    let usable = page.height.to_f32() - style::PAGE_MARGIN * 2.0 - 40.0;
    let rows_per_page = (usable / TOC_ROW).floor().max(1.0) as usize;
    entries.div_ceil(rows_per_page).max(1)
}

/// Registers every fetched image once per media index and returns the
/// document image list with the index mapping.
fn collect_images(media: &MediaMap) -> (Vec<JpegImage>, MediaImageIds) {
    let mut images = Vec::new();
    let mut ids = MediaImageIds::default();
    for index in 1..=media.len() {
        if let Some(entry) = media.get(index) {
            if let Some(image) = &entry.image {
                ids.insert(index, images.len());
                images.push(image.clone());
            }
        }
    }
    (images, ids)
}

fn body_template(page: Size) -> PageTemplate {
    let margins = style::page_margins();
    PageTemplate::new("body", page).with_frame(Rect::new(
        margins.left,
        margins.top,
        page.width - margins.left - margins.right,
        // Keep clear of the footer band.
        page.height - margins.top - margins.bottom - Pt::from_f32(18.0),
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_body(
    sections: &[SectionGroup<'_>],
    media: &MediaMap,
    image_ids: &MediaImageIds,
    images: Vec<JpegImage>,
    page: Size,
    front_pages: usize,
    verbose_media: bool,
) -> Result<Document, ReportError> {
    let mut doc_template = DocTemplate::new(vec![body_template(page)])
        .with_images(images)
        .starting_at(front_pages + 1);

    let mut first = true;
    for section in sections {
        let heading_pagination = if first {
            Pagination::default()
        } else {
            Pagination {
                break_before: BreakBefore::Page,
                ..Pagination::default()
            }
        };
        first = false;
        doc_template.add_flowable(Box::new(
            MetaMarker::new(META_SECTION_START, section.label.clone()),
        ));
        doc_template.add_flowable(Box::new(
            heading(&section.label, 16.0).pagination(heading_pagination),
        ));
        doc_template.add_flowable(Box::new(
            Paragraph::body("I = Inspected   NI = Not Inspected   NP = Not Present   D = Deficient")
                .color(style::INK_MUTED),
        ));
        doc_template.add_flowable(Box::new(Spacer::new(Pt::from_f32(10.0))));
        for item in &section.items {
            push_item_card(&mut doc_template, item, media, image_ids, verbose_media);
        }
    }

    if sections.is_empty() {
        doc_template.add_flowable(Box::new(
            Paragraph::body(style::SENTINEL).color(style::INK_MUTED),
        ));
    }

    doc_template.build()
}

fn push_item_card(
    doc_template: &mut DocTemplate,
    item: &Item,
    media: &MediaMap,
    image_ids: &MediaImageIds,
    verbose_media: bool,
) {
    doc_template.add_flowable(Box::new(CardHeader {
        title: item.title.clone(),
        status: item.status.clone(),
    }));
    for flowable in rich::body_flowables(&item.body, media, image_ids, verbose_media) {
        doc_template.add_flowable(flowable);
    }
    doc_template.add_flowable(Box::new(Spacer::new(Pt::from_f32(14.0))));
}

fn heading(text: &str, size: f32) -> Paragraph {
    Paragraph::new(text, Font::HelveticaBold, Pt::from_f32(size)).leading(Pt::from_f32(size * 1.4))
}

fn read_section_pages(body: &Document, front_pages: usize) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    for (page_index, page) in body.pages.iter().enumerate() {
        for command in &page.commands {
            if let Command::Meta { key, value } = command {
                if key == META_SECTION_START {
                    out.push((value.clone(), front_pages + page_index));
                }
            }
        }
    }
    out
}

/// Appends the footer band to every page: section label on the left, page
/// number on the right. Runs after layout so each page knows its section.
fn apply_footers(doc: &mut Document, first_page_index: usize) {
    let page_size = doc.page_size;
    let mut label = String::new();
    for (page_index, page) in doc.pages.iter_mut().enumerate() {
        for command in &page.commands {
            if let Command::Meta { key, value } = command {
                if key == META_SECTION_START {
                    label = value.clone();
                    break;
                }
            }
        }
        let number = first_page_index + page_index + 1;
        page.commands
            .extend(footer_commands(&label, number, page_size));
    }
}

fn footer_commands(label: &str, page_number: usize, page_size: Size) -> Vec<Command> {
    let margin = Pt::from_f32(style::PAGE_MARGIN);
    let size = Pt::from_f32(style::FOOTER_FONT_SIZE);
    let y_rule = page_size.height - Pt::from_f32(34.0);
    let y_text = page_size.height - Pt::from_f32(24.0);
    let page_text = format!("Page {page_number}");
    let page_text_width = font::text_width(&page_text, Font::Helvetica, size);
    vec![
        Command::SetStrokeColor(style::RULE),
        Command::SetLineWidth(Pt::from_f32(0.5)),
        Command::MoveTo {
            x: margin,
            y: y_rule,
        },
        Command::LineTo {
            x: page_size.width - margin,
            y: y_rule,
        },
        Command::Stroke,
        Command::SetFillColor(style::INK_MUTED),
        Command::SetFont {
            font: Font::Helvetica,
            size,
        },
        Command::DrawString {
            x: margin,
            y: y_text,
            text: label.to_string(),
        },
        Command::DrawString {
            x: page_size.width - margin - page_text_width,
            y: y_text,
            text: page_text,
        },
    ]
}

fn build_front(
    inspection: &Inspection,
    sections: &[SectionGroup<'_>],
    section_pages: &[(String, usize)],
    cover_image: Option<JpegImage>,
    page: Size,
    front_pages: usize,
) -> Document {
    let mut canvas = Canvas::new(page);

    draw_cover(&mut canvas, inspection, cover_image);
    canvas.bookmark("Cover", 0, 0);
    canvas.show_page();

    draw_summary(&mut canvas, inspection);
    canvas.bookmark("Summary", 0, 1);
    canvas.show_page();

    draw_toc(&mut canvas, sections, section_pages);
    canvas.bookmark("Contents", 0, 2);

    let mut front = canvas.finish();
    // Contents may legitimately span fewer pages than reserved only if the
    // row estimate was loose; pad so the body offset stays correct.
    while front.pages.len() < front_pages {
        front.pages.push(Default::default());
    }
    for (page_index, page_doc) in front.pages.iter_mut().enumerate().skip(1) {
        let label = if page_index == 1 { "Summary" } else { "Contents" };
        let number = page_index + 1;
        page_doc
            .commands
            .extend(footer_commands(label, number, page));
    }
    front
}

fn draw_cover(canvas: &mut Canvas, inspection: &Inspection, cover_image: Option<JpegImage>) {
    let page = canvas.page_size();
    let margin = Pt::from_f32(style::PAGE_MARGIN);
    let band_height = Pt::from_f32(180.0);

    canvas.set_fill_color(style::COVER_BAND);
    canvas.draw_rect(Pt::ZERO, Pt::ZERO, page.width, band_height);
    canvas.fill();

    canvas.set_fill_color(Color::WHITE);
    canvas.set_font(Font::HelveticaBold, Pt::from_f32(26.0));
    canvas.draw_string(margin, Pt::from_f32(70.0), "Property Inspection Report");
    canvas.set_font(Font::Helvetica, Pt::from_f32(13.0));
    canvas.draw_string(margin, Pt::from_f32(98.0), &inspection.header.address);
    canvas.draw_string(margin, Pt::from_f32(118.0), &inspection.header.date);

    canvas.set_fill_color(style::INK);
    canvas.set_font(Font::Helvetica, Pt::from_f32(11.0));
    let mut y = band_height + Pt::from_f32(36.0);
    let line = Pt::from_f32(18.0);
    canvas.draw_string(margin, y, format!("Client: {}", inspection.header.client));
    y += line;
    let inspector = if inspection.header.license.is_empty() {
        format!("Inspector: {}", inspection.header.inspector)
    } else {
        format!(
            "Inspector: {} ({})",
            inspection.header.inspector, inspection.header.license
        )
    };
    canvas.draw_string(margin, y, inspector);
    y += line + Pt::from_f32(10.0);

    if let Some(image) = cover_image {
        let avail_width = page.width - margin * 2;
        let avail_height = page.height - y - margin;
        let iw = image.width.max(1) as f32;
        let ih = image.height.max(1) as f32;
        let scale = (avail_width.to_f32() / iw)
            .min(avail_height.to_f32() / ih)
            .min(1.0);
        let id = canvas.register_image(image);
        canvas.draw_image(
            margin,
            y,
            Pt::from_f32(iw * scale),
            Pt::from_f32(ih * scale),
            id,
        );
    }
}

fn draw_summary(canvas: &mut Canvas, inspection: &Inspection) {
    let page = canvas.page_size();
    let margin = Pt::from_f32(style::PAGE_MARGIN);
    let content_width = page.width - margin * 2;

    canvas.set_fill_color(style::INK);
    canvas.set_font(Font::HelveticaBold, Pt::from_f32(20.0));
    canvas.draw_string(margin, margin + Pt::from_f32(20.0), "Executive Summary");

    let counts = status_counts(&inspection.items);
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    let mut y = margin + Pt::from_f32(48.0);

    // Proportional status bar.
    let bar_height = Pt::from_f32(14.0);
    if total > 0 {
        let mut x = margin;
        for (code, count) in &counts {
            if *count == 0 {
                continue;
            }
            let segment = content_width.mul_ratio(*count as i32, total as i32);
            canvas.set_fill_color(style::status_color(code));
            canvas.draw_rect(x, y, segment, bar_height);
            canvas.fill();
            x += segment;
        }
    }
    y += bar_height + Pt::from_f32(22.0);

    canvas.set_font(Font::Helvetica, Pt::from_f32(10.5));
    for (code, count) in &counts {
        canvas.set_fill_color(style::status_color(code));
        canvas.draw_rect(margin, y - Pt::from_f32(8.0), Pt::from_f32(8.0), Pt::from_f32(8.0));
        canvas.fill();
        canvas.set_fill_color(style::INK);
        canvas.draw_string(
            margin + Pt::from_f32(14.0),
            y,
            format!("{}: {}", style::status_label(code), count),
        );
        y += Pt::from_f32(18.0);
    }
    y += Pt::from_f32(14.0);

    canvas.set_fill_color(style::INK);
    canvas.set_font(Font::HelveticaBold, Pt::from_f32(13.0));
    canvas.draw_string(margin, y, "Highlights");
    y += Pt::from_f32(22.0);
    canvas.set_font(Font::Helvetica, Pt::from_f32(10.5));
    let highlights: Vec<&Item> = inspection
        .items
        .iter()
        .filter(|item| item.status == "D" || item.status == "NI")
        .take(style::SUMMARY_HIGHLIGHT_CAP)
        .collect();
    if highlights.is_empty() {
        canvas.set_fill_color(style::INK_MUTED);
        canvas.draw_string(margin, y, "No deficient or not-inspected items.");
    }
    for item in highlights {
        canvas.set_fill_color(style::status_color(&item.status));
        canvas.draw_rect(margin, y - Pt::from_f32(7.0), Pt::from_f32(6.0), Pt::from_f32(6.0));
        canvas.fill();
        canvas.set_fill_color(style::INK);
        let line = format!("{} - {}", section_label(item), item.title);
        canvas.draw_string(margin + Pt::from_f32(12.0), y, line);
        y += Pt::from_f32(17.0);
    }
}

fn status_counts(items: &[Item]) -> [(&'static str, usize); 4] {
    let mut counts = [("D", 0usize), ("NI", 0), ("I", 0), ("NP", 0)];
    for item in items {
        let slot = match item.status.as_str() {
            "D" => 0,
            "NI" => 1,
            "NP" => 3,
            _ => 2,
        };
        counts[slot].1 += 1;
    }
    counts
}

fn draw_toc(
    canvas: &mut Canvas,
    sections: &[SectionGroup<'_>],
    section_pages: &[(String, usize)],
) {
    let page = canvas.page_size();
    let margin = Pt::from_f32(style::PAGE_MARGIN);
    let row = Pt::from_f32(TOC_ROW);
    let size = Pt::from_f32(11.0);
    let bottom = page.height - margin;

    canvas.set_fill_color(style::INK);
    canvas.set_font(Font::HelveticaBold, Pt::from_f32(20.0));
    canvas.draw_string(margin, margin + Pt::from_f32(20.0), "Contents");
    let mut y = margin + Pt::from_f32(48.0);

    canvas.set_font(Font::Helvetica, size);
    for section in sections {
        if y > bottom {
            canvas.show_page();
            canvas.set_font(Font::Helvetica, size);
            canvas.set_fill_color(style::INK);
            y = margin + Pt::from_f32(12.0);
        }
        let target = section_pages
            .iter()
            .find(|(label, _)| *label == section.label)
            .map(|(_, page_index)| *page_index)
            .unwrap_or(0);
        let page_text = (target + 1).to_string();
        let title_width = font::text_width(&section.label, Font::Helvetica, size);
        let number_width = font::text_width(&page_text, Font::Helvetica, size);

        canvas.set_fill_color(style::INK);
        canvas.draw_string(margin, y, &section.label);

        let dot_width = font::text_width(".", Font::Helvetica, size);
        let leader_space =
            page.width - margin * 2 - title_width - number_width - Pt::from_f32(12.0);
        let dots = (leader_space.to_f32() / dot_width.to_f32()).max(2.0) as usize;
        canvas.set_fill_color(style::INK_MUTED);
        canvas.draw_string(
            margin + title_width + Pt::from_f32(6.0),
            y,
            ".".repeat(dots),
        );
        canvas.set_fill_color(style::INK);
        canvas.draw_string(page.width - margin - number_width, y, &page_text);

        canvas.link_page(
            margin,
            y - size,
            page.width - margin * 2,
            row,
            target,
        );
        y += row;
    }
}

/// Item card header: status color band, bordered title row, status label.
#[derive(Clone)]
struct CardHeader {
    title: String,
    status: String,
}

impl CardHeader {
    const TITLE_SIZE: f32 = 11.5;
    const BAND_WIDTH: f32 = 6.0;

    fn title_lines(&self, avail_width: Pt) -> Vec<String> {
        let inner = avail_width
            - Pt::from_f32(Self::BAND_WIDTH + style::CARD_PAD * 2.0 + 60.0);
        font::wrap_text(
            &self.title,
            Font::HelveticaBold,
            Pt::from_f32(Self::TITLE_SIZE),
            inner.max(Pt::from_f32(50.0)),
        )
    }

    fn height(&self, avail_width: Pt) -> Pt {
        let lines = self.title_lines(avail_width).len().max(1) as i32;
        Pt::from_f32(Self::TITLE_SIZE * style::LINE_HEIGHT_FACTOR) * lines
            + Pt::from_f32(style::CARD_PAD * 2.0)
    }
}

impl Flowable for CardHeader {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: avail_width,
            height: self.height(avail_width),
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let height = self.height(avail_width);
        let band = Pt::from_f32(Self::BAND_WIDTH);
        let pad = Pt::from_f32(style::CARD_PAD);
        let title_size = Pt::from_f32(Self::TITLE_SIZE);

        canvas.set_fill_color(style::status_color(&self.status));
        canvas.draw_rect(x, y, band, height);
        canvas.fill();
        canvas.set_stroke_color(style::RULE);
        canvas.set_line_width(Pt::from_f32(0.75));
        canvas.draw_rect(x, y, avail_width, height);
        canvas.stroke();

        canvas.set_fill_color(style::INK);
        canvas.set_font(Font::HelveticaBold, title_size);
        let line_height = Pt::from_f32(Self::TITLE_SIZE * style::LINE_HEIGHT_FACTOR);
        let mut line_y = y + pad + title_size;
        for line in self.title_lines(avail_width) {
            canvas.draw_string(x + band + pad, line_y, line);
            line_y += line_height;
        }

        let status_size = Pt::from_f32(9.0);
        canvas.set_fill_color(style::status_color(&self.status));
        canvas.set_font(Font::HelveticaBold, status_size);
        let status_width = font::text_width(&self.status, Font::HelveticaBold, status_size);
        canvas.draw_string(
            x + avail_width - status_width - pad,
            y + pad + status_size,
            &self.status,
        );
    }
}
