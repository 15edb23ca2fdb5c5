use crate::canvas::Canvas;
use crate::font::{self, Font};
use crate::style;
use crate::types::{Color, Pt, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakBefore {
    Auto,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakAfter {
    Auto,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub break_before: BreakBefore,
    pub break_after: BreakAfter,
    pub orphans: usize,
    pub widows: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            break_before: BreakBefore::Auto,
            break_after: BreakAfter::Auto,
            orphans: 1,
            widows: 1,
        }
    }
}

impl Pagination {
    fn resolved_orphans(self) -> usize {
        self.orphans.max(1)
    }

    fn resolved_widows(self) -> usize {
        self.widows.max(1)
    }
}

pub trait Flowable: FlowableClone + Send + Sync {
    fn wrap(&self, avail_width: Pt, avail_height: Pt) -> Size;
    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)>;
    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, avail_height: Pt);

    fn pagination(&self) -> Pagination {
        Pagination::default()
    }

    fn debug_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub trait FlowableClone {
    fn clone_box(&self) -> Box<dyn Flowable>;
}

impl<T> FlowableClone for T
where
    T: 'static + Flowable + Clone,
{
    fn clone_box(&self) -> Box<dyn Flowable> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Flowable> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// A block of wrapped text. Splitting keeps at most
/// `floor(avail_height / line_height)` lines and hands the rest back joined
/// with newlines, so a remainder re-flows to exactly the same lines.
#[derive(Clone)]
pub struct Paragraph {
    text: String,
    font: Font,
    size: Pt,
    line_height: Pt,
    color: Color,
    align: TextAlign,
    pagination: Pagination,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, font: Font, size: Pt) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            line_height: size * style::LINE_HEIGHT_FACTOR,
            color: style::INK,
            align: TextAlign::Left,
            pagination: Pagination::default(),
        }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self::new(text, Font::Helvetica, Pt::from_f32(style::BODY_FONT_SIZE))
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn leading(mut self, line_height: Pt) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn lines(&self, avail_width: Pt) -> Vec<String> {
        font::wrap_text(&self.text, self.font, self.size, avail_width)
    }
}

impl Flowable for Paragraph {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let lines = self.lines(avail_width);
        let width = lines
            .iter()
            .fold(Pt::ZERO, |acc, line| {
                acc.max(font::text_width(line, self.font, self.size))
            })
            .min(avail_width);
        Size {
            width,
            height: self.line_height * (lines.len() as i32),
        }
    }

    fn split(
        &self,
        avail_width: Pt,
        avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        let lines = self.lines(avail_width);
        let lh = self.line_height.to_milli_i64();
        let ah = avail_height.to_milli_i64();
        if lh <= 0 || ah <= 0 {
            return None;
        }
        let max_lines = (ah / lh) as usize;
        if max_lines == 0 || max_lines >= lines.len() {
            return None;
        }

        let mut split_at = max_lines;
        let total_lines = lines.len();
        let orphans = self.pagination.resolved_orphans();
        let widows = self.pagination.resolved_widows();

        if split_at < orphans {
            split_at = 0;
        }
        if total_lines - split_at < widows {
            let adjusted = total_lines.saturating_sub(widows);
            if adjusted >= orphans {
                split_at = adjusted.min(max_lines);
            } else {
                split_at = 0;
            }
        }
        if split_at == 0 || split_at >= total_lines {
            return None;
        }

        let first = Paragraph {
            text: lines[..split_at].join("\n"),
            pagination: Pagination {
                break_before: BreakBefore::Auto,
                break_after: BreakAfter::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        let second = Paragraph {
            text: lines[split_at..].join("\n"),
            pagination: Pagination {
                break_before: BreakBefore::Auto,
                ..self.pagination
            },
            ..self.clone()
        };
        Some((Box::new(first), Box::new(second)))
    }

    fn draw(&self, canvas: &mut Canvas, x: Pt, y: Pt, avail_width: Pt, _avail_height: Pt) {
        let lines = self.lines(avail_width);
        canvas.set_fill_color(self.color);
        canvas.set_font(self.font, self.size);
        let mut cursor_y = y;
        for line in &lines {
            let line_width = font::text_width(line, self.font, self.size);
            let offset = match self.align {
                TextAlign::Left => Pt::ZERO,
                TextAlign::Center => ((avail_width - line_width).max(Pt::ZERO)).mul_ratio(1, 2),
                TextAlign::Right => (avail_width - line_width).max(Pt::ZERO),
            };
            // Baseline sits one line height below the top of the line box.
            canvas.draw_string(x + offset, cursor_y + self.size, line);
            cursor_y += self.line_height;
        }
    }

    fn pagination(&self) -> Pagination {
        self.pagination
    }
}

#[derive(Clone)]
pub struct Spacer {
    height: Pt,
}

impl Spacer {
    pub fn new(height: Pt) -> Self {
        Self { height }
    }
}

impl Flowable for Spacer {
    fn wrap(&self, _avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: Pt::ZERO,
            height: self.height,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, _canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {}
}

/// An inline photo with its caption line. Atomic: if it does not fit the
/// remaining space it overflows to the next page whole.
#[derive(Clone)]
pub struct PhotoFlowable {
    image_id: usize,
    px_width: u32,
    px_height: u32,
    caption: String,
}

impl PhotoFlowable {
    pub fn new(image_id: usize, px_width: u32, px_height: u32, caption: impl Into<String>) -> Self {
        Self {
            image_id,
            px_width: px_width.max(1),
            px_height: px_height.max(1),
            caption: caption.into(),
        }
    }

    fn scaled(&self, avail_width: Pt) -> Size {
        let iw = Pt::from_f32(self.px_width as f32);
        let ih = Pt::from_f32(self.px_height as f32);
        let max_h = Pt::from_f32(style::INLINE_IMG_MAX_H);
        let scale_w = avail_width.to_f32() / iw.to_f32();
        let scale_h = max_h.to_f32() / ih.to_f32();
        let scale = scale_w.min(scale_h);
        Size {
            width: iw * scale,
            height: ih * scale,
        }
    }

    fn caption_height(&self) -> Pt {
        style::body_line_height()
    }
}

impl Flowable for PhotoFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let image = self.scaled(avail_width);
        Size {
            width: avail_width,
            height: self.caption_height() + image.height + Pt::from_f32(4.0),
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
        let size = Pt::from_f32(style::BODY_FONT_SIZE);
        canvas.set_fill_color(style::INK);
        canvas.set_font(Font::HelveticaBold, size);
        canvas.draw_string(x, y + size, &self.caption);
        let image = self.scaled(avail_width);
        canvas.draw_image(
            x,
            y + self.caption_height() + Pt::from_f32(4.0),
            image.width,
            image.height,
            self.image_id,
        );
    }
}

/// A clickable external link rendered as a bold label; the annotation
/// rectangle matches the label's text box exactly. Optionally prints the raw
/// URL on the following line.
#[derive(Clone)]
pub struct LinkFlowable {
    label: String,
    url: String,
    show_url: bool,
}

impl LinkFlowable {
    pub fn new(label: impl Into<String>, url: impl Into<String>, show_url: bool) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            show_url,
        }
    }

    fn line_height(&self) -> Pt {
        style::body_line_height()
    }
}

impl Flowable for LinkFlowable {
    fn wrap(&self, avail_width: Pt, _avail_height: Pt) -> Size {
        let lines = if self.show_url { 2 } else { 1 };
        let size = Pt::from_f32(style::BODY_FONT_SIZE);
        let width = font::text_width(&self.label, Font::HelveticaBold, size).min(avail_width);
        Size {
            width,
            height: self.line_height() * lines,
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
        let size = Pt::from_f32(style::BODY_FONT_SIZE);
        let label_width = font::text_width(&self.label, Font::HelveticaBold, size).min(avail_width);
        canvas.set_fill_color(style::LINK_BLUE);
        canvas.set_font(Font::HelveticaBold, size);
        canvas.draw_string(x, y + size, &self.label);
        canvas.link_uri(x, y, label_width, self.line_height(), &self.url);
        if self.show_url {
            canvas.set_fill_color(style::INK_MUTED);
            canvas.set_font(Font::Helvetica, size);
            canvas.draw_string(x, y + self.line_height() + size, &self.url);
        }
    }
}

/// Zero-size marker that records a metadata command at its flow position.
/// Used to tag the page where a section starts.
#[derive(Clone)]
pub struct MetaMarker {
    key: String,
    value: String,
}

impl MetaMarker {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Flowable for MetaMarker {
    fn wrap(&self, _avail_width: Pt, _avail_height: Pt) -> Size {
        Size {
            width: Pt::ZERO,
            height: Pt::ZERO,
        }
    }

    fn split(
        &self,
        _avail_width: Pt,
        _avail_height: Pt,
    ) -> Option<(Box<dyn Flowable>, Box<dyn Flowable>)> {
        None
    }

    fn draw(&self, canvas: &mut Canvas, _x: Pt, _y: Pt, _avail_width: Pt, _avail_height: Pt) {
        canvas.meta(self.key.clone(), self.value.clone());
    }
}
