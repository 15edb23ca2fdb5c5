//! Retained drawing surface. Commands use top-left-origin coordinates in
//! points; the PDF serializer flips Y at emit time. Link annotations and
//! outline entries ride alongside the command stream because they are page
//! or document attributes, not content.

use crate::font::Font;
use crate::types::{Color, Pt, Size};

#[derive(Debug, Clone)]
pub enum Command {
    // Non-rendered metadata used for page bookkeeping. Ignored by the
    // PDF serializer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont {
        font: Font,
        size: Pt,
    },
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    Fill,
    FillStroke,
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        image_id: usize,
    },
}

/// A normalized photo ready for embedding: baseline JPEG bytes plus pixel
/// dimensions.
#[derive(Debug, Clone)]
pub struct JpegImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub enum LinkTarget {
    Uri(String),
    /// Zero-based page index in the finished document.
    Page(usize),
}

#[derive(Debug, Clone)]
pub struct Link {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
    pub target: LinkTarget,
}

#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub title: String,
    pub level: u8,
    pub page: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: Vec<JpegImage>,
    pub outline: Vec<OutlineEntry>,
}

impl Document {
    /// Concatenates `front` and `body` into one document. Page targets in
    /// links and outline entries are expected to already be absolute in the
    /// final numbering; only image ids are remapped.
    pub fn splice(front: Document, mut body: Document) -> Document {
        let image_offset = front.images.len();
        let mut pages = front.pages;
        for page in &mut body.pages {
            for command in &mut page.commands {
                if let Command::DrawImage { image_id, .. } = command {
                    *image_id += image_offset;
                }
            }
        }
        pages.append(&mut body.pages);
        let mut images = front.images;
        images.append(&mut body.images);
        let mut outline = front.outline;
        outline.append(&mut body.outline);
        outline.sort_by_key(|entry| entry.page);
        Document {
            page_size: front.page_size,
            pages,
            images,
            outline,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: Font,
    font_size: Pt,
}

impl GraphicsState {
    fn fresh() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: Font::Helvetica,
            font_size: Pt::from_f32(12.0),
        }
    }
}

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state: GraphicsState,
    images: Vec<JpegImage>,
    outline: Vec<OutlineEntry>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            state: GraphicsState::fresh(),
            images: Vec::new(),
            outline: Vec::new(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    /// Index of the page currently being drawn.
    pub fn current_page_index(&self) -> usize {
        self.pages.len()
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.state.fill_color == color {
            return;
        }
        self.state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.state.stroke_color == color {
            return;
        }
        self.state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.state.line_width == width {
            return;
        }
        self.state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, font: Font, size: Pt) {
        if self.state.font == font && self.state.font_size == size {
            return;
        }
        self.state.font = font;
        self.state.font_size = size;
        self.current.commands.push(Command::SetFont { font, size });
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn stroke(&mut self) {
        self.current.commands.push(Command::Stroke);
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn fill_stroke(&mut self) {
        self.current.commands.push(Command::FillStroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    /// Registers a JPEG for later drawing. Callers may register the same
    /// image under multiple ids; the serializer deduplicates by content.
    pub fn register_image(&mut self, image: JpegImage) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    pub fn draw_image(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, image_id: usize) {
        self.current.commands.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            image_id,
        });
    }

    pub fn link_uri(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, uri: impl Into<String>) {
        self.current.links.push(Link {
            x,
            y,
            width,
            height,
            target: LinkTarget::Uri(uri.into()),
        });
    }

    pub fn link_page(&mut self, x: Pt, y: Pt, width: Pt, height: Pt, page: usize) {
        self.current.links.push(Link {
            x,
            y,
            width,
            height,
            target: LinkTarget::Page(page),
        });
    }

    pub fn bookmark(&mut self, title: impl Into<String>, level: u8, page: usize) {
        self.outline.push(OutlineEntry {
            title: title.into(),
            level,
            page,
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.state = GraphicsState::fresh();
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || !self.current.links.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
            outline: self.outline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redundant_state_changes_collapse() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_fill_color(Color::BLACK);
        canvas.set_font(Font::Helvetica, Pt::from_f32(10.0));
        canvas.set_font(Font::Helvetica, Pt::from_f32(10.0));
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].commands.len(), 1);
    }

    #[test]
    fn state_resets_across_pages() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font(Font::HelveticaBold, Pt::from_f32(14.0));
        canvas.show_page();
        canvas.set_font(Font::HelveticaBold, Pt::from_f32(14.0));
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        assert!(matches!(
            doc.pages[1].commands[0],
            Command::SetFont { .. }
        ));
    }

    #[test]
    fn splice_offsets_body_image_ids() {
        let mut front = Canvas::new(Size::letter());
        front.register_image(JpegImage {
            data: vec![1],
            width: 1,
            height: 1,
        });
        front.draw_string(Pt::ZERO, Pt::ZERO, "cover");
        let front = front.finish();

        let mut body = Canvas::new(Size::letter());
        let id = body.register_image(JpegImage {
            data: vec![2],
            width: 1,
            height: 1,
        });
        body.draw_image(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0), id);
        let body = body.finish();

        let doc = Document::splice(front, body);
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.images.len(), 2);
        let drawn = doc.pages[1]
            .commands
            .iter()
            .find_map(|c| match c {
                Command::DrawImage { image_id, .. } => Some(*image_id),
                _ => None,
            })
            .unwrap();
        assert_eq!(drawn, 1);
    }
}
