//! Base-14 font metrics and text measurement.
//!
//! The report only ever uses Helvetica and Helvetica-Bold, so metrics are the
//! standard AFM advance widths (units per 1000 em) baked in as tables. Widths
//! for code points outside the tables fall back to a fixed advance, matching
//! how unmapped characters render as '?' in the WinAnsi encoder.

use crate::types::Pt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    pub fn base_name(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Resource name used in content streams and page font dictionaries.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            Font::Helvetica => &HELVETICA_WIDTHS,
            Font::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        }
    }

    /// Advance width in units per 1000 em.
    pub fn char_width_units(self, c: char) -> u32 {
        let code = c as u32;
        if (0x20..=0x7e).contains(&code) {
            self.widths()[(code - 0x20) as usize] as u32
        } else {
            FALLBACK_WIDTH_UNITS
        }
    }
}

const FALLBACK_WIDTH_UNITS: u32 = 556;

// AFM advances for 0x20..=0x7e.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

pub fn text_width(text: &str, font: Font, size: Pt) -> Pt {
    let mut units: u64 = 0;
    for c in text.chars() {
        units += font.char_width_units(c) as u64;
    }
    let units = units.min(i32::MAX as u64) as i32;
    size.mul_ratio(units, 1000)
}

/// Greedy word wrap. Splits on `\n` first (empty segments become blank
/// lines), then packs whitespace-separated words while they fit. A single
/// word wider than `max_width` occupies its own line and is never broken.
pub fn wrap_text(text: &str, font: Font, size: Pt, max_width: Pt) -> Vec<String> {
    let space_width = text_width(" ", font, size);
    let mut lines = Vec::new();
    for segment in text.split('\n') {
        if segment.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = Pt::ZERO;
        for word in segment.split_whitespace() {
            let word_width = text_width(word, font, size);
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space_width + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space_width + word_width;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}
