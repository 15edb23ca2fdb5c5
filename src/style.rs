//! Layout and binding constants.
//!
//! Everything here is tuned against the current TREC form revision and the
//! freestanding report design. Template revisions should only ever require
//! edits in this file.

use crate::types::{Color, Margins, Pt};

pub const PAGE_MARGIN: f32 = 54.0;
pub const BODY_FONT_SIZE: f32 = 10.5;
pub const LINE_HEIGHT_FACTOR: f32 = 1.35;
pub const CARD_PAD: f32 = 8.0;
pub const FOOTER_FONT_SIZE: f32 = 8.5;

/// Inline photos never exceed this height (2.4in).
pub const INLINE_IMG_MAX_H: f32 = 172.8;

/// Cap on the executive-summary highlight list.
pub const SUMMARY_HIGHLIGHT_CAP: usize = 8;

pub const STATUS_I: Color = Color::rgb8(0x3b, 0xb2, 0x73);
pub const STATUS_NI: Color = Color::rgb8(0xf5, 0xa5, 0x24);
pub const STATUS_NP: Color = Color::rgb8(0x9a, 0xa5, 0xb1);
pub const STATUS_D: Color = Color::rgb8(0xe2, 0x55, 0x55);

pub const INK: Color = Color::rgb8(0x1f, 0x26, 0x33);
pub const INK_MUTED: Color = Color::rgb8(0x6b, 0x74, 0x80);
pub const COVER_BAND: Color = Color::rgb8(0x15, 0x1c, 0x2c);
pub const RULE: Color = Color::rgb8(0xd8, 0xdd, 0xe4);
pub const LINK_BLUE: Color = Color::rgb8(0x06, 0x45, 0xad);

/// Shown wherever the source record lacks a value.
pub const SENTINEL: &str = "Data not found in test data";

// Media fetch policy.
pub const MAX_MEDIA_WORKERS: usize = 12;
pub const CONNECT_TIMEOUT_SECS: u64 = 3;
pub const REQUEST_TIMEOUT_SECS: u64 = 5;
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const THUMB_MAX_W: u32 = 1200;
pub const THUMB_MAX_H: u32 = 900;
pub const JPEG_QUALITY: u8 = 75;

// Form-field binding heuristics.
pub const MIN_COMMENT_FIELD_WIDTH: f32 = 200.0;
pub const MIN_COMMENT_FIELD_HEIGHT: f32 = 40.0;
/// Zero-based page range (inclusive) holding per-item comment fields.
pub const COMMENT_FIELD_PAGES: (usize, usize) = (2, 15);
pub const FIELD_FONT_SIZE: f32 = 9.0;
pub const FIELD_PAD: f32 = 3.0;
pub const CHECK_STROKE_WIDTH: f32 = 1.2;

/// Normalized name suffix -> header slot. Matching is case-insensitive on
/// the trailing component of the fully-qualified field name with spaces and
/// punctuation removed.
pub const HEADER_FIELD_KEYS: &[(&str, HeaderSlot)] = &[
    ("nameofclient", HeaderSlot::ClientName),
    ("clientname", HeaderSlot::ClientName),
    ("dateofinspection", HeaderSlot::InspectionDate),
    ("inspectiondate", HeaderSlot::InspectionDate),
    ("addressofinspectedproperty", HeaderSlot::Address),
    ("propertyaddress", HeaderSlot::Address),
    ("nameofinspector", HeaderSlot::InspectorName),
    ("inspectorname", HeaderSlot::InspectorName),
    ("licensenumber", HeaderSlot::InspectorLicense),
    ("trecno", HeaderSlot::InspectorLicense),
    ("nameofsponsor", HeaderSlot::SponsorName),
    ("sponsorname", HeaderSlot::SponsorName),
    ("sponsorlicensenumber", HeaderSlot::SponsorLicense),
    ("sponsortrecno", HeaderSlot::SponsorLicense),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderSlot {
    ClientName,
    InspectionDate,
    Address,
    InspectorName,
    InspectorLicense,
    SponsorName,
    SponsorLicense,
}

pub fn body_line_height() -> Pt {
    Pt::from_f32(BODY_FONT_SIZE * LINE_HEIGHT_FACTOR)
}

pub fn page_margins() -> Margins {
    Margins::all(PAGE_MARGIN)
}

pub fn status_color(code: &str) -> Color {
    match code {
        "NI" => STATUS_NI,
        "NP" => STATUS_NP,
        "D" => STATUS_D,
        _ => STATUS_I,
    }
}

pub fn status_label(code: &str) -> &'static str {
    match code {
        "I" => "Inspected",
        "NI" => "Not Inspected",
        "NP" => "Not Present",
        "D" => "Deficient",
        _ => "Inspected",
    }
}
