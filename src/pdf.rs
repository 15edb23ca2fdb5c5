//! PDF serialization.
//!
//! Turns a canvas [`Document`](crate::canvas::Document) into a PDF file via
//! lopdf. Canvas coordinates are top-left origin; everything flips to PDF
//! space here. Fonts are the base-14 pair with WinAnsi encoding, photos are
//! embedded as DCTDecode XObjects deduplicated by content hash.

use crate::canvas::{Command, Document as CanvasDocument, LinkTarget};
use crate::error::ReportError;
use crate::font::Font;
use crate::types::Pt;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

pub fn write_to_file(doc: &CanvasDocument, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let bytes = write_to_bytes(doc)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

pub fn write_to_bytes(doc: &CanvasDocument) -> Result<Vec<u8>, ReportError> {
    let mut pdf = serialize(doc)?;
    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

pub fn serialize(doc: &CanvasDocument) -> Result<Document, ReportError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let helvetica_id = pdf.add_object(base14_font_dict(Font::Helvetica));
    let helvetica_bold_id = pdf.add_object(base14_font_dict(Font::HelveticaBold));

    // Image XObjects, deduplicated by content hash. image_names maps the
    // canvas image id to the resource name shared by identical payloads.
    let mut xobjects = lopdf::Dictionary::new();
    let mut by_hash: HashMap<[u8; 32], String> = HashMap::new();
    let mut image_names: Vec<String> = Vec::with_capacity(doc.images.len());
    for image in &doc.images {
        let hash: [u8; 32] = Sha256::digest(&image.data).into();
        let name = match by_hash.get(&hash) {
            Some(name) => name.clone(),
            None => {
                let name = format!("Im{}", by_hash.len() + 1);
                let stream = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => image.width as i64,
                        "Height" => image.height as i64,
                        "ColorSpace" => "DeviceRGB",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    image.data.clone(),
                );
                let id = pdf.add_object(stream);
                xobjects.set(name.as_bytes(), Object::Reference(id));
                by_hash.insert(hash, name.clone());
                name
            }
        };
        image_names.push(name);
    }

    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Helvetica.resource_name() => Object::Reference(helvetica_id),
            Font::HelveticaBold.resource_name() => Object::Reference(helvetica_bold_id),
        },
        "XObject" => xobjects,
    });

    let page_ids: Vec<ObjectId> = doc.pages.iter().map(|_| pdf.new_object_id()).collect();
    let page_width = doc.page_size.width;
    let page_height = doc.page_size.height;

    for (page, &page_id) in doc.pages.iter().zip(&page_ids) {
        let content = render_content(&page.commands, page_height, &image_names);
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut annots: Vec<Object> = Vec::new();
        for link in &page.links {
            let x1 = link.x;
            let y1 = page_height - link.y - link.height;
            let x2 = link.x + link.width;
            let y2 = page_height - link.y;
            let rect = vec![
                Object::Real(x1.to_f32()),
                Object::Real(y1.to_f32()),
                Object::Real(x2.to_f32()),
                Object::Real(y2.to_f32()),
            ];
            let action = match &link.target {
                LinkTarget::Uri(uri) => dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Link",
                    "Rect" => rect,
                    "Border" => vec![0.into(), 0.into(), 0.into()],
                    "A" => dictionary! {
                        "S" => "URI",
                        "URI" => Object::string_literal(uri.as_str()),
                    },
                },
                LinkTarget::Page(index) => {
                    let target = page_ids.get(*index).copied().unwrap_or(page_id);
                    dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Link",
                        "Rect" => rect,
                        "Border" => vec![0.into(), 0.into(), 0.into()],
                        "Dest" => vec![
                            Object::Reference(target),
                            "XYZ".into(),
                            Object::Null,
                            Object::Null,
                            Object::Null,
                        ],
                    }
                }
            };
            annots.push(Object::Reference(pdf.add_object(action)));
        }

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(page_width.to_f32()),
                Object::Real(page_height.to_f32()),
            ],
            "Resources" => Object::Reference(resources_id),
            "Contents" => Object::Reference(content_id),
        };
        if !annots.is_empty() {
            page_dict.set("Annots", annots);
        }
        pdf.objects.insert(page_id, Object::Dictionary(page_dict));
    }

    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let outlines_id = build_outline(&mut pdf, doc, &page_ids);

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    if let Some(outlines_id) = outlines_id {
        catalog.set("Outlines", Object::Reference(outlines_id));
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = pdf.add_object(catalog);
    pdf.trailer.set("Root", Object::Reference(catalog_id));

    pdf.compress();
    Ok(pdf)
}

fn base14_font_dict(font: Font) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_name(),
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Two-level bookmark tree: level 0 entries hang off the root, deeper
/// levels nest under the preceding level 0 entry.
fn build_outline(
    pdf: &mut Document,
    doc: &CanvasDocument,
    page_ids: &[ObjectId],
) -> Option<ObjectId> {
    if doc.outline.is_empty() {
        return None;
    }
    let root_id = pdf.new_object_id();
    let entry_ids: Vec<ObjectId> = doc.outline.iter().map(|_| pdf.new_object_id()).collect();

    // Group children under their preceding top-level entry.
    let mut top: Vec<usize> = Vec::new();
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, entry) in doc.outline.iter().enumerate() {
        if entry.level == 0 || top.is_empty() {
            top.push(i);
        } else if let Some(&parent) = top.last() {
            children.entry(parent).or_default().push(i);
        }
    }

    let dest = |index: usize| -> Object {
        let page = page_ids
            .get(doc.outline[index].page)
            .copied()
            .unwrap_or(page_ids[0]);
        Object::Array(vec![
            Object::Reference(page),
            "XYZ".into(),
            Object::Null,
            Object::Null,
            Object::Null,
        ])
    };

    let write_entry = |pdf: &mut Document,
                       index: usize,
                       parent: ObjectId,
                       prev: Option<usize>,
                       next: Option<usize>,
                       kids: &[usize]| {
        let mut dict = dictionary! {
            "Title" => Object::string_literal(doc.outline[index].title.as_str()),
            "Parent" => Object::Reference(parent),
            "Dest" => dest(index),
        };
        if let Some(prev) = prev {
            dict.set("Prev", Object::Reference(entry_ids[prev]));
        }
        if let Some(next) = next {
            dict.set("Next", Object::Reference(entry_ids[next]));
        }
        if !kids.is_empty() {
            dict.set("First", Object::Reference(entry_ids[kids[0]]));
            dict.set("Last", Object::Reference(entry_ids[kids[kids.len() - 1]]));
            dict.set("Count", kids.len() as i64);
        }
        pdf.objects
            .insert(entry_ids[index], Object::Dictionary(dict));
    };

    for (pos, &index) in top.iter().enumerate() {
        let prev = if pos > 0 { Some(top[pos - 1]) } else { None };
        let next = top.get(pos + 1).copied();
        let kids = children.remove(&index).unwrap_or_default();
        write_entry(pdf, index, root_id, prev, next, &kids);
        for (kpos, &kid) in kids.iter().enumerate() {
            let kprev = if kpos > 0 { Some(kids[kpos - 1]) } else { None };
            let knext = kids.get(kpos + 1).copied();
            write_entry(pdf, kid, entry_ids[index], kprev, knext, &[]);
        }
    }

    pdf.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => Object::Reference(entry_ids[top[0]]),
            "Last" => Object::Reference(entry_ids[top[top.len() - 1]]),
            "Count" => doc.outline.len() as i64,
        }),
    );
    Some(root_id)
}

fn render_content(commands: &[Command], page_height: Pt, image_names: &[String]) -> String {
    let mut out = String::new();
    let mut font = Font::Helvetica;
    let mut font_size = Pt::from_f32(12.0);
    for command in commands {
        match command {
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => {
                out.push_str(&format!(
                    "{} {} {} rg\n",
                    fmt(color.r),
                    fmt(color.g),
                    fmt(color.b)
                ));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!(
                    "{} {} {} RG\n",
                    fmt(color.r),
                    fmt(color.g),
                    fmt(color.b)
                ));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont { font: f, size } => {
                font = *f;
                font_size = *size;
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::Fill => out.push_str("f\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                let encoded = encode_winansi_pdf_string(text);
                out.push_str(&format!(
                    "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
                    font.resource_name(),
                    fmt_pt(font_size),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                    encoded
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                image_id,
            } => {
                let Some(name) = image_names.get(*image_id) else {
                    continue;
                };
                out.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    name
                ));
            }
        }
    }
    out
}

/// Encodes text as a WinAnsi PDF string literal: cp1252 mapping with '?'
/// for unmappable characters, delimiters escaped, non-printable bytes as
/// octal escapes.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => b'?',
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    format_milli((value as f64 * 1000.0).round() as i64)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, JpegImage};
    use crate::types::Size;

    fn tiny_jpeg() -> JpegImage {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([120, 10, 10]));
        let mut data = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, 75);
        image::DynamicImage::ImageRgb8(img)
            .write_with_encoder(encoder)
            .unwrap();
        JpegImage {
            data,
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn formats_milli_precision() {
        assert_eq!(fmt_pt(Pt::from_f32(10.5)), "10.5");
        assert_eq!(fmt_pt(Pt::from_f32(-0.25)), "-0.25");
        assert_eq!(fmt_pt(Pt::ZERO), "0");
        assert_eq!(fmt_pt(Pt::from_f32(612.0)), "612");
    }

    #[test]
    fn winansi_escapes_and_fallbacks() {
        assert_eq!(encode_winansi_pdf_string("a(b)c"), "a\\(b\\)c");
        assert_eq!(encode_winansi_pdf_string("caf\u{e9}"), "caf\\351");
        assert_eq!(encode_winansi_pdf_string("\u{2014}"), "\\227");
        assert_eq!(encode_winansi_pdf_string("\u{4e2d}"), "?");
    }

    #[test]
    fn round_trips_through_lopdf() {
        let mut canvas = Canvas::new(Size::letter());
        canvas.set_font(Font::Helvetica, Pt::from_f32(10.5));
        canvas.draw_string(Pt::from_f32(54.0), Pt::from_f32(60.0), "Roof Covering");
        canvas.link_uri(
            Pt::from_f32(54.0),
            Pt::from_f32(80.0),
            Pt::from_f32(60.0),
            Pt::from_f32(12.0),
            "https://example.com/v.mp4",
        );
        canvas.bookmark("Roof", 0, 0);
        let doc = canvas.finish();

        let bytes = write_to_bytes(&doc).unwrap();
        let mut parsed = Document::load_mem(&bytes).unwrap();
        parsed.decompress();
        let pages = parsed.get_pages();
        assert_eq!(pages.len(), 1);
        let content = parsed.get_page_content(pages[&1]).unwrap();
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("(Roof Covering) Tj"));
        assert!(content.contains("/F1 10.5 Tf"));

        let catalog = parsed.catalog().unwrap();
        assert!(catalog.get(b"Outlines").is_ok());
    }

    #[test]
    fn identical_images_share_one_xobject() {
        let mut canvas = Canvas::new(Size::letter());
        let a = canvas.register_image(tiny_jpeg());
        let b = canvas.register_image(tiny_jpeg());
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0), a);
        canvas.draw_image(
            Pt::from_f32(20.0),
            Pt::ZERO,
            Pt::from_f32(10.0),
            Pt::from_f32(10.0),
            b,
        );
        let doc = canvas.finish();
        let pdf = serialize(&doc).unwrap();
        let image_count = pdf
            .objects
            .values()
            .filter(|obj| {
                obj.as_stream()
                    .map(|s| {
                        s.dict
                            .get(b"Subtype")
                            .and_then(Object::as_name)
                            .map(|n| n == b"Image")
                            .unwrap_or(false)
                    })
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(image_count, 1);
    }

    #[test]
    fn draw_rect_flips_to_pdf_space() {
        let content = render_content(
            &[
                Command::DrawRect {
                    x: Pt::from_f32(10.0),
                    y: Pt::from_f32(20.0),
                    width: Pt::from_f32(100.0),
                    height: Pt::from_f32(50.0),
                },
                Command::Fill,
            ],
            Pt::from_f32(792.0),
            &[],
        );
        assert_eq!(content, "10 722 100 50 re\nf\n");
    }
}
