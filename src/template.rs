//! TREC form template binding.
//!
//! Loads the fixed-layout template, discovers its form widgets, binds header
//! values and item comments onto them, checks the status boxes, then bakes
//! every value into page content and strips the interactive layer so the
//! output cannot be edited.
//!
//! Widget discovery is heuristic by design: the form is third-party, so
//! header fields match by name suffix and comment fields by geometry and
//! page range. The thresholds live in `style` so a template revision is a
//! constant edit, not a code change.

use crate::error::ReportError;
use crate::extract::{Header, Item};
use crate::font::{self, Font};
use crate::style::{self, HeaderSlot};
use crate::types::Pt;
use log::{info, warn};
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, dictionary};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    Checkbox,
    Other,
}

/// A widget lifted out of the annotation tree into plain data, so binding
/// decisions are pure and testable.
#[derive(Debug, Clone)]
pub struct WidgetInfo {
    pub name: String,
    pub page_index: usize,
    pub page_id: LoObjectId,
    pub annot_id: LoObjectId,
    /// [x1, y1, x2, y2] in PDF space, normalized so x1 < x2 and y1 < y2.
    pub rect: [f32; 4],
    pub kind: WidgetKind,
    pub on_state: Option<String>,
}

impl WidgetInfo {
    pub fn width(&self) -> f32 {
        self.rect[2] - self.rect[0]
    }

    pub fn height(&self) -> f32 {
        self.rect[3] - self.rect[1]
    }

    fn top(&self) -> f32 {
        self.rect[3]
    }
}

#[derive(Debug)]
pub struct BindOutcome {
    pub document: LoDocument,
    pub page_count: usize,
    /// Items (or remainders of items) that did not fit the form's comment
    /// fields, in extraction order.
    pub overflow: Vec<Item>,
}

pub fn bind(template_path: &Path, header: &Header, items: &[Item]) -> Result<BindOutcome, ReportError> {
    if !template_path.exists() {
        return Err(ReportError::MissingTemplate(template_path.to_path_buf()));
    }
    let mut doc = LoDocument::load(template_path)
        .map_err(|err| ReportError::MalformedTemplate(err.to_string()))?;
    if doc.is_encrypted() {
        return Err(ReportError::MalformedTemplate(
            "template PDF is encrypted".to_string(),
        ));
    }
    let overflow = bind_document(&mut doc, header, items)?;
    let page_count = doc.get_pages().len();
    Ok(BindOutcome {
        document: doc,
        page_count,
        overflow,
    })
}

pub fn bind_document(
    doc: &mut LoDocument,
    header: &Header,
    items: &[Item],
) -> Result<Vec<Item>, ReportError> {
    let widgets = discover_widgets(doc);
    if widgets.is_empty() {
        warn!("template has no form widgets, output will be the bare form");
    }

    let mut values: Vec<(usize, String)> = Vec::new();

    for (widget_index, value) in bind_header_fields(&widgets, header) {
        values.push((widget_index, value));
    }

    let comment_fields = comment_field_indices(&widgets);
    let mut overflow: Vec<Item> = Vec::new();
    for (slot, item) in items.iter().enumerate() {
        let Some(&widget_index) = comment_fields.get(slot) else {
            overflow.push(item.clone());
            continue;
        };
        let widget = &widgets[widget_index];
        let (kept, remainder) = fill_rect(
            &item.body,
            widget.width(),
            widget.height(),
            Font::Helvetica,
            Pt::from_f32(style::FIELD_FONT_SIZE),
        );
        values.push((widget_index, kept.join("\n")));
        if !remainder.is_empty() {
            warn!(
                "item '{}' overflowed its comment field, {} characters routed to overflow pages",
                item.title,
                remainder.len()
            );
            overflow.push(Item {
                body: remainder,
                ..item.clone()
            });
        }
    }

    let checks = bind_checkboxes(&widgets, items);

    apply_appearance_states(doc, &widgets, &checks)?;
    stamp_values(doc, &widgets, &values, &checks)?;
    strip_widgets(doc)?;
    info!(
        "bound {} field values and {} checkbox groups",
        values.len(),
        checks.len() / 4
    );
    Ok(overflow)
}

/// Walks every page's annotations into `WidgetInfo` records, in page order
/// then annotation-array order.
pub fn discover_widgets(doc: &LoDocument) -> Vec<WidgetInfo> {
    let mut out = Vec::new();
    for (page_index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
        let Ok(page) = doc.get_object(page_id).and_then(LoObject::as_dict) else {
            continue;
        };
        let annots = match page.get(b"Annots") {
            Ok(LoObject::Array(items)) => items.clone(),
            Ok(LoObject::Reference(id)) => doc
                .get_object(*id)
                .and_then(LoObject::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        for annot in annots {
            let LoObject::Reference(annot_id) = annot else {
                continue;
            };
            let Ok(dict) = doc.get_object(annot_id).and_then(LoObject::as_dict) else {
                continue;
            };
            let is_widget = dict
                .get(b"Subtype")
                .and_then(LoObject::as_name)
                .map(|name| name == b"Widget")
                .unwrap_or(false);
            if !is_widget {
                continue;
            }
            let Some(rect) = annot_rect(dict) else {
                continue;
            };
            let kind = match inherited_name_value(doc, dict, b"FT") {
                Some(ft) if ft == b"Tx" => WidgetKind::Text,
                Some(ft) if ft == b"Btn" => WidgetKind::Checkbox,
                _ => WidgetKind::Other,
            };
            out.push(WidgetInfo {
                name: qualified_name(doc, dict),
                page_index,
                page_id,
                annot_id,
                rect,
                kind,
                on_state: appearance_on_state(doc, dict),
            });
        }
    }
    out
}

fn annot_rect(dict: &lopdf::Dictionary) -> Option<[f32; 4]> {
    let rect = dict.get(b"Rect").and_then(LoObject::as_array).ok()?;
    if rect.len() != 4 {
        return None;
    }
    let mut out = [0f32; 4];
    for (slot, obj) in out.iter_mut().zip(rect) {
        *slot = number(obj)?;
    }
    if out[0] > out[2] {
        out.swap(0, 2);
    }
    if out[1] > out[3] {
        out.swap(1, 3);
    }
    Some(out)
}

fn number(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(v) => Some(*v as f32),
        LoObject::Real(v) => Some(*v),
        _ => None,
    }
}

/// Field type and name can live on an ancestor in the field tree; walk the
/// `/Parent` chain until found.
fn inherited_name_value(
    doc: &LoDocument,
    dict: &lopdf::Dictionary,
    key: &[u8],
) -> Option<Vec<u8>> {
    let mut current = dict.clone();
    for _ in 0..8 {
        if let Ok(value) = current.get(key).and_then(LoObject::as_name) {
            return Some(value.to_vec());
        }
        let parent = current.get(b"Parent").ok()?;
        let LoObject::Reference(id) = parent else {
            return None;
        };
        current = doc.get_object(*id).and_then(LoObject::as_dict).ok()?.clone();
    }
    None
}

fn qualified_name(doc: &LoDocument, dict: &lopdf::Dictionary) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = dict.clone();
    for _ in 0..8 {
        if let Ok(t) = current.get(b"T") {
            if let Ok(bytes) = t.as_str() {
                parts.push(String::from_utf8_lossy(bytes).into_owned());
            }
        }
        match current.get(b"Parent") {
            Ok(LoObject::Reference(id)) => {
                let Ok(parent) = doc.get_object(*id).and_then(LoObject::as_dict) else {
                    break;
                };
                current = parent.clone();
            }
            _ => break,
        }
    }
    parts.reverse();
    parts.join(".")
}

/// First `/AP /N` state that is not `Off`.
fn appearance_on_state(doc: &LoDocument, dict: &lopdf::Dictionary) -> Option<String> {
    let ap = match dict.get(b"AP") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .and_then(LoObject::as_dict)
            .ok()?
            .clone(),
        _ => return None,
    };
    let normal = match ap.get(b"N") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .and_then(LoObject::as_dict)
            .ok()?
            .clone(),
        _ => return None,
    };
    for (key, _) in normal.iter() {
        if key.as_slice() != b"Off" {
            return Some(String::from_utf8_lossy(key).into_owned());
        }
    }
    None
}

/// Lowercase alphanumerics only, so `"Name of Client:"` matches
/// `nameofclient`.
pub fn normalize_field_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn header_value(slot: HeaderSlot, header: &Header) -> String {
    match slot {
        HeaderSlot::ClientName => header.client.clone(),
        HeaderSlot::InspectionDate => header.date.clone(),
        HeaderSlot::Address => header.address.clone(),
        HeaderSlot::InspectorName => header.inspector.clone(),
        HeaderSlot::InspectorLicense => header.license.clone(),
        // The input record carries no sponsor data.
        HeaderSlot::SponsorName | HeaderSlot::SponsorLicense => String::new(),
    }
}

pub fn bind_header_fields(widgets: &[WidgetInfo], header: &Header) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    for (index, widget) in widgets.iter().enumerate() {
        if widget.kind != WidgetKind::Text {
            continue;
        }
        let normalized = normalize_field_name(&widget.name);
        if normalized.is_empty() {
            continue;
        }
        for (suffix, slot) in style::HEADER_FIELD_KEYS {
            if normalized.ends_with(suffix) {
                out.push((index, header_value(*slot, header)));
                break;
            }
        }
    }
    out
}

/// Text widgets large enough to be comment boxes on the comment pages,
/// sorted page-ascending then top-down, bound 1:1 to items in extraction
/// order by the caller.
pub fn comment_field_indices(widgets: &[WidgetInfo]) -> Vec<usize> {
    let header_bound: Vec<usize> = widgets
        .iter()
        .enumerate()
        .filter(|(_, w)| {
            let normalized = normalize_field_name(&w.name);
            style::HEADER_FIELD_KEYS
                .iter()
                .any(|(suffix, _)| normalized.ends_with(suffix))
        })
        .map(|(i, _)| i)
        .collect();

    let (first_page, last_page) = style::COMMENT_FIELD_PAGES;
    let mut candidates: Vec<usize> = widgets
        .iter()
        .enumerate()
        .filter(|(index, w)| {
            w.kind == WidgetKind::Text
                && !header_bound.contains(index)
                && w.page_index >= first_page
                && w.page_index <= last_page
                && w.width() >= style::MIN_COMMENT_FIELD_WIDTH
                && w.height() >= style::MIN_COMMENT_FIELD_HEIGHT
        })
        .map(|(index, _)| index)
        .collect();
    candidates.sort_by(|&a, &b| {
        widgets[a]
            .page_index
            .cmp(&widgets[b].page_index)
            .then_with(|| {
                widgets[b]
                    .top()
                    .partial_cmp(&widgets[a].top())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    candidates
}

/// Status position within a checkbox group.
fn status_position(status: &str) -> Option<usize> {
    match status {
        "I" => Some(0),
        "NI" => Some(1),
        "NP" => Some(2),
        "D" => Some(3),
        _ => None,
    }
}

/// Pairs checkbox widgets, taken four at a time in discovery order, with
/// items in extraction order. Returns `(widget_index, on)` for every widget
/// in a complete group; an incomplete trailing group is skipped.
pub fn bind_checkboxes(widgets: &[WidgetInfo], items: &[Item]) -> Vec<(usize, bool)> {
    let boxes: Vec<usize> = widgets
        .iter()
        .enumerate()
        .filter(|(_, w)| w.kind == WidgetKind::Checkbox)
        .map(|(index, _)| index)
        .collect();
    let mut out = Vec::new();
    for (group, item) in boxes.chunks(4).zip(items) {
        if group.len() < 4 {
            break;
        }
        let on_position = status_position(&item.status);
        for (position, &widget_index) in group.iter().enumerate() {
            out.push((widget_index, on_position == Some(position)));
        }
    }
    out
}

/// The fill kernel: wrap `text` into the field's inner box and keep at most
/// `floor(inner_height / line_height)` lines. The rest comes back joined
/// with newlines so it re-wraps to exactly the remaining lines. No
/// truncation marker is drawn; routing the remainder is the caller's job.
pub fn fill_rect(
    text: &str,
    rect_width: f32,
    rect_height: f32,
    font: Font,
    size: Pt,
) -> (Vec<String>, String) {
    let inner_width = rect_width - style::FIELD_PAD * 2.0;
    let inner_height = rect_height - style::FIELD_PAD * 2.0;
    let line_height = size.to_f32() * 1.2;
    if inner_width <= 0.0 || inner_height < line_height {
        return (Vec::new(), text.to_string());
    }
    let capacity = (inner_height / line_height).floor() as usize;
    let mut lines = font::wrap_text(text, font, size, Pt::from_f32(inner_width));
    if lines.len() <= capacity {
        return (lines, String::new());
    }
    let rest = lines.split_off(capacity);
    (lines, rest.join("\n"))
}

fn apply_appearance_states(
    doc: &mut LoDocument,
    widgets: &[WidgetInfo],
    checks: &[(usize, bool)],
) -> Result<(), ReportError> {
    for &(widget_index, on) in checks {
        let widget = &widgets[widget_index];
        let state = if on {
            widget.on_state.clone().unwrap_or_else(|| "Yes".to_string())
        } else {
            "Off".to_string()
        };
        let annot = doc
            .get_object_mut(widget.annot_id)
            .and_then(LoObject::as_dict_mut)?;
        annot.set("AS", LoObject::Name(state.clone().into_bytes()));
        annot.set("V", LoObject::Name(state.into_bytes()));
    }
    Ok(())
}

const STAMP_FONT_RES: &str = "PLHelv";

/// Bakes bound values into page content streams. Widget rects are already
/// in PDF space, so no coordinate flip happens here.
fn stamp_values(
    doc: &mut LoDocument,
    widgets: &[WidgetInfo],
    values: &[(usize, String)],
    checks: &[(usize, bool)],
) -> Result<(), ReportError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Font::Helvetica.base_name(),
        "Encoding" => "WinAnsiEncoding",
    });

    let mut by_page: std::collections::BTreeMap<LoObjectId, String> =
        std::collections::BTreeMap::new();

    let size = Pt::from_f32(style::FIELD_FONT_SIZE);
    let line_height = size.to_f32() * 1.2;
    for (widget_index, value) in values {
        if value.is_empty() {
            continue;
        }
        let widget = &widgets[*widget_index];
        let ops = by_page.entry(widget.page_id).or_default();
        let x = widget.rect[0] + style::FIELD_PAD;
        let mut y = widget.rect[3] - style::FIELD_PAD - size.to_f32();
        ops.push_str(&format!("0 0 0 rg BT /{STAMP_FONT_RES} {} Tf\n", size.to_f32()));
        for line in value.split('\n') {
            ops.push_str(&format!(
                "1 0 0 1 {:.2} {:.2} Tm ({}) Tj\n",
                x,
                y,
                escape_pdf_text(line)
            ));
            y -= line_height;
        }
        ops.push_str("ET\n");
    }

    for &(widget_index, on) in checks {
        if !on {
            continue;
        }
        let widget = &widgets[widget_index];
        let ops = by_page.entry(widget.page_id).or_default();
        let [x1, y1, x2, y2] = widget.rect;
        let inset = 2.0;
        ops.push_str(&format!(
            "q 0 0 0 RG {} w {:.2} {:.2} m {:.2} {:.2} l S {:.2} {:.2} m {:.2} {:.2} l S Q\n",
            style::CHECK_STROKE_WIDTH,
            x1 + inset,
            y1 + inset,
            x2 - inset,
            y2 - inset,
            x1 + inset,
            y2 - inset,
            x2 - inset,
            y1 + inset,
        ));
    }

    for (page_id, ops) in by_page {
        attach_stamp_font(doc, page_id, font_id)?;
        let content = format!("q\n{ops}Q\n").into_bytes();
        doc.add_page_contents(page_id, content)?;
    }
    Ok(())
}

fn attach_stamp_font(
    doc: &mut LoDocument,
    page_id: LoObjectId,
    font_id: LoObjectId,
) -> Result<(), ReportError> {
    let page = doc.get_object(page_id).and_then(LoObject::as_dict)?.clone();
    let mut resources = match page.get(b"Resources") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    };
    fonts.set(STAMP_FONT_RES, LoObject::Reference(font_id));
    resources.set("Font", LoObject::Dictionary(fonts));
    let page_mut = doc
        .get_object_mut(page_id)
        .and_then(LoObject::as_dict_mut)?;
    page_mut.set("Resources", LoObject::Dictionary(resources));
    Ok(())
}

fn escape_pdf_text(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Removes widget annotations from every page and drops the AcroForm so the
/// stamped values are final.
fn strip_widgets(doc: &mut LoDocument) -> Result<(), ReportError> {
    let page_ids: Vec<LoObjectId> = doc.get_pages().values().copied().collect();
    for page_id in page_ids {
        let page = doc.get_object(page_id).and_then(LoObject::as_dict)?.clone();
        let annots = match page.get(b"Annots") {
            Ok(LoObject::Array(items)) => items.clone(),
            Ok(LoObject::Reference(id)) => doc
                .get_object(*id)
                .and_then(LoObject::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => continue,
        };
        let kept: Vec<LoObject> = annots
            .into_iter()
            .filter(|annot| {
                let LoObject::Reference(id) = annot else {
                    return true;
                };
                let Ok(dict) = doc.get_object(*id).and_then(LoObject::as_dict) else {
                    return true;
                };
                dict.get(b"Subtype")
                    .and_then(LoObject::as_name)
                    .map(|name| name != b"Widget")
                    .unwrap_or(true)
            })
            .collect();
        let page_mut = doc
            .get_object_mut(page_id)
            .and_then(LoObject::as_dict_mut)?;
        if kept.is_empty() {
            page_mut.remove(b"Annots");
        } else {
            page_mut.set("Annots", LoObject::Array(kept));
        }
    }

    if let Ok(catalog_id) = doc
        .trailer
        .get(b"Root")
        .and_then(LoObject::as_reference)
    {
        if let Ok(catalog) = doc
            .get_object_mut(catalog_id)
            .and_then(LoObject::as_dict_mut)
        {
            catalog.remove(b"AcroForm");
        }
    }
    doc.prune_objects();
    Ok(())
}

/// Appends every page of `src` after the pages of `dest`. Used to attach
/// the rendered overflow pages to the stamped form.
pub fn append_document_pages(
    dest: &mut LoDocument,
    mut src: LoDocument,
) -> Result<usize, ReportError> {
    let start_id = dest.max_id + 1;
    src.renumber_objects_with(start_id);
    let src_page_ids: Vec<LoObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dest.max_id {
        dest.max_id = src.max_id;
    }
    dest.objects.extend(src.objects);

    let pages_root_id = dest
        .catalog()?
        .get(b"Pages")
        .and_then(LoObject::as_reference)?;
    for &page_id in &src_page_ids {
        let page = dest
            .get_object_mut(page_id)
            .and_then(LoObject::as_dict_mut)?;
        page.set("Parent", LoObject::Reference(pages_root_id));
    }
    let appended = src_page_ids.len();
    let pages_root = dest
        .get_object_mut(pages_root_id)
        .and_then(LoObject::as_dict_mut)?;
    let mut kids = pages_root
        .get(b"Kids")
        .and_then(LoObject::as_array)
        .cloned()
        .unwrap_or_default();
    kids.extend(src_page_ids.into_iter().map(LoObject::Reference));
    let count = kids.len() as i64;
    pages_root.set("Kids", LoObject::Array(kids));
    pages_root.set("Count", count);

    dest.prune_objects();
    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    fn item(status: &str, title: &str, body: &str) -> Item {
        Item {
            section: "Roof".to_string(),
            section_number: "2".to_string(),
            title: title.to_string(),
            status: status.to_string(),
            body: body.to_string(),
        }
    }

    fn header() -> Header {
        Header {
            client: "Jane Roe".to_string(),
            date: "2024-05-01".to_string(),
            address: "12 Oak St".to_string(),
            inspector: "Pat Lee".to_string(),
            license: "9999".to_string(),
        }
    }

    struct TemplateBuilder {
        doc: LoDocument,
        pages_id: LoObjectId,
        page_specs: Vec<Vec<LoObjectId>>,
        field_ids: Vec<LoObjectId>,
    }

    impl TemplateBuilder {
        fn new(page_count: usize) -> Self {
            let mut doc = LoDocument::with_version("1.5");
            let pages_id = doc.new_object_id();
            Self {
                doc,
                pages_id,
                page_specs: vec![Vec::new(); page_count],
                field_ids: Vec::new(),
            }
        }

        fn text_field(&mut self, page: usize, name: &str, rect: [f32; 4]) -> LoObjectId {
            let id = self.doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Tx",
                "T" => LoObject::string_literal(name),
                "Rect" => rect.iter().map(|v| LoObject::Real(*v)).collect::<Vec<_>>(),
            });
            self.page_specs[page].push(id);
            self.field_ids.push(id);
            id
        }

        fn checkbox(&mut self, page: usize, name: &str, rect: [f32; 4]) -> LoObjectId {
            let id = self.doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "FT" => "Btn",
                "T" => LoObject::string_literal(name),
                "Rect" => rect.iter().map(|v| LoObject::Real(*v)).collect::<Vec<_>>(),
                "AP" => dictionary! {
                    "N" => dictionary! {
                        "On" => dictionary!{},
                        "Off" => dictionary!{},
                    },
                },
            });
            self.page_specs[page].push(id);
            self.field_ids.push(id);
            id
        }

        fn build(mut self) -> LoDocument {
            let mut kids = Vec::new();
            for annots in &self.page_specs {
                let content_id = self
                    .doc
                    .add_object(Stream::new(dictionary! {}, Vec::new()));
                let mut page = dictionary! {
                    "Type" => "Page",
                    "Parent" => LoObject::Reference(self.pages_id),
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => LoObject::Reference(content_id),
                };
                if !annots.is_empty() {
                    page.set(
                        "Annots",
                        LoObject::Array(
                            annots.iter().map(|id| LoObject::Reference(*id)).collect(),
                        ),
                    );
                }
                kids.push(LoObject::Reference(self.doc.add_object(page)));
            }
            let count = kids.len() as i64;
            self.doc.objects.insert(
                self.pages_id,
                LoObject::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => kids,
                    "Count" => count,
                }),
            );
            let catalog_id = self.doc.add_object(dictionary! {
                "Type" => "Catalog",
                "Pages" => LoObject::Reference(self.pages_id),
                "AcroForm" => dictionary! {
                    "Fields" => self
                        .field_ids
                        .iter()
                        .map(|id| LoObject::Reference(*id))
                        .collect::<Vec<_>>(),
                },
            });
            self.doc
                .trailer
                .set("Root", LoObject::Reference(catalog_id));
            self.doc
        }
    }

    fn comment_page_template(items_capacity: usize) -> LoDocument {
        let mut builder = TemplateBuilder::new(3);
        builder.text_field(0, "Name of Client", [100.0, 700.0, 400.0, 716.0]);
        builder.text_field(0, "Date of Inspection", [100.0, 670.0, 400.0, 686.0]);
        for slot in 0..items_capacity {
            let top = 700.0 - slot as f32 * 120.0;
            // Four status boxes then the comment field, per form row.
            for b in 0..4 {
                let x = 60.0 + b as f32 * 20.0;
                builder.checkbox(2, &format!("cb_{slot}_{b}"), [x, top, x + 12.0, top + 12.0]);
            }
            builder.text_field(
                2,
                &format!("Comments_{slot}"),
                [60.0, top - 100.0, 560.0, top - 4.0],
            );
        }
        builder.build()
    }

    #[test]
    fn fill_rect_respects_capacity_and_remainder() {
        let size = Pt::from_f32(style::FIELD_FONT_SIZE);
        let line_height = size.to_f32() * 1.2;
        let text = "alpha bravo charlie delta echo foxtrot golf hotel india juliet";
        let rect_h = line_height * 2.0 + style::FIELD_PAD * 2.0 + 0.5;
        let (kept, remainder) = fill_rect(text, 120.0, rect_h, Font::Helvetica, size);
        assert!(kept.len() <= 2);
        assert!(!remainder.is_empty());
        // Re-wrapping kept + remainder reproduces the full sequence.
        let full = font::wrap_text(
            text,
            Font::Helvetica,
            size,
            Pt::from_f32(120.0 - style::FIELD_PAD * 2.0),
        );
        let mut rejoined = kept.clone();
        rejoined.extend(remainder.split('\n').map(str::to_string));
        assert_eq!(rejoined, full);
    }

    #[test]
    fn fill_rect_zero_capacity_keeps_everything_as_remainder() {
        let (kept, remainder) = fill_rect(
            "some text",
            200.0,
            4.0,
            Font::Helvetica,
            Pt::from_f32(style::FIELD_FONT_SIZE),
        );
        assert!(kept.is_empty());
        assert_eq!(remainder, "some text");
    }

    #[test]
    fn discovers_widgets_with_kinds_and_rects() {
        let doc = comment_page_template(1);
        let widgets = discover_widgets(&doc);
        assert_eq!(widgets.len(), 7);
        let texts = widgets
            .iter()
            .filter(|w| w.kind == WidgetKind::Text)
            .count();
        assert_eq!(texts, 3);
        let boxes: Vec<&WidgetInfo> = widgets
            .iter()
            .filter(|w| w.kind == WidgetKind::Checkbox)
            .collect();
        assert_eq!(boxes.len(), 4);
        assert_eq!(boxes[0].on_state.as_deref(), Some("On"));
    }

    #[test]
    fn header_fields_match_by_name_suffix() {
        let doc = comment_page_template(1);
        let widgets = discover_widgets(&doc);
        let bound = bind_header_fields(&widgets, &header());
        assert_eq!(bound.len(), 2);
        let values: Vec<&str> = bound.iter().map(|(_, v)| v.as_str()).collect();
        assert!(values.contains(&"Jane Roe"));
        assert!(values.contains(&"2024-05-01"));
    }

    #[test]
    fn comment_fields_sort_reading_order_and_exclude_header() {
        let doc = comment_page_template(2);
        let widgets = discover_widgets(&doc);
        let fields = comment_field_indices(&widgets);
        assert_eq!(fields.len(), 2);
        // First field is the higher one on the page.
        assert!(widgets[fields[0]].top() > widgets[fields[1]].top());
        for &index in &fields {
            assert!(widgets[index].page_index == 2);
        }
    }

    #[test]
    fn deficient_status_checks_exactly_the_fourth_box() {
        let doc = comment_page_template(1);
        let widgets = discover_widgets(&doc);
        let checks = bind_checkboxes(&widgets, &[item("D", "Roof Covering", "")]);
        assert_eq!(checks.len(), 4);
        let on: Vec<bool> = checks.iter().map(|(_, on)| *on).collect();
        assert_eq!(on, vec![false, false, false, true]);
    }

    #[test]
    fn incomplete_checkbox_group_is_skipped() {
        let mut builder = TemplateBuilder::new(3);
        for b in 0..3 {
            let x = 60.0 + b as f32 * 20.0;
            builder.checkbox(2, &format!("cb_{b}"), [x, 700.0, x + 12.0, 712.0]);
        }
        let doc = builder.build();
        let widgets = discover_widgets(&doc);
        let checks = bind_checkboxes(&widgets, &[item("I", "Roof", "")]);
        assert!(checks.is_empty());
    }

    #[test]
    fn unknown_status_checks_nothing_in_its_group() {
        let doc = comment_page_template(1);
        let widgets = discover_widgets(&doc);
        let checks = bind_checkboxes(&widgets, &[item("X", "Roof", "")]);
        assert_eq!(checks.len(), 4);
        assert!(checks.iter().all(|(_, on)| !on));
    }

    #[test]
    fn bind_document_stamps_flattens_and_routes_overflow() {
        let mut doc = comment_page_template(1);
        let long_body = "word ".repeat(800);
        let items = vec![
            item("NI", "Roof Covering", long_body.trim()),
            item("D", "Flashing", "Second item with no field left. [M#1] [M#2]"),
        ];
        let overflow = bind_document(&mut doc, &header(), &items).unwrap();

        // First item overflowed its field, second had no field at all.
        assert_eq!(overflow.len(), 2);
        assert_eq!(overflow[0].title, "Roof Covering");
        assert!(overflow[1].body.contains("[M#1] [M#2]"));

        // Flattened: no widgets, no AcroForm.
        assert!(discover_widgets(&doc).is_empty());
        assert!(doc.catalog().unwrap().get(b"AcroForm").is_err());

        // Stamped values are in the page content.
        let pages: Vec<LoObjectId> = doc.get_pages().values().copied().collect();
        let first = String::from_utf8_lossy(&doc.get_page_content(pages[0]).unwrap()).to_string();
        assert!(first.contains("(Jane Roe) Tj"));
        let third = String::from_utf8_lossy(&doc.get_page_content(pages[2]).unwrap()).to_string();
        assert!(third.contains("(word word"));
        // NI is the second box: one X drawn.
        assert!(third.contains(" l S "));
    }

    #[test]
    fn missing_template_path_is_fatal() {
        let err = bind(
            Path::new("/nonexistent/trec-template.pdf"),
            &header(),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::MissingTemplate(_)));
    }

    #[test]
    fn append_pages_extends_the_page_tree() {
        let mut dest = comment_page_template(1);
        let src = comment_page_template(1);
        let before = dest.get_pages().len();
        let appended = append_document_pages(&mut dest, src).unwrap();
        assert_eq!(appended, 3);
        assert_eq!(dest.get_pages().len(), before + 3);
    }
}
