//! Inspection JSON parsing and extraction into the report data model.
//!
//! The source format is loosely typed: section numbers arrive as strings or
//! numbers, photo entries as bare URLs or objects, dates as epoch
//! milliseconds. Anything missing or empty falls back to the sentinel string
//! rather than failing the run; only an unreadable document is fatal.

use crate::error::ReportError;
use crate::style;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Header {
    pub client: String,
    pub date: String,
    pub address: String,
    pub inspector: String,
    pub license: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

/// One media reference. Its 1-based index is its position in the discovery
/// order, fixed at extraction time; `[M#k]` markers resolve against it no
/// matter when (or whether) the fetch completes.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub section: String,
    pub section_number: String,
    pub title: String,
    pub status: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Inspection {
    pub header: Header,
    pub items: Vec<Item>,
    pub media: Vec<MediaRef>,
    /// Set when `headerImageUrl` was present; always media index 1.
    pub has_cover_image: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct InspectionJson {
    client_info: NamedJson,
    schedule: ScheduleJson,
    address: AddressJson,
    inspector: InspectorJson,
    header_image_url: Option<String>,
    sections: Vec<SectionJson>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct NamedJson {
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ScheduleJson {
    date: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct AddressJson {
    full_address: Option<String>,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zipcode: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct InspectorJson {
    name: Option<String>,
    license: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SectionJson {
    name: Option<String>,
    section_number: Option<Value>,
    line_items: Vec<LineItemJson>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct LineItemJson {
    inspection_status: Option<String>,
    title: Option<String>,
    name: Option<String>,
    comments: Vec<CommentJson>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct CommentJson {
    comment_text: Option<String>,
    text: Option<String>,
    photos: Vec<MediaItemJson>,
    videos: Vec<MediaItemJson>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MediaItemJson {
    Url(String),
    Object { url: Option<String> },
    Other(Value),
}

impl MediaItemJson {
    fn url(&self) -> Option<&str> {
        let url = match self {
            MediaItemJson::Url(url) => url.as_str(),
            MediaItemJson::Object { url } => url.as_deref()?,
            MediaItemJson::Other(_) => return None,
        };
        let url = url.trim();
        if url.is_empty() { None } else { Some(url) }
    }
}

fn sentinel_or(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => style::SENTINEL.to_string(),
    }
}

fn epoch_ms_to_date(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_i64)
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| style::SENTINEL.to_string())
}

fn value_to_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn address_string(address: &AddressJson) -> String {
    if let Some(full) = address.full_address.as_deref() {
        let full = full.trim();
        if !full.is_empty() && full != style::SENTINEL {
            return full.to_string();
        }
    }
    let parts: Vec<&str> = [
        address.street.as_deref(),
        address.city.as_deref(),
        address.state.as_deref(),
        address.zipcode.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect();
    if parts.is_empty() {
        style::SENTINEL.to_string()
    } else {
        parts.join(" ")
    }
}

/// Parses the raw document. A top-level `inspection` wrapper is accepted
/// and unwrapped.
pub fn parse(json: &str) -> Result<Inspection, ReportError> {
    let mut root: Value = serde_json::from_str(json)?;
    let data = match root.get_mut("inspection") {
        Some(inner) => inner.take(),
        None => root,
    };
    let data: InspectionJson = serde_json::from_value(data)?;
    Ok(extract(data))
}

fn extract(data: InspectionJson) -> Inspection {
    let header = Header {
        client: sentinel_or(data.client_info.name.as_deref()),
        date: epoch_ms_to_date(data.schedule.date.as_ref()),
        address: address_string(&data.address),
        inspector: sentinel_or(data.inspector.name.as_deref()),
        license: data
            .inspector
            .license
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string(),
    };

    let mut media: Vec<MediaRef> = Vec::new();
    let has_cover_image = match data.header_image_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            media.push(MediaRef {
                kind: MediaKind::Photo,
                url: url.to_string(),
            });
            true
        }
        _ => false,
    };

    let mut items = Vec::new();
    for section in data.sections {
        let section_name = section.name.unwrap_or_default();
        let section_number = value_to_string(section.section_number.as_ref());
        for line_item in section.line_items {
            let status = line_item
                .inspection_status
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_uppercase)
                .unwrap_or_else(|| "I".to_string());
            let title = line_item
                .title
                .or(line_item.name)
                .map(|t| t.trim().to_string())
                .unwrap_or_default();

            let mut paragraphs: Vec<String> = Vec::new();
            let mut marker_refs: Vec<usize> = Vec::new();
            for comment in line_item.comments {
                let text = comment
                    .comment_text
                    .or(comment.text)
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default();
                if !text.is_empty() {
                    paragraphs.push(unescape_entities(&text));
                }
                for photo in &comment.photos {
                    if let Some(url) = photo.url() {
                        media.push(MediaRef {
                            kind: MediaKind::Photo,
                            url: url.to_string(),
                        });
                        marker_refs.push(media.len());
                    }
                }
                for video in &comment.videos {
                    if let Some(url) = video.url() {
                        media.push(MediaRef {
                            kind: MediaKind::Video,
                            url: url.to_string(),
                        });
                        marker_refs.push(media.len());
                    }
                }
            }

            let mut body = paragraphs.join("\n\n").trim().to_string();
            if !marker_refs.is_empty() {
                let markers = marker_refs
                    .iter()
                    .map(|idx| format!("[M#{idx}]"))
                    .collect::<Vec<_>>()
                    .join(" ");
                if body.is_empty() {
                    body = markers;
                } else {
                    body = format!("{body}\n\n{markers}");
                }
            }

            items.push(Item {
                section: section_name.clone(),
                section_number: section_number.clone(),
                title,
                status,
                body,
            });
        }
    }

    Inspection {
        header,
        items,
        media,
        has_cover_image,
    }
}

/// Minimal HTML entity unescape for the handful of entities comment text
/// actually carries: the named basics plus numeric forms.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        // Entities are short; a ';' further out than 12 bytes means the '&'
        // was literal text. find() keeps the cut on a char boundary.
        let Some(end) = rest.find(';').filter(|&e| e <= 12) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };
        match replacement {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"{
        "inspection": {
            "clientInfo": {"name": "Jane Roe"},
            "schedule": {"date": 1714521600000},
            "address": {"street": "12 Oak St", "city": "Austin", "state": "TX", "zipcode": "78701"},
            "inspector": {"name": "Pat Lee", "license": "TREC #9999"},
            "sections": [
                {
                    "name": "Roof",
                    "sectionNumber": 2,
                    "lineItems": [
                        {
                            "inspectionStatus": "ni",
                            "title": "Roof Covering",
                            "comments": [
                                {
                                    "commentText": "Shingles &amp; flashing not visible.",
                                    "photos": ["https://example.com/a.jpg", {"url": "https://example.com/b.jpg"}],
                                    "videos": [{"url": "https://example.com/clip.mp4"}]
                                }
                            ]
                        }
                    ]
                }
            ]
        }
    }"#;

    #[test]
    fn extracts_header_with_joined_address() {
        let inspection = parse(SAMPLE).unwrap();
        assert_eq!(inspection.header.client, "Jane Roe");
        assert_eq!(inspection.header.date, "2024-05-01");
        assert_eq!(inspection.header.address, "12 Oak St Austin TX 78701");
        assert_eq!(inspection.header.license, "TREC #9999");
    }

    #[test]
    fn missing_fields_become_sentinel() {
        let inspection = parse("{}").unwrap();
        assert_eq!(inspection.header.client, style::SENTINEL);
        assert_eq!(inspection.header.date, style::SENTINEL);
        assert_eq!(inspection.header.address, style::SENTINEL);
        assert_eq!(inspection.header.license, "");
        assert!(inspection.items.is_empty());
    }

    #[test]
    fn media_indices_are_first_seen_order() {
        let inspection = parse(SAMPLE).unwrap();
        assert_eq!(inspection.media.len(), 3);
        assert_eq!(inspection.media[0].url, "https://example.com/a.jpg");
        assert_eq!(inspection.media[1].url, "https://example.com/b.jpg");
        assert_eq!(inspection.media[2].kind, MediaKind::Video);
        let item = &inspection.items[0];
        assert!(item.body.ends_with("[M#1] [M#2] [M#3]"));
    }

    #[test]
    fn cover_image_takes_index_one() {
        let json = r#"{
            "headerImageUrl": "https://example.com/cover.jpg",
            "sections": [{"lineItems": [{"comments": [{"photos": ["https://example.com/p.jpg"]}]}]}]
        }"#;
        let inspection = parse(json).unwrap();
        assert!(inspection.has_cover_image);
        assert_eq!(inspection.media[0].url, "https://example.com/cover.jpg");
        assert_eq!(inspection.items[0].body, "[M#2]");
    }

    #[test]
    fn status_normalizes_to_uppercase_with_default() {
        let json = r#"{"sections": [{"lineItems": [
            {"inspectionStatus": "d", "title": "A"},
            {"title": "B"}
        ]}]}"#;
        let inspection = parse(json).unwrap();
        assert_eq!(inspection.items[0].status, "D");
        assert_eq!(inspection.items[1].status, "I");
    }

    #[test]
    fn entity_unescape_handles_named_and_numeric() {
        assert_eq!(unescape_entities("a &amp; b"), "a & b");
        assert_eq!(unescape_entities("&#65;&#x42;"), "AB");
        assert_eq!(unescape_entities("5 &lt; 6 &gt; 4"), "5 < 6 > 4");
        assert_eq!(unescape_entities("stray & ampersand"), "stray & ampersand");
        assert_eq!(unescape_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn entity_unescape_survives_multibyte_text_after_ampersand() {
        // No ';' within reach and a non-ASCII char straddling the lookahead
        // window must fall through as literal text, not panic.
        assert_eq!(
            unescape_entities("&abcdefghij\u{2026}"),
            "&abcdefghij\u{2026}"
        );
        assert_eq!(unescape_entities("&caf\u{e9}"), "&caf\u{e9}");
        assert_eq!(unescape_entities("caf\u{e9} &amp; th\u{e9}"), "caf\u{e9} & th\u{e9}");
    }

    #[test]
    fn malformed_document_is_fatal() {
        assert!(parse("not json").is_err());
    }
}
