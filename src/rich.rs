//! Inline media token resolution.
//!
//! Item bodies carry `[M#<n>]` markers referencing the document-wide media
//! list. This module turns a body string into the flowable sequence that
//! renders it: wrapped paragraphs interleaved with inline photos, video
//! links and placeholders.

use crate::extract::MediaKind;
use crate::flowable::{Flowable, LinkFlowable, Paragraph, PhotoFlowable};
use crate::media::MediaMap;
use crate::style;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref MEDIA_TOKEN_RE: Regex = Regex::new(r"\[M#(\d+)\]").expect("media token pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Media(usize),
}

/// Splits a body into text runs and media references, in textual order.
/// Text runs are trimmed of surrounding whitespace; whitespace-only runs
/// between consecutive markers are dropped.
pub fn tokenize(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pos = 0;
    for found in MEDIA_TOKEN_RE.find_iter(body) {
        let pre = &body[pos..found.start()];
        if !pre.trim().is_empty() {
            segments.push(Segment::Text(pre.trim().to_string()));
        }
        let digits = &found.as_str()[3..found.as_str().len() - 1];
        if let Ok(index) = digits.parse::<usize>() {
            segments.push(Segment::Media(index));
        }
        pos = found.end();
    }
    let tail = &body[pos..];
    if !tail.trim().is_empty() {
        segments.push(Segment::Text(tail.trim().to_string()));
    }
    segments
}

/// Canvas image ids for resolved media indices. Built by the assembler when
/// it registers the fetched images on the document.
#[derive(Debug, Default)]
pub struct MediaImageIds {
    ids: HashMap<usize, usize>,
}

impl MediaImageIds {
    pub fn insert(&mut self, media_index: usize, image_id: usize) {
        self.ids.insert(media_index, image_id);
    }

    pub fn get(&self, media_index: usize) -> Option<usize> {
        self.ids.get(&media_index).copied()
    }
}

/// Renders one body into flowables. `verbose_media` additionally prints raw
/// video URLs under their labels.
pub fn body_flowables(
    body: &str,
    media: &MediaMap,
    image_ids: &MediaImageIds,
    verbose_media: bool,
) -> Vec<Box<dyn Flowable>> {
    let mut flowables: Vec<Box<dyn Flowable>> = Vec::new();
    for segment in tokenize(body) {
        match segment {
            Segment::Text(text) => {
                flowables.push(Box::new(Paragraph::body(text)));
            }
            Segment::Media(index) => match media.get(index) {
                None => {
                    flowables.push(Box::new(placeholder(format!("M#{index}: (missing)"))));
                }
                Some(entry) => match entry.kind {
                    MediaKind::Photo => match (&entry.image, image_ids.get(index)) {
                        (Some(image), Some(image_id)) => {
                            flowables.push(Box::new(PhotoFlowable::new(
                                image_id,
                                image.width,
                                image.height,
                                format!("M#{index}: photo"),
                            )));
                        }
                        _ => {
                            flowables
                                .push(Box::new(placeholder(format!("M#{index}: (unavailable)"))));
                        }
                    },
                    MediaKind::Video => {
                        flowables.push(Box::new(LinkFlowable::new(
                            format!("Video M#{index}"),
                            entry.url.clone(),
                            verbose_media,
                        )));
                    }
                },
            },
        }
    }
    flowables
}

fn placeholder(text: String) -> Paragraph {
    Paragraph::new(
        text,
        crate::font::Font::HelveticaBold,
        crate::types::Pt::from_f32(style::BODY_FONT_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MediaRef;
    use crate::media::{ImageFetcher, build_media_map};
    use pretty_assertions::assert_eq;

    struct NoFetch;
    impl ImageFetcher for NoFetch {
        fn fetch(&self, _url: &str) -> Option<Vec<u8>> {
            None
        }
    }

    #[test]
    fn tokenize_splits_text_and_markers() {
        let segments = tokenize("Cracked tile noted.\n\n[M#3] [M#4]");
        assert_eq!(
            segments,
            vec![
                Segment::Text("Cracked tile noted.".to_string()),
                Segment::Media(3),
                Segment::Media(4),
            ]
        );
    }

    #[test]
    fn tokenize_keeps_interleaved_text() {
        let segments = tokenize("before [M#1] middle [M#2] after");
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("before".to_string()));
        assert_eq!(segments[2], Segment::Text("middle".to_string()));
        assert_eq!(segments[4], Segment::Text("after".to_string()));
    }

    #[test]
    fn non_token_brackets_pass_through() {
        let segments = tokenize("see [M#] and [X#2] markers");
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text(_)));
    }

    #[test]
    fn plain_text_is_single_segment() {
        assert_eq!(
            tokenize("no markers here"),
            vec![Segment::Text("no markers here".to_string())]
        );
    }

    #[test]
    fn unknown_index_becomes_missing_placeholder() {
        let media = build_media_map(&[], &NoFetch);
        let flowables = body_flowables("[M#7]", &media, &MediaImageIds::default(), false);
        assert_eq!(flowables.len(), 1);
    }

    #[test]
    fn failed_photo_becomes_unavailable_placeholder() {
        let refs = vec![MediaRef {
            kind: MediaKind::Photo,
            url: "https://x/404.jpg".to_string(),
        }];
        let media = build_media_map(&refs, &NoFetch);
        // One placeholder flowable, no panic, no error surface.
        let flowables = body_flowables("[M#1]", &media, &MediaImageIds::default(), false);
        assert_eq!(flowables.len(), 1);
    }

    #[test]
    fn video_renders_as_link() {
        let refs = vec![MediaRef {
            kind: MediaKind::Video,
            url: "https://x/walkthrough.mp4".to_string(),
        }];
        let media = build_media_map(&refs, &NoFetch);
        let flowables = body_flowables(
            "Intro text.\n\n[M#1]",
            &media,
            &MediaImageIds::default(),
            false,
        );
        assert_eq!(flowables.len(), 2);
    }
}
