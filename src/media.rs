//! Photo fetching and normalization.
//!
//! Fetches run in parallel on a bounded pool; every failure degrades to an
//! absent image, never an error. Videos are never fetched, only linked.
//! Identical photo URLs are fetched once and shared by every index that
//! references them.

use crate::canvas::JpegImage;
use crate::extract::{MediaKind, MediaRef};
use crate::style;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

pub trait ImageFetcher: Sync {
    /// Returns the raw response body, or `None` for any failure or for
    /// payloads over the size cap.
    fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(style::CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(style::REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    fn attempt(&self, url: &str) -> Result<Option<Vec<u8>>, FetchRetry> {
        let response = self.client.get(url).send().map_err(|err| {
            debug!("fetch transport error for {url}: {err}");
            FetchRetry
        })?;
        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            debug!("fetch got {status} for {url}");
            return Err(FetchRetry);
        }
        if !status.is_success() {
            // 4xx is definitive, no point retrying.
            debug!("fetch got {status} for {url}");
            return Ok(None);
        }
        if let Some(length) = response.content_length() {
            if length > style::MAX_IMAGE_BYTES {
                warn!("skipping oversized image ({length} bytes): {url}");
                return Ok(None);
            }
        }
        let bytes = response.bytes().map_err(|_| FetchRetry)?;
        if bytes.len() as u64 > style::MAX_IMAGE_BYTES {
            warn!("skipping oversized image ({} bytes): {url}", bytes.len());
            return Ok(None);
        }
        Ok(Some(bytes.to_vec()))
    }
}

struct FetchRetry;

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        // One transport-level retry for flaky hosts; nothing beyond that.
        for attempt in 0..2 {
            match self.attempt(url) {
                Ok(result) => return result,
                Err(FetchRetry) if attempt == 0 => continue,
                Err(FetchRetry) => return None,
            }
        }
        None
    }
}

/// Decode, flatten transparency onto white, bound to the thumbnail box and
/// re-encode as baseline JPEG. `None` for anything undecodable.
pub fn normalize_image(bytes: &[u8]) -> Option<JpegImage> {
    let decoded = image::load_from_memory(bytes).ok()?;
    let rgb = flatten_to_white(decoded);
    let (w, h) = rgb.dimensions();
    let rgb = if w > style::THUMB_MAX_W || h > style::THUMB_MAX_H {
        DynamicImage::ImageRgb8(rgb)
            .resize(style::THUMB_MAX_W, style::THUMB_MAX_H, FilterType::Lanczos3)
            .to_rgb8()
    } else {
        rgb
    };
    let (width, height) = rgb.dimensions();
    let mut data = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, style::JPEG_QUALITY);
    rgb.write_with_encoder(encoder).ok()?;
    Some(JpegImage {
        data,
        width,
        height,
    })
}

fn flatten_to_white(decoded: DynamicImage) -> RgbImage {
    match decoded {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            let rgba = other.to_rgba8();
            let (w, h) = rgba.dimensions();
            let mut out = RgbImage::new(w, h);
            for (x, y, pixel) in rgba.enumerate_pixels() {
                let [r, g, b, a] = pixel.0;
                let a = a as u32;
                let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
                out.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
            }
            out
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub kind: MediaKind,
    pub url: String,
    pub image: Option<JpegImage>,
}

/// 1-based media index to fetched entry. Built once, after the parallel
/// fetch joins; drawing only ever reads it.
#[derive(Debug, Default)]
pub struct MediaMap {
    entries: HashMap<usize, MediaEntry>,
}

impl MediaMap {
    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn build_media_map(media: &[MediaRef], fetcher: &dyn ImageFetcher) -> MediaMap {
    let mut map = MediaMap::default();
    if media.is_empty() {
        return map;
    }

    // Unique photo URLs in first-seen order.
    let mut unique: Vec<&str> = Vec::new();
    for m in media {
        if m.kind == MediaKind::Photo && !unique.contains(&m.url.as_str()) {
            unique.push(&m.url);
        }
    }

    let fetched: HashMap<String, Option<JpegImage>> = if unique.is_empty() {
        HashMap::new()
    } else {
        let workers = unique.len().min(style::MAX_MEDIA_WORKERS);
        let fetch_all = || {
            unique
                .par_iter()
                .map(|url| {
                    let image = fetcher.fetch(url).and_then(|bytes| normalize_image(&bytes));
                    (url.to_string(), image)
                })
                .collect()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(fetch_all),
            Err(err) => {
                warn!("media pool unavailable ({err}), fetching on current thread");
                fetch_all()
            }
        }
    };

    for (i, m) in media.iter().enumerate() {
        let index = i + 1;
        let image = match m.kind {
            MediaKind::Photo => fetched.get(&m.url).cloned().flatten(),
            MediaKind::Video => None,
        };
        map.entries.insert(
            index,
            MediaEntry {
                kind: m.kind,
                url: m.url.clone(),
                image,
            },
        );
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(responses: Vec<(&str, Vec<u8>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, url: &str) -> Option<Vec<u8>> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses.get(url).cloned()
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 128]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn refs(urls: &[(&str, MediaKind)]) -> Vec<MediaRef> {
        urls.iter()
            .map(|(url, kind)| MediaRef {
                kind: *kind,
                url: url.to_string(),
            })
            .collect()
    }

    #[test]
    fn indices_follow_discovery_order_not_fetch_order() {
        let fetcher = StubFetcher::new(vec![
            ("https://x/1.png", png_bytes(4, 4)),
            ("https://x/2.png", png_bytes(8, 8)),
        ]);
        let media = refs(&[
            ("https://x/1.png", MediaKind::Photo),
            ("https://x/2.png", MediaKind::Photo),
            ("https://x/v.mp4", MediaKind::Video),
        ]);
        let map = build_media_map(&media, &fetcher);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(1).unwrap().image.as_ref().unwrap().width, 4);
        assert_eq!(map.get(2).unwrap().image.as_ref().unwrap().width, 8);
        assert_eq!(map.get(3).unwrap().kind, MediaKind::Video);
        assert!(map.get(3).unwrap().image.is_none());
    }

    #[test]
    fn failed_fetch_yields_entry_without_image() {
        let fetcher = StubFetcher::new(vec![]);
        let media = refs(&[("https://x/missing.png", MediaKind::Photo)]);
        let map = build_media_map(&media, &fetcher);
        let entry = map.get(1).unwrap();
        assert!(entry.image.is_none());
        assert_eq!(entry.url, "https://x/missing.png");
    }

    #[test]
    fn garbage_bytes_do_not_panic() {
        assert!(normalize_image(b"definitely not an image").is_none());
        assert!(normalize_image(&[]).is_none());
    }

    #[test]
    fn duplicate_photo_urls_fetch_once_and_fan_out() {
        let fetcher = StubFetcher::new(vec![("https://x/same.png", png_bytes(6, 6))]);
        let media = refs(&[
            ("https://x/same.png", MediaKind::Photo),
            ("https://x/same.png", MediaKind::Photo),
        ]);
        let map = build_media_map(&media, &fetcher);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
        assert!(map.get(1).unwrap().image.is_some());
        assert!(map.get(2).unwrap().image.is_some());
    }

    #[test]
    fn videos_are_never_fetched() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        struct Counting;
        impl ImageFetcher for Counting {
            fn fetch(&self, _url: &str) -> Option<Vec<u8>> {
                CALLS.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
        let media = refs(&[("https://x/v.mp4", MediaKind::Video)]);
        build_media_map(&media, &Counting);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transparency_flattens_onto_white() {
        let normalized = normalize_image(&png_bytes(4, 4)).unwrap();
        assert_eq!(normalized.width, 4);
        // Half-transparent red over white should land well above pure red.
        let decoded = image::load_from_memory(&normalized.data).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(1, 1);
        assert!(pixel[1] > 100, "green channel {} too dark", pixel[1]);
    }

    #[test]
    fn oversized_image_downscales_to_thumb_box() {
        let img = image::RgbImage::from_pixel(2400, 600, image::Rgb([9, 9, 9]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        let normalized = normalize_image(&out.into_inner()).unwrap();
        assert!(normalized.width <= style::THUMB_MAX_W);
        assert!(normalized.height <= style::THUMB_MAX_H);
        assert_eq!(normalized.width, 1200);
    }
}
