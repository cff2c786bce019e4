use log::debug;
use serde::{Deserialize, Serialize};

use crate::CapturedStream;

/// Class/id keywords that mark an element as advertising
pub const AD_KEYWORDS: &[&str] = &["ad", "advertisement", "sponsored", "promo", "banner"];

const SMALL_WIDTH: f64 = 300.0;
const SMALL_HEIGHT: f64 = 150.0;
const LARGE_WIDTH: f64 = 400.0;
const LARGE_HEIGHT: f64 = 200.0;

/// Usage category of a detected video element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hidden,
    Advertisement,
    Thumbnail,
    Main,
    Content,
    Secondary,
    /// Synthetic entry for a network stream with no element on the page
    Captured,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Hidden => "hidden",
            Category::Advertisement => "advertisement",
            Category::Thumbnail => "thumbnail",
            Category::Main => "main",
            Category::Content => "content",
            Category::Secondary => "secondary",
            Category::Captured => "captured",
        };
        write!(f, "{s}")
    }
}

/// What kind of page node carried the video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    #[default]
    Video,
    Iframe,
    /// Non-standard player container
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Attributes already extracted from a page element by the scanner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementMetadata {
    pub kind: ElementKind,
    pub src: Option<String>,
    /// Position of the node in the document tree, e.g. `body>div:2>video:0`
    pub dom_path: Option<String>,
    pub width: f64,
    pub height: f64,
    pub display: Option<String>,
    pub visibility: Option<String>,
    pub opacity: Option<f64>,
    pub has_controls: bool,
    pub is_playing: bool,
    pub is_autoplay: bool,
    pub rect: Option<Rect>,
    pub viewport: Option<Viewport>,
    pub class_name: Option<String>,
    pub id: Option<String>,
    pub parent_class_name: Option<String>,
}

impl ElementMetadata {
    pub fn is_visible(&self) -> bool {
        let displayed = self.display.as_deref().is_none_or(|d| !d.eq_ignore_ascii_case("none"));
        let shown = self.visibility.as_deref().is_none_or(|v| !v.eq_ignore_ascii_case("hidden"));
        let opaque = self.opacity.is_none_or(|o| o > 0.0);
        displayed && shown && opaque
    }

    fn is_small(&self) -> bool {
        self.width < SMALL_WIDTH || self.height < SMALL_HEIGHT
    }

    fn is_large(&self) -> bool {
        self.width > LARGE_WIDTH && self.height > LARGE_HEIGHT
    }

    fn is_centered(&self) -> bool {
        let (Some(rect), Some(viewport)) = (self.rect, self.viewport) else {
            return false;
        };
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return false;
        }
        let cx = (rect.left + rect.width / 2.0) / viewport.width;
        let cy = (rect.top + rect.height / 2.0) / viewport.height;
        (0.2..=0.8).contains(&cx) && (0.1..=0.9).contains(&cy)
    }

    fn matches_keywords(&self, keywords: &[&str]) -> bool {
        [&self.class_name, &self.id, &self.parent_class_name]
            .into_iter()
            .flatten()
            .flat_map(|s| class_tokens(s))
            .any(|token| {
                keywords
                    .iter()
                    .any(|k| token == *k || token.strip_suffix('s') == Some(*k))
            })
    }
}

/// Lowercased words of a class or id string. Splits on non-alphanumerics and
/// on camelCase humps, so `videoAdSlot` yields `video`, `ad`, `slot`.
fn class_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in raw.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in word.chars() {
            if c.is_ascii_uppercase() && prev_lower {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_ascii_lowercase();
            current.push(c.to_ascii_lowercase());
        }
        tokens.push(current);
    }
    tokens
}

/// Categorize an element using the built-in ad keywords
pub fn categorize(meta: &ElementMetadata) -> Category {
    categorize_with(meta, &[])
}

/// Categorize an element; `extra_keywords` extend the built-in ad keyword set.
/// Rules are checked in a fixed order and the first match wins.
pub fn categorize_with(meta: &ElementMetadata, extra_keywords: &[String]) -> Category {
    if !meta.is_visible() || meta.width <= 0.0 || meta.height <= 0.0 {
        return Category::Hidden;
    }

    let mut keywords: Vec<&str> = AD_KEYWORDS.to_vec();
    keywords.extend(extra_keywords.iter().map(|k| k.as_str()));

    let small = meta.is_small();
    let large = meta.is_large();

    if meta.matches_keywords(&keywords) || (meta.is_autoplay && !meta.has_controls && small) {
        return Category::Advertisement;
    }
    if small && !meta.has_controls {
        return Category::Thumbnail;
    }
    if meta.is_playing && large && meta.has_controls {
        return Category::Main;
    }
    if meta.is_centered() && large {
        return Category::Main;
    }
    if large && meta.has_controls {
        return Category::Content;
    }
    Category::Secondary
}

/// Quality label implied by rendered pixel height
pub fn estimate_quality(width: f64, height: f64) -> &'static str {
    let h = height.max(width * 9.0 / 16.0);
    match h {
        h if h >= 2160.0 => "4K",
        h if h >= 1440.0 => "1440p",
        h if h >= 1080.0 => "1080p",
        h if h >= 720.0 => "720p",
        h if h >= 480.0 => "480p",
        h if h >= 360.0 => "360p",
        _ => "SD",
    }
}

/// Recognize embedded players of well-known platforms by source URL
pub fn detect_platform(src: &str) -> Option<&'static str> {
    let host = crate::stream::extract_domain(src)?;
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    if host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com")
    {
        Some("youtube")
    } else if host == "vimeo.com" || host.ends_with(".vimeo.com") {
        Some("vimeo")
    } else {
        None
    }
}

/// A playable unit found on the page, or synthesized from a captured stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedVideoElement {
    pub id: String,
    pub kind: ElementKind,
    pub src: Option<String>,
    pub width: f64,
    pub height: f64,
    pub visible: bool,
    pub has_controls: bool,
    pub is_playing: bool,
    pub is_autoplay: bool,
    pub quality: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<CapturedStream>,
}

impl DetectedVideoElement {
    /// Build a detected element from scanner metadata at the given scan index
    pub fn from_metadata(meta: &ElementMetadata, scan_index: usize, extra_keywords: &[String]) -> Self {
        Self {
            id: element_identity(meta, scan_index),
            kind: meta.kind,
            src: meta.src.clone(),
            width: meta.width,
            height: meta.height,
            visible: meta.is_visible(),
            has_controls: meta.has_controls,
            is_playing: meta.is_playing,
            is_autoplay: meta.is_autoplay,
            quality: estimate_quality(meta.width, meta.height).to_string(),
            category: categorize_with(meta, extra_keywords),
            platform: meta.src.as_deref().and_then(detect_platform).map(|p| p.to_string()),
            streams: Vec::new(),
        }
    }

    /// Synthetic entry for a stream seen on the network with no page element
    pub fn captured(stream: &CapturedStream) -> Self {
        Self {
            id: format!("captured-{}", hash_hex(&stream.url)),
            kind: ElementKind::Custom,
            src: Some(stream.url.clone()),
            width: 0.0,
            height: 0.0,
            visible: false,
            has_controls: false,
            is_playing: false,
            is_autoplay: false,
            quality: stream.quality.clone().unwrap_or_else(|| "unknown".to_string()),
            category: Category::Captured,
            platform: detect_platform(&stream.url).map(|p| p.to_string()),
            streams: vec![stream.clone()],
        }
    }
}

/// Identity from source and tree position, so relayout does not mint a new element.
/// The scan index only stands in when neither is known.
pub fn element_identity(meta: &ElementMetadata, scan_index: usize) -> String {
    let basis = match (meta.src.as_deref(), meta.dom_path.as_deref()) {
        (None, None) => format!("scan:{scan_index}"),
        (src, path) => format!("{}|{}", src.unwrap_or_default(), path.unwrap_or_default()),
    };
    format!("video-{}", hash_hex(&basis))
}

fn hash_hex(value: &str) -> String {
    crate::digest_hex([value])
}

/// Categorize every element, dropping repeats that share an identity
pub fn detect_all(elements: &[ElementMetadata], extra_keywords: &[String]) -> Vec<DetectedVideoElement> {
    let mut detected: Vec<DetectedVideoElement> = Vec::new();
    for (i, meta) in elements.iter().enumerate() {
        let element = DetectedVideoElement::from_metadata(meta, i, extra_keywords);
        if detected.iter().any(|d| d.id == element.id) {
            debug!("Skipping duplicate element {}", element.id);
            continue;
        }
        detected.push(element);
    }
    detected
}
