pub mod backend;
pub mod capture;
pub mod category;
pub mod client;
pub mod config;
pub mod grouping;
pub mod naming;
pub mod output;
pub mod stream;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use category::{Category, DetectedVideoElement, ElementMetadata, categorize};
pub use grouping::{GroupOptions, aggregate, aggregate_with, grouping_key};
pub use naming::{NameStrategy, extract_name};

/// Container/transport kind of a captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamFormat {
    Hls,
    Dash,
    Progressive,
    Segments,
    #[default]
    Unknown,
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFormat::Hls => write!(f, "HLS"),
            StreamFormat::Dash => write!(f, "DASH"),
            StreamFormat::Progressive => write!(f, "PROGRESSIVE"),
            StreamFormat::Segments => write!(f, "SEGMENTS"),
            StreamFormat::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A network resource observed on a page that looks like video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedStream {
    pub url: String,
    #[serde(default)]
    pub format: StreamFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default)]
    pub domain: String,
    /// Capture time in milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: u64,
}

/// Streams believed to be the same underlying video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGroup {
    pub grouping_key: String,
    pub name: String,
    pub domain: String,
    pub streams: Vec<CapturedStream>,
}

impl VideoGroup {
    /// Best quality label among members, by numeric height
    pub fn best_quality(&self) -> Option<&str> {
        self.streams
            .iter()
            .filter_map(|s| s.quality.as_deref())
            .max_by_key(|q| stream::quality_rank(q))
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// First 8 bytes of the SHA-256 of each part, hex encoded. Stable across
/// builds, so separately deployed binaries mint the same identifiers.
pub(crate) fn digest_hex<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hasher.finalize()[..8].iter().map(|b| format!("{b:02x}")).collect()
}
