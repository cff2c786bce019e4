use std::collections::HashMap;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use url::Url;

use crate::naming::{NameStrategy, extract_name_with};
use crate::{CapturedStream, VideoGroup};

/// Explicit video ID patterns, tried against the URL path in order
static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/video[_-]([a-z0-9]+)",
        r"(?i)/watch[_-]([a-z0-9]+)",
        r"(?i)/v[_-]([a-z0-9]+)",
        r"/([A-Za-z0-9]{8,})/",
        r"segment-([A-Za-z0-9]{6,})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Quality, manifest and segment suffixes, stripped from the path in order
static STRIP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)/\d{3,4}p/.*$",
        r"(?i)/(?:playlist|index|master)\.m3u8$",
        r"(?i)/[^/]*\.m3u8$",
        r"(?i)/[^/]*\.mpd$",
        r"(?i)/chunklist[^/]*$",
        r"(?i)/seg-\d+[^/]*$",
        r"/\d+[_-]\d+$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TIMESTAMP_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+[_-]\d+").unwrap());
static QUALITY_DIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\d{3,4}p$").unwrap());
static TIMESTAMP_OR_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])(\d{10,13}|\d{4}-\d{2}-\d{2})(?:[^0-9]|$)").unwrap()
});

/// Knobs for an aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOptions {
    pub name_strategy: NameStrategy,
}

/// Derive the key that clusters URLs of the same logical video.
///
/// Strategies, first hit wins: explicit ID in the path, path with quality and
/// manifest suffixes stripped, nearest meaningful parent directory, embedded
/// timestamp or date, first path segment. URLs that do not parse (or have no
/// host) get `unknown-<hash>`, which never collides with a real key.
pub fn grouping_key(url: &str) -> String {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => parsed,
        _ => {
            warn!("Unparsable stream URL, isolating: {url}");
            return fallback_key(url);
        }
    };

    let domain = parsed.host_str().unwrap_or_default();
    let path = parsed.path();

    explicit_id(path)
        .map(|id| format!("{domain}-{id}"))
        .or_else(|| base_path(path).map(|base| format!("{domain}{base}")))
        .or_else(|| parent_directory(path).map(|dir| format!("{domain}-{dir}")))
        .or_else(|| timestamp_prefix(parsed.as_str()).map(|ts| format!("{domain}-{ts}")))
        .unwrap_or_else(|| match segments(path).first() {
            Some(first) => format!("{domain}-{first}"),
            None => domain.to_string(),
        })
}

fn fallback_key(url: &str) -> String {
    format!("unknown-{}", crate::digest_hex([url]))
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn explicit_id(path: &str) -> Option<&str> {
    ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(path).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

fn base_path(path: &str) -> Option<String> {
    let stripped = STRIP_PATTERNS
        .iter()
        .fold(path.to_string(), |acc, re| re.replace(&acc, "").into_owned());
    let base = stripped.trim_end_matches('/');
    (base.len() > 5).then(|| base.to_string())
}

fn is_technical_segment(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    segment.contains('.')
        || segment.chars().all(|c| c.is_ascii_digit())
        || lower.contains("playlist")
        || lower.contains("chunklist")
        || lower.contains("seg-")
        || TIMESTAMP_PAIR.is_match(segment)
        || QUALITY_DIR.is_match(segment)
}

fn parent_directory(path: &str) -> Option<String> {
    let segments = segments(path);
    let index = segments
        .iter()
        .rposition(|s| !is_technical_segment(s) && s.len() > 3)?;
    Some(segments[..=index].join("/"))
}

fn timestamp_prefix(url: &str) -> Option<String> {
    let caps = TIMESTAMP_OR_DATE.captures(url)?;
    Some(caps[1].chars().take(8).collect())
}

/// Group streams with the default options
pub fn aggregate(streams: &[CapturedStream]) -> Vec<VideoGroup> {
    aggregate_with(streams, &GroupOptions::default())
}

/// Partition streams into groups by key, name each group, and order the
/// result by member count, largest first. Ties keep first-seen order.
pub fn aggregate_with(streams: &[CapturedStream], options: &GroupOptions) -> Vec<VideoGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<VideoGroup> = Vec::new();

    for stream in streams {
        let key = grouping_key(&stream.url);
        match index.get(&key) {
            Some(&i) => groups[i].streams.push(stream.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(VideoGroup {
                    grouping_key: key,
                    name: String::new(),
                    domain: stream.domain.clone(),
                    streams: vec![stream.clone()],
                });
            }
        }
    }

    for group in &mut groups {
        group.name = extract_name_with(&group.grouping_key, &group.streams, options.name_strategy);
    }

    groups.sort_by(|a, b| b.streams.len().cmp(&a.streams.len()));

    debug!("Grouped {} streams into {} videos", streams.len(), groups.len());
    groups
}
