use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::CapturedStream;

const DEFAULT_NAME: &str = "Video Stream";

static QUALITY_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^\d{3,4}p$").unwrap());
static MEDIA_EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(?:mp4|webm|m3u8).*$").unwrap());

/// How a group's display name is chosen from its members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameStrategy {
    /// Use the first member's URL only
    #[default]
    FirstStream,
    /// Majority vote over every member's URL, earliest member breaks ties
    Consensus,
}

/// Human readable label for a group, from its first stream or its key
pub fn extract_name(grouping_key: &str, streams: &[CapturedStream]) -> String {
    extract_name_with(grouping_key, streams, NameStrategy::FirstStream)
}

pub fn extract_name_with(grouping_key: &str, streams: &[CapturedStream], strategy: NameStrategy) -> String {
    let from_streams = match strategy {
        NameStrategy::FirstStream => streams.first().and_then(|s| name_from_url(&s.url)),
        NameStrategy::Consensus => consensus_name(streams),
    };

    from_streams
        .or_else(|| name_from_key(grouping_key, streams.first().map(|s| s.domain.as_str())))
        .unwrap_or_else(|| DEFAULT_NAME.to_string())
}

fn consensus_name(streams: &[CapturedStream]) -> Option<String> {
    let mut tally: Vec<(String, usize)> = Vec::new();
    for name in streams.iter().filter_map(|s| name_from_url(&s.url)) {
        match tally.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => tally.push((name, 1)),
        }
    }

    // max_by_key returns the last maximum; iterate reversed so ties go to the earliest
    tally
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(name, _)| name)
}

fn is_technical_segment(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    lower.ends_with(".m3u8")
        || lower.ends_with(".mpd")
        || lower.contains("playlist")
        || lower.contains("chunklist")
        || lower == "master"
        || lower == "index"
        || QUALITY_SEGMENT.is_match(segment)
}

fn name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty() && !is_technical_segment(s))
        .filter(|s| s.len() > 3 && !s.chars().all(|c| c.is_ascii_digit()))
        .map(clean)
        .find(|name| !name.is_empty())
}

fn name_from_key(grouping_key: &str, domain: Option<&str>) -> Option<String> {
    if grouping_key.starts_with("unknown-") {
        return None;
    }

    let domain = match domain.filter(|d| !d.is_empty()) {
        Some(d) => d,
        None => grouping_key.split(['-', '/']).next().unwrap_or_default(),
    };

    let rest = grouping_key
        .strip_prefix(domain)
        .unwrap_or(grouping_key)
        .trim_start_matches(['-', '/']);

    let name = clean(rest);
    (!name.is_empty()).then_some(name)
}

fn clean(raw: &str) -> String {
    let spaced = raw.replace(['_', '-'], " ");
    MEDIA_EXTENSION.replace(&spaced, "").trim().to_string()
}
