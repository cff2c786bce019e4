use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::{CapturedStream, StreamFormat, now_millis};

static FOUR_K: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])(?:4k|2160p)(?:[^a-z]|$)").unwrap());
static HEIGHT_P: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^0-9])(\d{3,4})p(?:[^a-z]|$)").unwrap());
static DIMENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])(\d{3,4})x(\d{3,4})(?:[^0-9]|$)").unwrap());

const PROGRESSIVE_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mov", ".mkv", ".m4v"];
const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s", ".m4f", ".aac"];

impl CapturedStream {
    /// Build a capture record from a URL alone, stamped with the current time
    pub fn new(url: &str) -> Self {
        Self::with_content_type(url, None)
    }

    /// Build a capture record using the response content type as a format hint
    pub fn with_content_type(url: &str, content_type: Option<&str>) -> Self {
        let url = url.trim();
        Self {
            url: url.to_string(),
            format: detect_format(url, content_type),
            quality: detect_quality(url),
            domain: extract_domain(url).unwrap_or_default(),
            timestamp: now_millis(),
        }
    }
}

/// Host component of a URL, if it parses and has one
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_string())
}

fn lowercase_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase(),
    }
}

/// Classify a URL by extension, falling back to the content type
pub fn detect_format(url: &str, content_type: Option<&str>) -> StreamFormat {
    let path = lowercase_path(url);
    let content_type = content_type.map(|c| c.to_lowercase()).unwrap_or_default();

    if path.ends_with(".m3u8") || content_type.contains("mpegurl") {
        return StreamFormat::Hls;
    }
    if path.ends_with(".mpd") || content_type.contains("dash+xml") {
        return StreamFormat::Dash;
    }
    if SEGMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return StreamFormat::Segments;
    }
    if PROGRESSIVE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) || content_type.starts_with("video/") {
        return StreamFormat::Progressive;
    }
    StreamFormat::Unknown
}

/// Guess a quality label from the URL text
pub fn detect_quality(url: &str) -> Option<String> {
    if FOUR_K.is_match(url) {
        return Some("4K".to_string());
    }

    if let Some(height) = HEIGHT_P
        .captures_iter(url)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .find(|h| plausible_height(*h))
    {
        return Some(format!("{height}p"));
    }

    DIMENSIONS
        .captures_iter(url)
        .filter_map(|caps| caps[2].parse::<u32>().ok())
        .find(|h| plausible_height(*h))
        .map(|h| if h >= 2160 { "4K".to_string() } else { format!("{h}p") })
}

fn plausible_height(height: u32) -> bool {
    (144..=4320).contains(&height)
}

/// Numeric ordering key for a quality label; unknown labels rank lowest
pub fn quality_rank(quality: &str) -> u32 {
    if quality.eq_ignore_ascii_case("4k") {
        return 2160;
    }
    quality
        .trim_end_matches(['p', 'P'])
        .parse::<u32>()
        .unwrap_or(0)
}

/// Whether a network response looks like video worth capturing
pub fn is_video_url(url: &str, content_type: Option<&str>) -> bool {
    detect_format(url, content_type) != StreamFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_by_extension() {
        assert_eq!(detect_format("https://a.com/v/master.m3u8?token=1", None), StreamFormat::Hls);
        assert_eq!(detect_format("https://a.com/v/manifest.mpd", None), StreamFormat::Dash);
        assert_eq!(detect_format("https://a.com/v/seg-12.ts", None), StreamFormat::Segments);
        assert_eq!(detect_format("https://a.com/v/movie.MP4", None), StreamFormat::Progressive);
        assert_eq!(detect_format("https://a.com/v/page.html", None), StreamFormat::Unknown);
    }

    #[test]
    fn test_detect_format_by_content_type() {
        assert_eq!(
            detect_format("https://a.com/stream", Some("application/vnd.apple.mpegurl")),
            StreamFormat::Hls
        );
        assert_eq!(
            detect_format("https://a.com/stream", Some("application/dash+xml")),
            StreamFormat::Dash
        );
        assert_eq!(detect_format("https://a.com/stream", Some("video/mp4")), StreamFormat::Progressive);
    }

    #[test]
    fn test_detect_quality() {
        assert_eq!(detect_quality("https://a.com/abc/720p/index.m3u8").as_deref(), Some("720p"));
        assert_eq!(detect_quality("https://a.com/abc_1080p.mp4").as_deref(), Some("1080p"));
        assert_eq!(detect_quality("https://a.com/4k/master.m3u8").as_deref(), Some("4K"));
        assert_eq!(detect_quality("https://a.com/v/1280x720/x.m3u8").as_deref(), Some("720p"));
        assert_eq!(detect_quality("https://a.com/v/master.m3u8"), None);
    }

    #[test]
    fn test_quality_ignores_implausible_numbers() {
        assert_eq!(detect_quality("https://a.com/v/9999p/x.m3u8"), None);
    }

    #[test]
    fn test_quality_rank() {
        assert!(quality_rank("4K") > quality_rank("1080p"));
        assert!(quality_rank("1080p") > quality_rank("720p"));
        assert_eq!(quality_rank("hd"), 0);
    }

    #[test]
    fn test_new_stream_fields() {
        let stream = CapturedStream::new("  https://CDN.Example.com/abc/720p/index.m3u8  ");
        assert_eq!(stream.url, "https://CDN.Example.com/abc/720p/index.m3u8");
        assert_eq!(stream.domain, "cdn.example.com");
        assert_eq!(stream.format, StreamFormat::Hls);
        assert_eq!(stream.quality.as_deref(), Some("720p"));
        assert!(stream.timestamp > 0);
    }

    #[test]
    fn test_malformed_stream_has_empty_domain() {
        let stream = CapturedStream::new("not a url");
        assert_eq!(stream.domain, "");
        assert_eq!(stream.format, StreamFormat::Unknown);
    }

    #[test]
    fn test_is_video_url() {
        assert!(is_video_url("https://a.com/x.m3u8", None));
        assert!(!is_video_url("https://a.com/app.js", Some("text/javascript")));
    }
}
