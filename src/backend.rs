use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::grouping::{GroupOptions, aggregate_with};
use crate::{CapturedStream, VideoGroup};

/// Static file every download is redirected to
pub const SAMPLE_FILE_PATH: &str = "/static/sample.mp4";

/// What the page told us about the chosen video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Site cookie forwarded for authenticated streams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
}

/// Manifest URL entry, either a bare string or a capture record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamInput {
    Url(String),
    Record {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        domain: Option<String>,
        #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
}

/// Accept a timestamp as an integer, float or numeric string; anything else
/// is dropped rather than failing the whole request.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let timestamp = match &value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    if timestamp.is_none() && value.as_ref().is_some_and(|v| !v.is_null()) {
        debug!("Ignoring unusable stream timestamp: {value:?}");
    }
    Ok(timestamp)
}

impl StreamInput {
    pub fn url(&self) -> &str {
        match self {
            StreamInput::Url(url) | StreamInput::Record { url, .. } => url,
        }
    }

    /// Rebuild a capture record, keeping any fields the sender supplied
    pub fn to_captured(&self) -> CapturedStream {
        let mut stream = CapturedStream::new(self.url());
        if let StreamInput::Record {
            quality,
            domain,
            timestamp,
            ..
        } = self
        {
            if quality.is_some() {
                stream.quality = quality.clone();
            }
            if let Some(domain) = domain.as_ref().filter(|d| !d.is_empty()) {
                stream.domain = domain.clone();
            }
            if let Some(ts) = timestamp {
                stream.timestamp = *ts;
            }
        }
        stream
    }
}

impl From<&CapturedStream> for StreamInput {
    fn from(stream: &CapturedStream) -> Self {
        StreamInput::Record {
            url: stream.url.clone(),
            quality: stream.quality.clone(),
            domain: Some(stream.domain.clone()),
            timestamp: Some(stream.timestamp),
        }
    }
}

/// Body of a process request sent to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessRequest {
    pub video_info: VideoInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<Cookie>,
    pub m3u8_urls: Vec<StreamInput>,
}

impl ProcessRequest {
    pub fn new(video_info: VideoInfo, cookies: Vec<Cookie>, streams: &[CapturedStream]) -> Self {
        Self {
            video_info,
            cookies,
            m3u8_urls: streams.iter().map(StreamInput::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub process_id: String,
    pub message: String,
    pub grouped_videos: Vec<VideoGroup>,
}

/// Accept a process request. Nothing is fetched; the manifest URLs are
/// regrouped and an identifier is minted for the download redirect.
pub fn handle_process(request: &ProcessRequest, now_ms: u64, options: &GroupOptions) -> ProcessResponse {
    info!(
        "Process request: src={} title={} manifests={} cookies={}",
        request.video_info.src.as_deref().unwrap_or("-"),
        request.video_info.title.as_deref().unwrap_or("-"),
        request.m3u8_urls.len(),
        request.cookies.len(),
    );

    let streams: Vec<CapturedStream> = request.m3u8_urls.iter().map(StreamInput::to_captured).collect();
    let grouped_videos = aggregate_with(&streams, options);
    let process_id = process_id(request, now_ms);

    debug!("Minted {process_id} with {} grouped videos", grouped_videos.len());

    ProcessResponse {
        success: true,
        message: format!(
            "Processing started for {} stream(s) in {} video(s)",
            streams.len(),
            grouped_videos.len()
        ),
        process_id,
        grouped_videos,
    }
}

fn process_id(request: &ProcessRequest, now_ms: u64) -> String {
    let src = request.video_info.src.as_deref().unwrap_or_default();
    let parts = std::iter::once(src).chain(request.m3u8_urls.iter().map(StreamInput::url));
    format!("proc_{now_ms}_{}", &crate::digest_hex(parts)[..8])
}

/// Where a download for `process_id` is served from
pub fn download_redirect(base_url: &str, process_id: &str) -> String {
    debug!("Download requested for {process_id}, redirecting to sample file");
    format!("{}{SAMPLE_FILE_PATH}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "videoInfo": {"src": "blob:https://site.com/1", "title": "Pilot", "pageUrl": "https://site.com/watch"},
        "cookies": [{"name": "sid", "value": "x", "domain": ".site.com", "httpOnly": true}],
        "m3u8Urls": [
            "https://cdn.site.com/abc12345/720p/index.m3u8",
            {"url": "https://cdn.site.com/abc12345/1080p/index.m3u8", "quality": "1080p"},
            "https://ads.site.com/zzzzzzzz/master.m3u8"
        ]
    }"#;

    #[test]
    fn test_parse_request() {
        let request: ProcessRequest = serde_json::from_str(BODY).unwrap();
        assert_eq!(request.video_info.title.as_deref(), Some("Pilot"));
        assert_eq!(request.cookies.len(), 1);
        assert!(request.cookies[0].http_only);
        assert_eq!(request.m3u8_urls.len(), 3);
        assert!(matches!(request.m3u8_urls[1], StreamInput::Record { .. }));
    }

    #[test]
    fn test_odd_timestamps_do_not_reject_request() {
        let body = r#"{
            "m3u8Urls": [
                {"url": "https://cdn.site.com/abc12345/720p/index.m3u8", "timestamp": 1700000000123.7},
                {"url": "https://cdn.site.com/abc12345/1080p/index.m3u8", "timestamp": "2024-05-01T10:00:00Z"},
                {"url": "https://cdn.site.com/abc12345/480p/index.m3u8", "timestamp": "1700000000999"},
                {"url": "https://cdn.site.com/abc12345/360p/index.m3u8", "timestamp": null}
            ]
        }"#;
        let request: ProcessRequest = serde_json::from_str(body).unwrap();
        let timestamps: Vec<Option<u64>> = request
            .m3u8_urls
            .iter()
            .map(|input| match input {
                StreamInput::Record { timestamp, .. } => *timestamp,
                StreamInput::Url(_) => panic!("expected a record"),
            })
            .collect();
        assert_eq!(timestamps, vec![Some(1_700_000_000_123), None, Some(1_700_000_000_999), None]);

        let response = handle_process(&request, 1, &GroupOptions::default());
        assert_eq!(response.grouped_videos.len(), 1);
        assert_eq!(response.grouped_videos[0].streams.len(), 4);
        assert!(response.grouped_videos[0].streams[1].timestamp > 0);
    }

    #[test]
    fn test_process_id_is_stable() {
        let request: ProcessRequest = serde_json::from_str(BODY).unwrap();
        assert_eq!(process_id(&request, 9), process_id(&request.clone(), 9));
        assert_eq!(process_id(&request, 9).len(), "proc_9_".len() + 8);
    }

    #[test]
    fn test_parse_minimal_request() {
        let request: ProcessRequest = serde_json::from_str("{}").unwrap();
        assert!(request.m3u8_urls.is_empty());
        let response = handle_process(&request, 1, &GroupOptions::default());
        assert!(response.success);
        assert!(response.grouped_videos.is_empty());
    }

    #[test]
    fn test_handle_process_groups_manifests() {
        let request: ProcessRequest = serde_json::from_str(BODY).unwrap();
        let response = handle_process(&request, 1_700_000_000_000, &GroupOptions::default());
        assert!(response.success);
        assert!(response.process_id.starts_with("proc_1700000000000_"));
        assert_eq!(response.grouped_videos.len(), 2);
        assert_eq!(response.grouped_videos[0].grouping_key, "cdn.site.com-abc12345");
        assert_eq!(response.grouped_videos[0].streams.len(), 2);
        assert_eq!(response.grouped_videos[0].streams[1].quality.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_response_json_shape() {
        let request: ProcessRequest = serde_json::from_str(BODY).unwrap();
        let response = handle_process(&request, 5, &GroupOptions::default());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json["processId"].is_string());
        assert_eq!(json["groupedVideos"][0]["groupingKey"], "cdn.site.com-abc12345");
    }

    #[test]
    fn test_backend_matches_local_grouping() {
        let streams: Vec<CapturedStream> = [
            "https://cdn.site.com/abc12345/720p/index.m3u8",
            "https://cdn.site.com/shows/pilot/master.m3u8",
            "https://cdn.site.com/abc12345/1080p/index.m3u8",
        ]
        .iter()
        .map(|u| CapturedStream::new(u))
        .collect();

        let request = ProcessRequest::new(VideoInfo::default(), vec![], &streams);
        let remote = handle_process(&request, 0, &GroupOptions::default()).grouped_videos;
        let local = crate::aggregate(&streams);
        assert_eq!(remote, local);
    }

    #[test]
    fn test_download_redirect() {
        assert_eq!(
            download_redirect("http://localhost:3000/", "proc_1_deadbeef"),
            "http://localhost:3000/static/sample.mp4"
        );
    }
}
