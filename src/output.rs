use crate::VideoGroup;
use crate::category::DetectedVideoElement;

/// Render groups as an indented listing, one block per video
pub fn render_text(groups: &[VideoGroup]) -> String {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let count = group.streams.len();
            let plural = if count == 1 { "stream" } else { "streams" };
            let mut block = format!("[{}] {} ({}) - {count} {plural}", i + 1, group.name, group.domain);
            if let Some(best) = group.best_quality() {
                block.push_str(&format!(", best {best}"));
            }
            block.push_str(&format!("\n    key: {}", group.grouping_key));
            for stream in &group.streams {
                let quality = stream.quality.as_deref().unwrap_or("-");
                block.push_str(&format!("\n    {:<11} {:<6} {}", stream.format.to_string(), quality, stream.url));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render groups as the `groupedVideos` JSON array
pub fn render_json(groups: &[VideoGroup]) -> String {
    serde_json::to_string_pretty(groups).unwrap_or_else(|_| "[]".to_string())
}

/// Render detected elements, one line each
pub fn render_elements_text(elements: &[DetectedVideoElement]) -> String {
    elements
        .iter()
        .map(|e| {
            let platform = e.platform.as_deref().map(|p| format!(" [{p}]")).unwrap_or_default();
            format!(
                "{:<13} {:>5}x{:<5} {:<6} {}{platform}",
                e.category.to_string(),
                e.width,
                e.height,
                e.quality,
                e.src.as_deref().unwrap_or("-"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_elements_json(elements: &[DetectedVideoElement]) -> String {
    serde_json::to_string_pretty(elements).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CapturedStream, aggregate};

    fn sample_groups() -> Vec<VideoGroup> {
        aggregate(&[
            CapturedStream::new("https://cdn.x.com/abc12345/720p/chunklist.m3u8"),
            CapturedStream::new("https://cdn.x.com/abc12345/1080p/chunklist.m3u8"),
        ])
    }

    #[test]
    fn test_render_text() {
        let output = render_text(&sample_groups());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "[1] abc12345 (cdn.x.com) - 2 streams, best 1080p");
        assert_eq!(lines[1], "    key: cdn.x.com-abc12345");
        assert!(lines[2].contains("HLS"));
        assert!(lines[2].ends_with("https://cdn.x.com/abc12345/720p/chunklist.m3u8"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_render_text_empty() {
        assert_eq!(render_text(&[]), "");
    }

    #[test]
    fn test_render_json() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&sample_groups())).unwrap();
        assert_eq!(json[0]["groupingKey"], "cdn.x.com-abc12345");
        assert_eq!(json[0]["streams"][1]["quality"], "1080p");
        assert_eq!(json[0]["streams"][0]["format"], "HLS");
    }

    #[test]
    fn test_render_elements_text() {
        let stream = CapturedStream::new("https://cdn.x.com/abc12345/720p/chunklist.m3u8");
        let output = render_elements_text(&[DetectedVideoElement::captured(&stream)]);
        assert!(output.starts_with("captured"));
        assert!(output.contains("720p"));
    }
}
