use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::grouping::{GroupOptions, aggregate_with};
use crate::{CapturedStream, VideoGroup};

/// Default quiet period before a batch of new streams is flushed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Streams captured for one tab, in discovery order, unique by URL
#[derive(Debug, Default, Clone)]
pub struct CaptureSession {
    streams: Vec<CapturedStream>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stream; returns false if its URL was already captured
    pub fn observe(&mut self, stream: CapturedStream) -> bool {
        if self.streams.iter().any(|s| s.url == stream.url) {
            return false;
        }
        debug!("Captured {} stream: {}", stream.format, stream.url);
        self.streams.push(stream);
        true
    }

    /// Forget everything, as on navigation
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    pub fn streams(&self) -> &[CapturedStream] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Regroup from scratch
    pub fn groups(&self, options: &GroupOptions) -> Vec<VideoGroup> {
        aggregate_with(&self.streams, options)
    }
}

/// Capture sessions keyed by tab
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<u64, CaptureSession>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, tab: u64, stream: CapturedStream) -> bool {
        self.tabs.entry(tab).or_default().observe(stream)
    }

    pub fn session(&self, tab: u64) -> Option<&CaptureSession> {
        self.tabs.get(&tab)
    }

    /// The tab loaded a new page
    pub fn navigate(&mut self, tab: u64) {
        if let Some(session) = self.tabs.get_mut(&tab) {
            debug!("Tab {tab} navigated, dropping {} streams", session.len());
            session.clear();
        }
    }

    pub fn close(&mut self, tab: u64) {
        if self.tabs.remove(&tab).is_some() {
            debug!("Tab {tab} closed");
        }
    }

    pub fn groups(&self, tab: u64, options: &GroupOptions) -> Vec<VideoGroup> {
        self.tabs
            .get(&tab)
            .map(|s| s.groups(options))
            .unwrap_or_default()
    }
}

/// Coalesce items arriving on `rx` into batches.
///
/// A batch is emitted once `quiet` passes with no new item; each arrival resets
/// the timer. When the input closes, anything pending is flushed and the output
/// closes.
pub fn spawn_batcher<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    quiet: Duration,
) -> (mpsc::Receiver<Vec<T>>, JoinHandle<()>) {
    let (tx, out) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        let mut pending: Vec<T> = Vec::new();
        loop {
            if pending.is_empty() {
                match rx.recv().await {
                    Some(item) => pending.push(item),
                    None => break,
                }
                continue;
            }

            match tokio::time::timeout(quiet, rx.recv()).await {
                Ok(Some(item)) => pending.push(item),
                Ok(None) => break,
                Err(_) => {
                    debug!("Flushing batch of {}", pending.len());
                    if tx.send(std::mem::take(&mut pending)).await.is_err() {
                        return;
                    }
                }
            }
        }

        if !pending.is_empty() {
            let _ = tx.send(pending).await;
        }
        info!("Batcher input closed");
    });

    (out, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dedups_by_url() {
        let mut session = CaptureSession::new();
        assert!(session.observe(CapturedStream::new("https://a.com/aaaaaaaa/720p/x.m3u8")));
        assert!(!session.observe(CapturedStream::new("https://a.com/aaaaaaaa/720p/x.m3u8")));
        assert!(session.observe(CapturedStream::new("https://a.com/aaaaaaaa/1080p/x.m3u8")));
        assert_eq!(session.len(), 2);

        let groups = session.groups(&GroupOptions::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].streams.len(), 2);
    }

    #[test]
    fn test_registry_navigation_and_close() {
        let mut tabs = TabRegistry::new();
        tabs.observe(1, CapturedStream::new("https://a.com/aaaaaaaa/x.m3u8"));
        tabs.observe(2, CapturedStream::new("https://b.com/bbbbbbbb/x.m3u8"));

        tabs.navigate(1);
        assert!(tabs.session(1).unwrap().is_empty());
        assert!(tabs.groups(1, &GroupOptions::default()).is_empty());
        assert_eq!(tabs.groups(2, &GroupOptions::default()).len(), 1);

        tabs.close(2);
        assert!(tabs.session(2).is_none());
        assert!(tabs.groups(2, &GroupOptions::default()).is_empty());
    }

    #[tokio::test]
    async fn test_batcher_coalesces_burst() {
        let (tx, rx) = mpsc::channel(16);
        let (mut out, handle) = spawn_batcher(rx, Duration::from_millis(50));

        for i in 0..3 {
            tx.send(i).await.unwrap();
        }
        let batch = out.recv().await.unwrap();
        assert_eq!(batch, vec![0, 1, 2]);

        tx.send(3).await.unwrap();
        drop(tx);
        assert_eq!(out.recv().await.unwrap(), vec![3]);
        assert!(out.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_batcher_closes_empty() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let (mut out, handle) = spawn_batcher(rx, Duration::from_millis(10));
        drop(tx);
        assert!(out.recv().await.is_none());
        handle.await.unwrap();
    }
}
