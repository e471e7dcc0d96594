use async_trait::async_trait;
use confer_client::{
    LocalTrack, MediaConstraints, MediaError, MediaSource, SampleMediaSource, ScreenCapture,
    VideoConstraints,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMode {
    Ready,
    /// `acquire` fails as if permission was denied.
    Unavailable,
    /// `acquire` never completes.
    Stalled,
}

/// MediaSource backed by SampleMediaSource that records constraint changes.
#[derive(Clone)]
pub struct MockMedia {
    pub inner: SampleMediaSource,
    mode: MediaMode,
    applied: Arc<Mutex<Vec<VideoConstraints>>>,
    releases: Arc<AtomicUsize>,
}

impl MockMedia {
    pub fn new(mode: MediaMode) -> Self {
        Self {
            inner: SampleMediaSource::new(),
            mode,
            applied: Arc::new(Mutex::new(Vec::new())),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn ready() -> Self {
        Self::new(MediaMode::Ready)
    }

    /// Every constraint set applied so far.
    pub async fn applied(&self) -> Vec<VideoConstraints> {
        self.applied.lock().await.clone()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for MockMedia {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<Vec<LocalTrack>, MediaError> {
        match self.mode {
            MediaMode::Ready => self.inner.acquire(constraints).await,
            MediaMode::Unavailable => Err(MediaError::Unavailable("permission denied".to_string())),
            MediaMode::Stalled => std::future::pending().await,
        }
    }

    async fn acquire_screen(&self) -> Result<ScreenCapture, MediaError> {
        self.inner.acquire_screen().await
    }

    async fn apply_constraints(&self, constraints: &VideoConstraints) -> Result<(), MediaError> {
        self.applied.lock().await.push(*constraints);
        self.inner.apply_constraints(constraints).await
    }

    async fn stop_screen(&self) {
        self.inner.stop_screen().await
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release().await
    }
}
