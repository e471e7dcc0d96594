use crate::error::MediaError;
use crate::media::{LocalTrack, MediaConstraints, TrackKind, TrackSource, VideoConstraints};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Захваченный экран. `ended` срабатывает, когда источник остановился сам
/// (или был освобождён через `stop_screen`).
pub struct ScreenCapture {
    pub track: LocalTrack,
    pub ended: oneshot::Receiver<()>,
}

/// Доступ к устройствам захвата.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Захватить локальные микрофон и камеру.
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<Vec<LocalTrack>, MediaError>;

    async fn acquire_screen(&self) -> Result<ScreenCapture, MediaError>;

    /// Подсказка кодеру; ошибка не фатальна.
    async fn apply_constraints(&self, constraints: &VideoConstraints) -> Result<(), MediaError>;

    async fn stop_screen(&self);

    async fn release(&self);
}

const LOCAL_STREAM_ID: &str = "local";

#[derive(Default)]
struct SampleState {
    constraints: Option<VideoConstraints>,
    samples: HashMap<TrackSource, Arc<TrackLocalStaticSample>>,
    screen_end: Option<oneshot::Sender<()>>,
}

/// Источник на `TrackLocalStaticSample`: встраивающее приложение само
/// пишет закодированные кадры в треки, полученные через `sample_track`.
#[derive(Clone, Default)]
pub struct SampleMediaSource {
    state: Arc<Mutex<SampleState>>,
}

impl SampleMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_track(&self, source: TrackSource) -> Option<Arc<TrackLocalStaticSample>> {
        self.state.lock().samples.get(&source).cloned()
    }

    pub fn video_constraints(&self) -> Option<VideoConstraints> {
        self.state.lock().constraints
    }

    /// Источник экрана остановлен извне (например, системной кнопкой).
    pub fn end_screen_capture(&self) {
        let mut state = self.state.lock();
        state.samples.remove(&TrackSource::Screen);
        if let Some(tx) = state.screen_end.take() {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl MediaSource for SampleMediaSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<Vec<LocalTrack>, MediaError> {
        if !constraints.audio && constraints.video.is_none() {
            return Err(MediaError::Unavailable(
                "neither audio nor video requested".to_owned(),
            ));
        }

        let mut state = self.state.lock();
        let mut tracks = Vec::new();

        if constraints.audio {
            let (track, sample) = LocalTrack::sample(
                "microphone",
                LOCAL_STREAM_ID,
                TrackKind::Audio,
                TrackSource::Microphone,
            );
            state.samples.insert(TrackSource::Microphone, sample);
            tracks.push(track);
        }

        if let Some(video) = constraints.video {
            let (track, sample) = LocalTrack::sample(
                "camera",
                LOCAL_STREAM_ID,
                TrackKind::Video,
                TrackSource::Camera,
            );
            state.samples.insert(TrackSource::Camera, sample);
            state.constraints = Some(video);
            tracks.push(track);
        }

        info!("Acquired {} local tracks", tracks.len());
        Ok(tracks)
    }

    async fn acquire_screen(&self) -> Result<ScreenCapture, MediaError> {
        let mut state = self.state.lock();
        let (track, sample) = LocalTrack::sample(
            "screen",
            LOCAL_STREAM_ID,
            TrackKind::Video,
            TrackSource::Screen,
        );
        let (end_tx, ended) = oneshot::channel();

        state.samples.insert(TrackSource::Screen, sample);
        state.screen_end = Some(end_tx);

        Ok(ScreenCapture { track, ended })
    }

    async fn apply_constraints(&self, constraints: &VideoConstraints) -> Result<(), MediaError> {
        debug!("Video constraints now {:?}", constraints);
        self.state.lock().constraints = Some(*constraints);
        Ok(())
    }

    async fn stop_screen(&self) {
        let mut state = self.state.lock();
        state.samples.remove(&TrackSource::Screen);
        state.screen_end = None;
    }

    async fn release(&self) {
        let mut state = self.state.lock();
        state.samples.clear();
        state.screen_end = None;
        state.constraints = None;
        info!("Local media released");
    }
}
