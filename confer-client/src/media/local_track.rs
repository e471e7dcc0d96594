use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

/// Исходящий трек. Клоны разделяют флаг `enabled` и RTP-трек.
#[derive(Clone)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    enabled: Arc<AtomicBool>,
    rtp: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    pub fn new(
        id: impl Into<String>,
        kind: TrackKind,
        source: TrackSource,
        rtp: Arc<dyn TrackLocal + Send + Sync>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source,
            enabled: Arc::new(AtomicBool::new(true)),
            rtp,
        }
    }

    /// Трек на `TrackLocalStaticSample`: opus для звука, vp8 для видео.
    pub fn sample(
        id: impl Into<String>,
        stream_id: impl Into<String>,
        kind: TrackKind,
        source: TrackSource,
    ) -> (Self, Arc<TrackLocalStaticSample>) {
        let id = id.into();
        let mime_type = match kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let sample = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            id.clone(),
            stream_id.into(),
        ));
        let track = Self::new(id, kind, source, sample.clone());
        (track, sample)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn rtp_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtp.clone()
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl PartialEq for LocalTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind && self.source == other.source
    }
}
