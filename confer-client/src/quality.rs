use crate::media::VideoConstraints;
use confer_core::ConnectionQuality;

/// Профиль исходящего видео для данного качества связи.
/// `Connecting` ничего не меняет.
pub fn profile_for(quality: ConnectionQuality) -> Option<VideoConstraints> {
    match quality {
        ConnectionQuality::Connecting => None,
        ConnectionQuality::Excellent | ConnectionQuality::Good => Some(VideoConstraints::HIGH),
        ConnectionQuality::Poor => Some(VideoConstraints::MEDIUM),
        ConnectionQuality::Bad => Some(VideoConstraints::LOW),
    }
}

/// Понижает ограничения видео при ухудшении связи и возвращает их обратно.
#[derive(Debug, Clone)]
pub struct QualityAdapter {
    current: Option<VideoConstraints>,
}

impl QualityAdapter {
    pub fn new(initial: Option<VideoConstraints>) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> Option<VideoConstraints> {
        self.current
    }

    /// Новые ограничения, если профиль сменился.
    pub fn on_quality(&mut self, quality: ConnectionQuality) -> Option<VideoConstraints> {
        let profile = profile_for(quality)?;
        if self.current == Some(profile) {
            return None;
        }
        self.current = Some(profile);
        Some(profile)
    }
}
