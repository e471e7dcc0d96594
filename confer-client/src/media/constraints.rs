#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub max_bitrate_bps: u32,
}

impl VideoConstraints {
    pub const HIGH: Self = Self {
        width: 1280,
        height: 720,
        frame_rate: 30,
        max_bitrate_bps: 2_000_000,
    };

    pub const MEDIUM: Self = Self {
        width: 640,
        height: 360,
        frame_rate: 24,
        max_bitrate_bps: 800_000,
    };

    pub const LOW: Self = Self {
        width: 320,
        height: 180,
        frame_rate: 15,
        max_bitrate_bps: 300_000,
    };
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self::HIGH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: Some(VideoConstraints::HIGH),
        }
    }
}
