mod constraints;
mod local_track;
mod media_source;

pub use constraints::*;
pub use local_track::*;
pub use media_source::*;
