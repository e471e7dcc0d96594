mod config;
mod coordinator;
mod error;
mod heartbeat;
mod media;
mod quality;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use heartbeat::*;
pub use media::*;
pub use quality::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
