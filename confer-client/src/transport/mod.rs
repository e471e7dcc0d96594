mod peer_transport;
mod transport_config;
mod webrtc_transport;

pub use peer_transport::*;
pub use transport_config::*;
pub use webrtc_transport::*;
