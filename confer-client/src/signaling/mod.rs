mod signal_connector;
mod signaling_channel;
mod signaling_output;
mod ws_connector;

pub use signal_connector::*;
pub use signaling_channel::*;
pub use signaling_output::*;
pub use ws_connector::*;
