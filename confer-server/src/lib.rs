mod config;
mod hub;
mod room;
mod signaling;

pub use config::*;
pub use hub::*;
pub use room::*;
pub use signaling::*;
