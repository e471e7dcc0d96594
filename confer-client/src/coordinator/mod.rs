mod call_command;
mod call_handle;
mod call_observer;
mod coordinator;

pub use call_command::*;
pub use call_handle::*;
pub use call_observer::*;
pub use coordinator::*;
