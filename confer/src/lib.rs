pub use confer_core::model::{Participant, ParticipantId};

pub mod model {
    pub use confer_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use confer_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use confer_client::*;
}
