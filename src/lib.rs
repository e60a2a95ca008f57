pub mod cli;
pub mod controller;
pub mod controlplane;
pub mod logging;
pub mod output;
pub mod session;
pub mod transport;
pub mod types;

pub use controller::supervisor::LightClient;
pub use controlplane::ControlPlaneClient;
pub use session::{
    config::{SessionConfig, Tunables},
    result::{ErrorKind, Failure, SessionError, SessionResult, StatSnapshot},
    state::SessionState,
};
