//! Hub enrollment and the persistent hub event stream.
//!
//! Provides the pre-enrollment address resolver, the OTP enrollment
//! client, and the supervisor that keeps a WebSocket to the selected hub
//! open across failures.

pub mod address;
pub mod enrollment;
pub mod handler;
pub mod supervisor;
pub mod target;
pub mod types;
pub mod ws_client;

pub(crate) mod pumps {
    pub(crate) mod read;
}

pub use address::{AddressError, HubAddress, resolve};
pub use enrollment::{EnrollError, EnrollmentClient};
pub use handler::{HandlerFuture, LoggingHandler, MessageHandler};
pub use supervisor::{ConnectionSupervisor, SupervisorError};
pub use target::{ConnectionTarget, TargetError};
pub use types::{ConnectionEvent, ConnectionState, HubMessage, HubSelection, ReconnectConfig};
pub use ws_client::{ConnectFuture, Connector, WsClient, WsConnector, WsError};
