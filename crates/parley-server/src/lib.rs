// HTTP surface for Parley: validates chat requests and streams the agent loop
// back as a UI message stream.

pub mod chat;
pub mod error;
pub mod routes;
pub mod service_host;
pub mod state;

pub use error::{Result, ServerError};
pub use routes::router;
pub use service_host::{ServiceHost, shutdown_signal};
pub use state::AppState;
