//! Presence of the connected user: announcing it, persisting the chosen
//! level in user settings and following the server's echo.

pub mod service;
pub mod transport;

pub use service::{ConnectedPresence, PresenceDeps, PresenceService};
pub use transport::PresenceTransport;
