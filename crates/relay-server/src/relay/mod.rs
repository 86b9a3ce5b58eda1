//! Session lifecycle for the track relay
//!
//! The controller runs one [`RelaySession`] at a time: build the transport,
//! wait for an offer, negotiate, relay until the peer connection fails or
//! closes, tear everything down, and start over.

mod controller;
mod session;
mod status;
mod transport;

pub use controller::{RelaySettings, SessionController};
pub use session::RelaySession;
pub use status::StatusBoard;
pub use transport::build_api;
