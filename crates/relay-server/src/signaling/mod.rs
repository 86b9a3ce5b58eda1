//! Signaling bridge
//!
//! Carries one offer from an external caller (HTTP handler or console loop)
//! to the session controller and the answer back, bounded by a timeout.

mod bridge;
pub mod console;

pub use bridge::{signaling_channel, OfferInbox, OfferRequest, SignalingBridge, SignalingError};
