//! Shared protocol definitions for the track relay
//!
//! Types in this crate cross the process boundary: they are serialized as JSON
//! on the HTTP surface or wrapped in base64 on the console surface.

pub mod codec;
pub mod messages;
pub mod types;

pub use codec::{decode_description, encode_description, CodecError};
pub use messages::ErrorBody;
pub use types::*;
