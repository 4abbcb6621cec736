//! # veilcam-core
//!
//! Room session client and shared types for veilcam. This crate carries
//! the WebSocket connection to the room service, the wire messages it
//! exchanges, and the workspace error type. Everything media-related lives
//! in `veilcam-media`.

#![warn(clippy::all)]

pub mod error;
pub mod session;
pub mod signaling;

pub use error::VeilError;
pub use session::{JoinInfo, RoomSession, SessionEvent};
pub use signaling::{
    ClientMessage, MediaEnvelope, MediaHeader, ParticipantInfo, ServerMessage, TrackInfo,
    TrackKind,
};
