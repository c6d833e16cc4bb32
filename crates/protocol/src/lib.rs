//! Wire protocol for EADMS real-time notifications.
//!
//! STOMP 1.2 frame codec and heart-beat negotiation, plus the typed
//! payloads and destinations the portal exchanges over the broker.

pub mod constants;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod messaging;

pub use error::FrameError;
pub use frame::{Command, Frame};
pub use heartbeat::{HeartBeat, NegotiatedHeartBeat};
