//! Per-session reader, writer and heart-beat tasks.

pub(crate) mod heartbeat;
pub(crate) mod read;
pub(crate) mod write;
