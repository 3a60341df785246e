//! Playback session state machine and the transport controller around it.

pub mod controller;
pub mod session;
pub mod state;
