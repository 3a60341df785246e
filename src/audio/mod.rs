//! Audio decoding and output.

pub mod decoder;
pub mod output;
#[cfg(feature = "cpal-audio")]
pub mod playback;
pub mod wav;
