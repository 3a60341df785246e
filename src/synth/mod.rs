//! Speech synthesis: the client trait, the HTTP client and a scripted test double.

pub mod client;
#[cfg(feature = "http")]
pub mod http;
pub mod scripted;
pub mod voice;
