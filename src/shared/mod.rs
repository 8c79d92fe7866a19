//! Shared utilities used across the relay.

pub mod status_text;
pub mod timing;

pub use status_text::{reason_phrase, status_text};
pub use timing::DetailedTiming;
