//! Shared utility functions.

pub mod timestamp;

pub use timestamp::{format_elapsed, now_millis};
