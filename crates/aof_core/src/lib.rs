//! AOF Core - offset estimation between independently captured recordings.
//!
//! Finds where a target recording (e.g. a camera's built-in microphone)
//! starts inside a scope recording (e.g. a separate audio recorder) by
//! correlating per-frame audio features over overlapping windows.

pub mod analysis;
pub mod config;
pub mod logging;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
