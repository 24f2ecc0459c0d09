//! Turning an offset into an alignment action for the scope audio.

use serde::{Deserialize, Serialize};

/// How to shift the scope recording so it lines up with the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AlignmentAction {
    /// Skip this many seconds into the scope (offset >= 0).
    Seek { seconds: f64 },
    /// Delay the scope by this many milliseconds (offset < 0).
    Delay { milliseconds: u64 },
}

impl AlignmentAction {
    /// Action for a search offset. Delays are truncated to whole milliseconds.
    pub fn from_offset(offset_seconds: f64) -> Self {
        if offset_seconds >= 0.0 {
            AlignmentAction::Seek {
                seconds: offset_seconds,
            }
        } else {
            AlignmentAction::Delay {
                milliseconds: (offset_seconds.abs() * 1000.0).trunc() as u64,
            }
        }
    }
}

impl std::fmt::Display for AlignmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentAction::Seek { seconds } => write!(f, "seek {:.3}s into scope", seconds),
            AlignmentAction::Delay { milliseconds } => {
                write!(f, "delay scope by {}ms", milliseconds)
            }
        }
    }
}
