//! Offset estimation between two recordings of the same event.
//!
//! # Architecture
//!
//! 1. **Decoding** (`decoder`, `ffmpeg`): mono PCM for any sub-range of a
//!    source, with a temporary artifact that lives as long as the clip.
//!
//! 2. **Feature extraction** (`features`): per-frame vectors of standardized
//!    cepstra, energy, rolloff, centroid, chroma, onset strength and pulse.
//!
//! 3. **Correlation** (`correlation`): sliding dot product of two feature
//!    sequences, scored by the z-score of the best lag.
//!
//! 4. **Windowed search** (`slices`, `search`): overlapping scope slices
//!    against one target excerpt, stopping at the first passing score.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use aof_core::analysis::{FfmpegDecoder, OffsetSearch, SearchConfig};
//!
//! let search = OffsetSearch::new(SearchConfig::default(), FfmpegDecoder::new())?;
//! let result = search.find_offset(Path::new("recorder.wav"), Path::new("camera.mp4"), 0.0)?;
//! println!("{:.3}s (score {:.1}): {}", result.offset_seconds, result.score, result.alignment());
//! # Ok::<(), aof_core::analysis::AnalysisError>(())
//! ```

mod alignment;
mod correlation;
mod decoder;
mod ffmpeg;
pub mod features;
mod search;
pub mod signal;
mod slices;
pub mod types;

pub use types::{AnalysisError, AnalysisResult, AudioData, FeatureSequence, MatchResult};

pub use alignment::AlignmentAction;
pub use correlation::{correlate, CorrelationMatch};
pub use decoder::{DecodeRequest, DecodedClip, Decoder, MemoryDecoder};
pub use features::{
    standardize_columns, FeatureConfig, FeatureExtractor, FeatureKind, FeatureLayout,
};
pub use ffmpeg::FfmpegDecoder;
pub use search::{OffsetMatch, OffsetSearch, SearchConfig, SearchState, SliceReport};
pub use slices::{plan_slices, SliceBounds};
