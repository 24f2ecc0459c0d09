//! Core types for offset analysis.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Mono PCM audio decoded from a source file.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples normalized to [-1, 1].
    pub samples: Vec<f64>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl AudioData {
    /// Create new audio data from samples.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        let duration_secs = samples.len() as f64 / sample_rate as f64;
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }

    /// Get the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if audio data is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration_secs
    }

    /// Copy out the samples in `[start, end)`, clamped to the available range.
    pub fn sample_range(&self, start: usize, end: usize) -> AudioData {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        AudioData::new(self.samples[start..end].to_vec(), self.sample_rate)
    }
}

/// Time-ordered feature vectors, one row per analysis frame.
///
/// Rows are stored contiguously. Every row has the same dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSequence {
    data: Vec<f64>,
    dimension: usize,
    seconds_per_frame: f64,
}

impl FeatureSequence {
    /// Build a sequence from row-major data.
    ///
    /// Trailing values that do not fill a whole row are dropped.
    pub fn from_flat(mut data: Vec<f64>, dimension: usize, seconds_per_frame: f64) -> Self {
        if dimension == 0 {
            data.clear();
        } else {
            data.truncate(data.len() - data.len() % dimension);
        }
        Self {
            data,
            dimension,
            seconds_per_frame,
        }
    }

    /// Build a sequence from individual frames.
    ///
    /// Returns `DimensionMismatch` if the frames disagree on width.
    pub fn from_frames(frames: &[Vec<f64>], seconds_per_frame: f64) -> AnalysisResult<Self> {
        let dimension = frames.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(frames.len() * dimension);
        for frame in frames {
            if frame.len() != dimension {
                return Err(AnalysisError::DimensionMismatch {
                    reference: dimension,
                    query: frame.len(),
                });
            }
            data.extend_from_slice(frame);
        }
        Ok(Self::from_flat(data, dimension, seconds_per_frame))
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Check if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of each frame.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Wall-clock duration of one frame step.
    pub fn seconds_per_frame(&self) -> f64 {
        self.seconds_per_frame
    }

    /// Borrow a single frame.
    pub fn frame(&self, index: usize) -> &[f64] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Iterate over frames in time order.
    pub fn frames(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Copy one feature column across all frames.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.frames().map(|frame| frame[index]).collect()
    }

    /// Raw row-major values.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Convert a frame index to seconds.
    pub fn frame_to_seconds(&self, index: usize) -> f64 {
        index as f64 * self.seconds_per_frame
    }
}

/// Best lag found by the correlator, expressed in both frames and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Index of the best lag in the correlation curve.
    pub lag_index: usize,
    /// The lag converted to seconds.
    pub offset_seconds: f64,
    /// Standard score of the peak.
    pub score: f64,
}

/// Error types for offset analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Input is too short for one analysis frame.
    #[error("Insufficient audio data: needed {needed}, got {got}")]
    InsufficientAudioData { needed: usize, got: usize },

    /// Feature extraction produced non-finite values.
    #[error("Degenerate signal: {0}")]
    DegenerateSignal(String),

    /// The correlation curve has zero variance.
    #[error("Correlation score is undefined for a constant curve")]
    UndefinedScore,

    /// The external decoder failed.
    #[error("Failed to decode {}: {reason}", path.display())]
    AudioDecodeFailed { path: PathBuf, reason: String },

    /// Two feature sequences with different widths were compared.
    #[error("Feature dimension mismatch: reference {reference}, query {query}")]
    DimensionMismatch { reference: usize, query: usize },

    /// A slice of the scope recording could not be scored.
    #[error("Slice {slice} failed: {source}")]
    SliceFailed {
        slice: usize,
        #[source]
        source: Box<AnalysisError>,
    },

    /// A whole recording could not be analyzed.
    #[error("Failed to analyze {}: {source}", path.display())]
    FileFailed {
        path: PathBuf,
        #[source]
        source: Box<AnalysisError>,
    },

    /// Configuration rejected before the search started.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Create a decode failure for `path`.
    pub fn decode_failed(path: &Path, reason: impl Into<String>) -> Self {
        Self::AudioDecodeFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Attach the recording that triggered a failure.
    pub fn in_file(self, path: &Path) -> Self {
        Self::FileFailed {
            path: path.to_path_buf(),
            source: Box::new(self),
        }
    }

    /// Attach the slice index to a failure.
    pub fn in_slice(self, slice: usize) -> Self {
        Self::SliceFailed {
            slice,
            source: Box::new(self),
        }
    }
}

/// Type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_data_reports_duration() {
        let audio = AudioData::new(vec![0.0; 8000], 4000);
        assert_eq!(audio.len(), 8000);
        assert!((audio.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sample_range_clamps_to_length() {
        let samples: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let audio = AudioData::new(samples, 100);

        let tail = audio.sample_range(90, 500);
        assert_eq!(tail.len(), 10);
        assert_eq!(tail.samples[0], 90.0);

        let empty = audio.sample_range(200, 300);
        assert!(empty.is_empty());
    }

    #[test]
    fn feature_sequence_indexes_rows_and_columns() {
        let seq = FeatureSequence::from_frames(
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
            0.5,
        )
        .unwrap();

        assert_eq!(seq.len(), 3);
        assert_eq!(seq.dimension(), 2);
        assert_eq!(seq.frame(1), &[3.0, 4.0]);
        assert_eq!(seq.column(1), vec![2.0, 4.0, 6.0]);
        assert!((seq.frame_to_seconds(3) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn feature_sequence_rejects_ragged_frames() {
        let result = FeatureSequence::from_frames(&[vec![1.0, 2.0], vec![3.0]], 1.0);
        assert!(matches!(
            result,
            Err(AnalysisError::DimensionMismatch {
                reference: 2,
                query: 1
            })
        ));
    }

    #[test]
    fn slice_error_names_the_slice() {
        let err = AnalysisError::UndefinedScore.in_slice(3);
        let msg = err.to_string();
        assert!(msg.contains("Slice 3"));
        assert!(msg.contains("constant curve"));
    }

    #[test]
    fn decode_error_names_the_file() {
        let err = AnalysisError::decode_failed(Path::new("/media/cam.mp4"), "exit code 1");
        let msg = err.to_string();
        assert!(msg.contains("/media/cam.mp4"));
        assert!(msg.contains("exit code 1"));
    }
}
