//! Partitioning of the scope recording into overlapping analysis slices.
//!
//! Pure functions - no I/O.

use serde::{Deserialize, Serialize};

/// Sample bounds of one slice of the scope recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceBounds {
    /// Zero-based slice index.
    pub index: usize,
    /// First sample of the slice.
    pub start_sample: usize,
    /// One past the last sample of the slice.
    pub end_sample: usize,
}

impl SliceBounds {
    /// Number of samples in the slice.
    pub fn len(&self) -> usize {
        self.end_sample.saturating_sub(self.start_sample)
    }

    /// Check if the slice holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice start in seconds.
    pub fn start_secs(&self, sample_rate: u32) -> f64 {
        self.start_sample as f64 / sample_rate as f64
    }

    /// Slice end in seconds.
    pub fn end_secs(&self, sample_rate: u32) -> f64 {
        self.end_sample as f64 / sample_rate as f64
    }
}

/// Plan the slices covering `total_samples` of scope audio.
///
/// Slice `i` nominally covers `[i * window, (i + 1) * window)`; every slice
/// after the first starts `overlap` earlier, so consecutive slices share that
/// much audio. Starts clamp at zero. Ends stop one sample short of the scope
/// end, matching the last decodable sample.
pub fn plan_slices(
    total_samples: usize,
    sample_rate: u32,
    window_secs: f64,
    overlap_secs: f64,
) -> Vec<SliceBounds> {
    let window_samples = (window_secs * sample_rate as f64).round() as usize;
    let overlap_samples = (overlap_secs * sample_rate as f64).round() as usize;
    if window_samples == 0 || total_samples == 0 {
        return Vec::new();
    }

    let count = total_samples.div_ceil(window_samples);
    let last = total_samples - 1;

    (0..count)
        .map(|index| {
            let nominal = index * window_samples;
            let start_sample = if index > 0 {
                nominal.saturating_sub(overlap_samples)
            } else {
                nominal
            };
            SliceBounds {
                index,
                start_sample,
                end_sample: (nominal + window_samples).min(last),
            }
        })
        .collect()
}
