//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::analysis::signal::DEFAULT_PERTURBATION_SEED;
use crate::analysis::{AnalysisError, SearchConfig};
use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Windowed search settings.
    #[serde(default)]
    pub search: SearchSettings,

    /// Feature extraction settings.
    #[serde(default)]
    pub features: FeatureSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check values that deserialize fine but cannot drive a search.
    ///
    /// Uses the same rules the search applies when it is built.
    pub fn validate(&self) -> Result<(), String> {
        match SearchConfig::from_settings(self).validate() {
            Ok(()) => Ok(()),
            Err(AnalysisError::InvalidConfig(reason)) => Err(reason),
            Err(other) => Err(other.to_string()),
        }
    }
}

/// What the search does when one slice cannot be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceFailurePolicy {
    /// Log the failure and continue with the next slice.
    #[default]
    Skip,
    /// Stop the search and report the failing slice.
    Abort,
}

/// Windowed search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Sample rate recordings are decoded at (Hz).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Length of one scope slice in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,

    /// Audio shared by consecutive slices in seconds.
    #[serde(default = "default_overlap_seconds")]
    pub overlap_seconds: f64,

    /// Score above which the search stops early.
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,

    /// Upper bound for the target pre-skip in seconds.
    #[serde(default = "default_preskip_cap")]
    pub target_preskip_cap_seconds: f64,

    /// Query frames compared at each lag.
    #[serde(default = "default_correlation_frames")]
    pub correlation_frames: usize,

    /// Policy for slices that fail feature extraction or scoring.
    #[serde(default)]
    pub slice_failure: SliceFailurePolicy,

    /// Keep the winning correlation curve for plotting.
    #[serde(default)]
    pub keep_curve: bool,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_window_seconds() -> f64 {
    900.0
}

fn default_overlap_seconds() -> f64 {
    60.0
}

fn default_passing_score() -> f64 {
    8.0
}

fn default_preskip_cap() -> f64 {
    180.0
}

fn default_correlation_frames() -> usize {
    1000
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            window_seconds: default_window_seconds(),
            overlap_seconds: default_overlap_seconds(),
            passing_score: default_passing_score(),
            target_preskip_cap_seconds: default_preskip_cap(),
            correlation_frames: default_correlation_frames(),
            slice_failure: SliceFailurePolicy::default(),
            keep_curve: false,
        }
    }
}

/// Feature extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// FFT size in samples.
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,

    /// Samples between frames.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,

    /// Mel bands feeding the cepstrum.
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,

    /// Cepstral coefficients per frame.
    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,

    /// Chroma pitch classes per frame.
    #[serde(default = "default_n_chroma")]
    pub n_chroma: usize,

    /// Energy fraction below the rolloff frequency.
    #[serde(default = "default_rolloff_percent")]
    pub rolloff_percent: f64,

    /// Tempogram window for the pulse curve, in frames.
    #[serde(default = "default_tempogram_frames")]
    pub tempogram_frames: usize,

    /// Slowest tempo for the pulse curve (BPM).
    #[serde(default = "default_tempo_min")]
    pub tempo_min_bpm: f64,

    /// Fastest tempo for the pulse curve (BPM).
    #[serde(default = "default_tempo_max")]
    pub tempo_max_bpm: f64,

    /// Seed for the dither applied to silent input.
    #[serde(default = "default_perturbation_seed")]
    pub perturbation_seed: u64,
}

fn default_n_fft() -> usize {
    512
}

fn default_hop_length() -> usize {
    512
}

fn default_n_mels() -> usize {
    40
}

fn default_n_mfcc() -> usize {
    26
}

fn default_n_chroma() -> usize {
    10
}

fn default_rolloff_percent() -> f64 {
    0.1
}

fn default_tempogram_frames() -> usize {
    384
}

fn default_tempo_min() -> f64 {
    30.0
}

fn default_tempo_max() -> f64 {
    300.0
}

fn default_perturbation_seed() -> u64 {
    DEFAULT_PERTURBATION_SEED
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
            n_mfcc: default_n_mfcc(),
            n_chroma: default_n_chroma(),
            rolloff_percent: default_rolloff_percent(),
            tempogram_frames: default_tempogram_frames(),
            tempo_min_bpm: default_tempo_min(),
            tempo_max_bpm: default_tempo_max(),
            perturbation_seed: default_perturbation_seed(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Level used when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Show module paths in log lines.
    #[serde(default)]
    pub show_target: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            show_target: false,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Search,
    Features,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 3] = [
        ConfigSection::Search,
        ConfigSection::Features,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Search => "search",
            ConfigSection::Features => "features",
            ConfigSection::Logging => "logging",
        }
    }
}
