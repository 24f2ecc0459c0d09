//! Per-frame feature extraction.
//!
//! Turns a decoded signal into a [`FeatureSequence`] whose rows concatenate,
//! in [`FeatureLayout`] order:
//!
//! 1. Cepstral coefficients (log-mel + DCT), standardized per column so gain
//!    and frequency-response differences between recorders cancel out
//! 2. Frame RMS energy
//! 3. Spectral rolloff / sample rate
//! 4. Spectral centroid / sample rate
//! 5. Chroma energy profile
//! 6. Onset strength
//! 7. Predominant local pulse
//!
//! Every sub-feature is computed on the same centered STFT grid, so all
//! columns share one frame count.

mod layout;
mod mel;
mod rhythm;
mod spectral;
mod stft;

pub use layout::{FeatureBlock, FeatureKind, FeatureLayout};
pub use rhythm::PulseConfig;

use serde::{Deserialize, Serialize};

use crate::analysis::signal::{perturb_silence, DEFAULT_PERTURBATION_SEED};
use crate::analysis::types::{AnalysisError, AnalysisResult, AudioData, FeatureSequence};
use crate::config::FeatureSettings;

use mel::{dct_ortho, power_to_db, MelFilterbank};
use rhythm::{onset_strength, predominant_pulse};
use spectral::{ChromaMap, SpectralDescriptors};
use stft::{bin_frequencies, Stft};

/// Configuration for feature extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// FFT size (analysis window length in samples).
    pub n_fft: usize,
    /// Samples between frame centers.
    pub hop_length: usize,
    /// Number of mel bands feeding the cepstrum.
    pub n_mels: usize,
    /// Number of cepstral coefficients kept.
    pub n_mfcc: usize,
    /// Number of chroma pitch classes.
    pub n_chroma: usize,
    /// Fraction of spectral magnitude below the rolloff frequency.
    pub rolloff_percent: f64,
    /// Tempogram window in frames for the pulse curve.
    pub tempogram_frames: usize,
    /// Slowest tempo considered for the pulse curve (BPM).
    pub tempo_min_bpm: f64,
    /// Fastest tempo considered for the pulse curve (BPM).
    pub tempo_max_bpm: f64,
    /// Seed for the dither applied to silent input.
    pub perturbation_seed: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 512,
            hop_length: 512,
            n_mels: 40,
            n_mfcc: 26,
            n_chroma: 10,
            rolloff_percent: 0.1,
            tempogram_frames: 384,
            tempo_min_bpm: 30.0,
            tempo_max_bpm: 300.0,
            perturbation_seed: DEFAULT_PERTURBATION_SEED,
        }
    }
}

impl FeatureConfig {
    /// Create from feature settings.
    pub fn from_settings(settings: &FeatureSettings) -> Self {
        Self {
            n_fft: settings.n_fft,
            hop_length: settings.hop_length,
            n_mels: settings.n_mels,
            n_mfcc: settings.n_mfcc,
            n_chroma: settings.n_chroma,
            rolloff_percent: settings.rolloff_percent,
            tempogram_frames: settings.tempogram_frames,
            tempo_min_bpm: settings.tempo_min_bpm,
            tempo_max_bpm: settings.tempo_max_bpm,
            perturbation_seed: settings.perturbation_seed,
        }
    }

    /// Reject configurations that cannot produce a feature sequence.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.n_fft < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "n_fft must be at least 2, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(AnalysisError::InvalidConfig(
                "hop_length must be positive".to_string(),
            ));
        }
        if self.n_mels == 0 || self.n_mfcc == 0 {
            return Err(AnalysisError::InvalidConfig(
                "n_mels and n_mfcc must be positive".to_string(),
            ));
        }
        if self.n_mfcc > self.n_mels {
            return Err(AnalysisError::InvalidConfig(format!(
                "n_mfcc ({}) cannot exceed n_mels ({})",
                self.n_mfcc, self.n_mels
            )));
        }
        if !(0.0..=1.0).contains(&self.rolloff_percent) {
            return Err(AnalysisError::InvalidConfig(format!(
                "rolloff_percent must be within [0, 1], got {}",
                self.rolloff_percent
            )));
        }
        if self.tempo_min_bpm >= self.tempo_max_bpm {
            return Err(AnalysisError::InvalidConfig(format!(
                "tempo range {}..{} BPM is empty",
                self.tempo_min_bpm, self.tempo_max_bpm
            )));
        }
        Ok(())
    }

    fn pulse_config(&self) -> PulseConfig {
        PulseConfig {
            win_frames: self.tempogram_frames,
            tempo_min_bpm: self.tempo_min_bpm,
            tempo_max_bpm: self.tempo_max_bpm,
        }
    }
}

/// Feature extractor bound to one sample rate.
pub struct FeatureExtractor {
    config: FeatureConfig,
    layout: FeatureLayout,
    sample_rate: u32,
    stft: Stft,
    mel: MelFilterbank,
    spectral: SpectralDescriptors,
    chroma: ChromaMap,
}

impl FeatureExtractor {
    /// Create an extractor for signals decoded at `sample_rate`.
    pub fn new(config: FeatureConfig, sample_rate: u32) -> AnalysisResult<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sample rate must be positive".to_string(),
            ));
        }

        let frequencies = bin_frequencies(config.n_fft, sample_rate);

        Ok(Self {
            layout: FeatureLayout::new(config.n_mfcc, config.n_chroma),
            stft: Stft::new(config.n_fft, config.hop_length),
            mel: MelFilterbank::new(config.n_mels, config.n_fft, sample_rate),
            spectral: SpectralDescriptors::new(
                frequencies.clone(),
                sample_rate,
                config.rolloff_percent,
            ),
            chroma: ChromaMap::new(config.n_chroma, &frequencies),
            sample_rate,
            config,
        })
    }

    /// Layout of every frame this extractor produces.
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    /// Sample rate this extractor was built for.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Extract the feature sequence of `audio`.
    ///
    /// Fails with `InsufficientAudioData` for signals shorter than one
    /// analysis window and with `DegenerateSignal` if any output value is
    /// non-finite.
    pub fn extract(&self, audio: &AudioData) -> AnalysisResult<FeatureSequence> {
        if audio.sample_rate != self.sample_rate {
            return Err(AnalysisError::InvalidConfig(format!(
                "signal decoded at {} Hz given to a {} Hz extractor",
                audio.sample_rate, self.sample_rate
            )));
        }
        if audio.is_empty() || audio.len() < self.config.n_fft {
            return Err(AnalysisError::InsufficientAudioData {
                needed: self.config.n_fft,
                got: audio.len(),
            });
        }

        let mut samples = audio.samples.clone();
        perturb_silence(&mut samples, self.config.perturbation_seed);

        let spectrogram = self.stft.analyze(&samples);
        let num_frames = spectrogram.num_frames();

        let mel_db: Vec<Vec<f64>> = spectrogram
            .power
            .iter()
            .map(|power| self.mel.apply(power).into_iter().map(power_to_db).collect())
            .collect();

        // Cepstrum, standardized per coefficient across time
        let mut cepstra: Vec<f64> = Vec::with_capacity(num_frames * self.config.n_mfcc);
        for frame in &mel_db {
            cepstra.extend(dct_ortho(frame, self.config.n_mfcc));
        }
        standardize_columns(&mut cepstra, self.config.n_mfcc)?;

        let onset = onset_strength(&mel_db);
        let frame_rate = self.sample_rate as f64 / self.config.hop_length as f64;
        let pulse = predominant_pulse(&onset, frame_rate, &self.config.pulse_config());

        let dimension = self.layout.dimension();
        let mut data = Vec::with_capacity(num_frames * dimension);

        for t in 0..num_frames {
            let power = &spectrogram.power[t];
            let magnitude: Vec<f64> = power.iter().map(|p| p.sqrt()).collect();

            for block in self.layout.blocks() {
                match block.kind {
                    FeatureKind::Cepstral => {
                        let start = t * self.config.n_mfcc;
                        data.extend_from_slice(&cepstra[start..start + self.config.n_mfcc]);
                    }
                    FeatureKind::Energy => data.push(spectrogram.rms[t]),
                    FeatureKind::Rolloff => data.push(self.spectral.rolloff(&magnitude)),
                    FeatureKind::Centroid => data.push(self.spectral.centroid(&magnitude)),
                    FeatureKind::Chroma => data.extend(self.chroma.apply(power)),
                    FeatureKind::OnsetStrength => data.push(onset[t]),
                    FeatureKind::Pulse => data.push(pulse[t]),
                }
            }
        }

        if let Some(position) = data.iter().position(|v| !v.is_finite()) {
            let column = position % dimension;
            let kind = self
                .layout
                .block_at(column)
                .map_or_else(|| "unknown".to_string(), |b| b.kind.to_string());
            return Err(AnalysisError::DegenerateSignal(format!(
                "non-finite {} value at frame {}, column {}",
                kind,
                position / dimension,
                column
            )));
        }

        // Frame step derived from the actual signal / frame ratio
        let seconds_per_frame = audio.len() as f64 / num_frames as f64 / self.sample_rate as f64;

        tracing::trace!(
            "Extracted {} frames x {} features ({:.4}s/frame)",
            num_frames,
            dimension,
            seconds_per_frame
        );

        Ok(FeatureSequence::from_flat(data, dimension, seconds_per_frame))
    }
}

/// Standardize each column of row-major `values` to zero mean and unit
/// variance (population statistics).
///
/// A column with zero variance cannot be standardized and yields
/// `DegenerateSignal`.
pub fn standardize_columns(values: &mut [f64], dimension: usize) -> AnalysisResult<()> {
    if dimension == 0 || values.is_empty() {
        return Ok(());
    }
    let rows = values.len() / dimension;

    for column in 0..dimension {
        let mean = (0..rows).map(|r| values[r * dimension + column]).sum::<f64>() / rows as f64;
        let variance = (0..rows)
            .map(|r| (values[r * dimension + column] - mean).powi(2))
            .sum::<f64>()
            / rows as f64;
        let std_dev = variance.sqrt();

        if std_dev <= 0.0 || !std_dev.is_finite() {
            return Err(AnalysisError::DegenerateSignal(format!(
                "column {} has zero variance across {} frames",
                column, rows
            )));
        }

        for r in 0..rows {
            let value = &mut values[r * dimension + column];
            *value = (*value - mean) / std_dev;
        }
    }

    Ok(())
}
