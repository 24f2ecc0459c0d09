//! Rhythmic descriptors: onset strength and predominant local pulse.
//!
//! Onset strength follows the spectral-flux recipe (frame-to-frame increase
//! of the log-mel spectrum, half-wave rectified, averaged across bands). The
//! pulse curve is a predominant local pulse estimate: for every frame, the
//! strongest tempo component of a windowed Fourier tempogram of the onset
//! envelope is re-synthesized as a windowed sinusoid and overlap-added.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use super::stft::hann_window;

/// Tempo search range and window for the pulse estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseConfig {
    /// Tempogram window length in onset frames.
    pub win_frames: usize,
    /// Slowest tempo considered (BPM).
    pub tempo_min_bpm: f64,
    /// Fastest tempo considered (BPM).
    pub tempo_max_bpm: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            win_frames: 384,
            tempo_min_bpm: 30.0,
            tempo_max_bpm: 300.0,
        }
    }
}

/// Onset strength envelope from per-frame log-mel spectra.
///
/// The first frame has no predecessor and is 0. The envelope is scaled so
/// its maximum is 1.
pub fn onset_strength(mel_db: &[Vec<f64>]) -> Vec<f64> {
    let mut envelope = vec![0.0; mel_db.len()];

    for frame in 1..mel_db.len() {
        let current = &mel_db[frame];
        let previous = &mel_db[frame - 1];
        let bands = current.len().max(1) as f64;

        let flux: f64 = current
            .iter()
            .zip(previous.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope[frame] = flux / bands;
    }

    normalize_peak(&mut envelope);
    envelope
}

/// Predominant local pulse curve of an onset envelope.
///
/// `frame_rate` is the number of onset frames per second. The result has one
/// value per onset frame, is non-negative and peaks at 1 unless the
/// envelope carries no periodicity at all (then it is all zeros).
pub fn predominant_pulse(onset: &[f64], frame_rate: f64, config: &PulseConfig) -> Vec<f64> {
    let n = onset.len();
    let win = config.win_frames.max(2);
    let mut pulse = vec![0.0; n];
    if n == 0 {
        return pulse;
    }

    // Tempogram bin k corresponds to k * frame_rate * 60 / win BPM
    let bpm_per_bin = frame_rate * 60.0 / win as f64;
    let tempo_bins: Vec<usize> = (1..=win / 2)
        .filter(|&k| {
            let bpm = k as f64 * bpm_per_bin;
            bpm >= config.tempo_min_bpm && bpm <= config.tempo_max_bpm
        })
        .collect();
    if tempo_bins.is_empty() {
        return pulse;
    }

    let window = hann_window(win);
    let fft = FftPlanner::<f64>::new().plan_fft_forward(win);
    let half = (win / 2) as isize;
    let mut buffer = vec![Complex::new(0.0, 0.0); win];

    for t in 0..n {
        let origin = t as isize - half;

        for (i, slot) in buffer.iter_mut().enumerate() {
            let idx = origin + i as isize;
            let value = if idx >= 0 && (idx as usize) < n {
                onset[idx as usize]
            } else {
                0.0
            };
            *slot = Complex::new(value * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let (best_bin, best_mag) = tempo_bins
            .iter()
            .map(|&k| (k, buffer[k].norm()))
            .fold((0, 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
        if best_mag <= 1e-12 {
            continue;
        }

        // Unit-magnitude coefficient keeps phase only
        let phase = buffer[best_bin] / best_mag;
        let omega = 2.0 * PI * best_bin as f64 / win as f64;

        for (i, &w) in window.iter().enumerate() {
            let idx = origin + i as isize;
            if idx >= 0 && (idx as usize) < n {
                let rotation = Complex::from_polar(1.0, omega * i as f64);
                pulse[idx as usize] += w * (phase * rotation).re;
            }
        }
    }

    for value in &mut pulse {
        *value = value.max(0.0);
    }
    normalize_peak(&mut pulse);
    pulse
}

/// Scale values so the largest magnitude is 1. All-zero input is left alone.
fn normalize_peak(values: &mut [f64]) {
    let max_val = values.iter().fold(0.0_f64, |a, b| a.max(b.abs()));
    if max_val > 1e-12 {
        for value in values.iter_mut() {
            *value /= max_val;
        }
    }
}
