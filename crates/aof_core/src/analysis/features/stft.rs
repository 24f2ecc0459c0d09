//! Short-time Fourier analysis on a centered frame grid.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Per-frame power spectra and RMS energy of a signal.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Power spectrum per frame (`n_fft / 2 + 1` bins each).
    pub power: Vec<Vec<f64>>,
    /// RMS energy of the raw samples in each frame.
    pub rms: Vec<f64>,
}

impl Spectrogram {
    /// Number of frames.
    pub fn num_frames(&self) -> usize {
        self.power.len()
    }
}

/// STFT processor with a fixed window and hop.
///
/// Frame `t` is centered on sample `t * hop_length`; samples outside the
/// signal read as zero, so a signal of `n` samples yields `1 + n / hop_length`
/// frames.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl Stft {
    /// Create a processor for the given FFT size and hop.
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            fft,
        }
    }

    /// Number of positive-frequency bins.
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Copy the frame centered on `index * hop_length` into `out`.
    fn fill_frame(&self, samples: &[f64], index: usize, out: &mut [f64]) {
        let start = (index * self.hop_length) as isize - (self.n_fft / 2) as isize;
        for (n, slot) in out.iter_mut().enumerate() {
            let idx = start + n as isize;
            *slot = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize]
            } else {
                0.0
            };
        }
    }

    /// Compute the power spectrogram and frame energy of `samples`.
    pub fn analyze(&self, samples: &[f64]) -> Spectrogram {
        let num_frames = self.frame_count(samples.len());
        let num_bins = self.num_bins();

        let mut power = Vec::with_capacity(num_frames);
        let mut rms = Vec::with_capacity(num_frames);

        let mut frame = vec![0.0; self.n_fft];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];

        for index in 0..num_frames {
            self.fill_frame(samples, index, &mut frame);

            let energy: f64 = frame.iter().map(|s| s * s).sum::<f64>() / self.n_fft as f64;
            rms.push(energy.sqrt());

            for ((slot, &s), &w) in buffer.iter_mut().zip(frame.iter()).zip(self.window.iter()) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);

            power.push(buffer[..num_bins].iter().map(|c| c.norm_sqr()).collect());
        }

        Spectrogram { power, rms }
    }
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Center frequency in Hz of each positive FFT bin.
pub fn bin_frequencies(n_fft: usize, sample_rate: u32) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_follows_centered_grid() {
        let stft = Stft::new(512, 256);
        assert_eq!(stft.frame_count(0), 1);
        assert_eq!(stft.frame_count(512), 3);
        assert_eq!(stft.frame_count(1000), 4);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sample_rate = 8000;
        let n_fft = 512;
        // 1000 Hz lands exactly on bin 64
        let samples: Vec<f64> = (0..4096)
            .map(|i| (2.0 * PI * 1000.0 * i as f64 / sample_rate as f64).sin())
            .collect();

        let spec = Stft::new(n_fft, n_fft).analyze(&samples);
        let middle = &spec.power[spec.num_frames() / 2];
        let peak = middle
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        assert_eq!(peak, 64);
        assert!((bin_frequencies(n_fft, sample_rate)[peak] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn rms_of_full_scale_square_is_one() {
        let samples: Vec<f64> = (0..2048).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let spec = Stft::new(256, 256).analyze(&samples);
        // Interior frames see no padding
        assert!((spec.rms[3] - 1.0).abs() < 1e-12);
        assert!(spec.rms[0] < 1.0);
    }

    #[test]
    fn hann_window_is_zero_at_start() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-12);
    }
}
