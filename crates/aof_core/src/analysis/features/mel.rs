//! Mel filterbank and cepstral coefficients.

use std::f64::consts::PI;

/// Floor applied before taking logarithms of power values.
const POWER_FLOOR: f64 = 1e-10;

/// Convert frequency in Hz to mel scale (HTK formula).
fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

/// Convert mel scale to frequency in Hz.
fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Triangular mel filterbank over the positive FFT bins.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<Vec<f64>>,
}

impl MelFilterbank {
    /// Build `n_mels` area-normalized triangular filters spanning 0 Hz to Nyquist.
    pub fn new(n_mels: usize, n_fft: usize, sample_rate: u32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(sample_rate as f64 / 2.0);

        // n_mels + 2 points for n_mels triangular filters
        let hz_points: Vec<f64> = (0..=n_mels + 1)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();
        let bin_points: Vec<f64> = hz_points
            .iter()
            .map(|&hz| hz * n_fft as f64 / sample_rate as f64)
            .collect();

        let mut filters = vec![vec![0.0; n_bins]; n_mels];

        for (i, filter) in filters.iter_mut().enumerate() {
            let start = bin_points[i];
            let center = bin_points[i + 1];
            let end = bin_points[i + 2];

            for (j, weight) in filter.iter_mut().enumerate() {
                let bin = j as f64;
                if bin >= start && bin < center && center > start {
                    *weight = (bin - start) / (center - start);
                } else if bin >= center && bin <= end && end > center {
                    *weight = (end - bin) / (end - center);
                }
            }

            let bandwidth = hz_points[i + 2] - hz_points[i];
            if bandwidth > 0.0 {
                let norm = 2.0 / bandwidth;
                for weight in filter.iter_mut() {
                    *weight *= norm;
                }
            }
        }

        Self { filters }
    }

    /// Project one power spectrum onto the mel bands.
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.filters
            .iter()
            .map(|filter| filter.iter().zip(power.iter()).map(|(w, p)| w * p).sum())
            .collect()
    }
}

/// Convert power to decibels with a floor to avoid `log(0)`.
pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(POWER_FLOOR).log10()
}

/// First `n_coeffs` outputs of an orthonormal DCT-II of `input`.
pub fn dct_ortho(input: &[f64], n_coeffs: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_coeffs)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}
