//! Frequency-domain descriptors: centroid, rolloff and chroma.
//!
//! Centroid and rolloff are returned divided by the sample rate so values
//! from recordings decoded at different rates stay comparable.

/// Reference frequency for pitch class 0 (C0).
const CHROMA_REFERENCE_HZ: f64 = 16.351_597_831_287_414;

/// Bins below this frequency carry no usable pitch information.
const CHROMA_MIN_HZ: f64 = 32.0;

/// Spectral descriptors for one sample rate and FFT size.
#[derive(Debug, Clone)]
pub struct SpectralDescriptors {
    sample_rate: f64,
    frequencies: Vec<f64>,
    rolloff_percent: f64,
}

impl SpectralDescriptors {
    /// Create descriptors for bins centered at `frequencies`.
    pub fn new(frequencies: Vec<f64>, sample_rate: u32, rolloff_percent: f64) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            frequencies,
            rolloff_percent,
        }
    }

    /// Spectral centroid divided by the sample rate.
    ///
    /// Formula: Σ(f_i × |X[i]|) / Σ|X[i]| / sample_rate
    pub fn centroid(&self, magnitude: &[f64]) -> f64 {
        let weighted: f64 = magnitude
            .iter()
            .zip(self.frequencies.iter())
            .map(|(m, f)| m * f)
            .sum();
        let total: f64 = magnitude.iter().sum();

        if total > 1e-12 {
            weighted / total / self.sample_rate
        } else {
            0.0
        }
    }

    /// Frequency below which `rolloff_percent` of the magnitude lies, divided
    /// by the sample rate.
    pub fn rolloff(&self, magnitude: &[f64]) -> f64 {
        let total: f64 = magnitude.iter().sum();
        if total <= 1e-12 {
            return 0.0;
        }

        let threshold = total * self.rolloff_percent;
        let mut cumulative = 0.0;
        for (m, f) in magnitude.iter().zip(self.frequencies.iter()) {
            cumulative += m;
            if cumulative >= threshold {
                return f / self.sample_rate;
            }
        }

        self.frequencies.last().copied().unwrap_or(0.0) / self.sample_rate
    }
}

/// Folds spectral power into `n_chroma` pitch classes.
#[derive(Debug, Clone)]
pub struct ChromaMap {
    n_chroma: usize,
    bin_classes: Vec<Option<usize>>,
}

impl ChromaMap {
    /// Assign every FFT bin at or above [`CHROMA_MIN_HZ`] to its nearest pitch class.
    pub fn new(n_chroma: usize, frequencies: &[f64]) -> Self {
        let bin_classes = frequencies
            .iter()
            .map(|&f| {
                if f < CHROMA_MIN_HZ || n_chroma == 0 {
                    return None;
                }
                let steps = (n_chroma as f64 * (f / CHROMA_REFERENCE_HZ).log2()).round() as i64;
                Some(steps.rem_euclid(n_chroma as i64) as usize)
            })
            .collect();

        Self {
            n_chroma,
            bin_classes,
        }
    }

    /// Chroma energy profile of one power spectrum, scaled so its maximum is 1.
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        let mut chroma = vec![0.0; self.n_chroma];
        for (p, class) in power.iter().zip(self.bin_classes.iter()) {
            if let Some(c) = class {
                chroma[*c] += p;
            }
        }

        let max = chroma.iter().cloned().fold(0.0_f64, f64::max);
        if max > 1e-12 {
            for value in &mut chroma {
                *value /= max;
            }
        }
        chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::stft::bin_frequencies;

    fn single_bin(bins: usize, at: usize) -> Vec<f64> {
        let mut spectrum = vec![0.0; bins];
        spectrum[at] = 1.0;
        spectrum
    }

    #[test]
    fn centroid_of_single_bin_is_its_frequency() {
        let freqs = bin_frequencies(512, 8000);
        let desc = SpectralDescriptors::new(freqs, 8000, 0.1);
        // Bin 64 = 1000 Hz
        let centroid = desc.centroid(&single_bin(257, 64));
        assert!((centroid - 1000.0 / 8000.0).abs() < 1e-12);
    }

    #[test]
    fn centroid_is_rate_normalized() {
        let a = SpectralDescriptors::new(bin_frequencies(512, 8000), 8000, 0.1);
        let b = SpectralDescriptors::new(bin_frequencies(512, 16000), 16000, 0.1);
        let spectrum = single_bin(257, 32);
        assert!((a.centroid(&spectrum) - b.centroid(&spectrum)).abs() < 1e-12);
    }

    #[test]
    fn rolloff_tracks_low_energy_fraction() {
        let desc = SpectralDescriptors::new(bin_frequencies(16, 1600), 1600, 0.5);
        // Equal energy in bins 1..=4: half is reached at bin 2 (200 Hz)
        let spectrum = vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        assert!((desc.rolloff(&spectrum) - 200.0 / 1600.0).abs() < 1e-12);
    }

    #[test]
    fn silent_spectrum_gives_zero() {
        let desc = SpectralDescriptors::new(bin_frequencies(512, 8000), 8000, 0.1);
        let silent = vec![0.0; 257];
        assert_eq!(desc.centroid(&silent), 0.0);
        assert_eq!(desc.rolloff(&silent), 0.0);
    }

    #[test]
    fn octaves_share_a_pitch_class() {
        let map = ChromaMap::new(12, &[110.0, 220.0, 440.0, 880.0]);
        let classes: Vec<_> = map.bin_classes.iter().map(|c| c.unwrap()).collect();
        assert!(classes.windows(2).all(|w| w[0] == w[1]));
        // A is 9 semitones above C
        assert_eq!(classes[0], 9);
    }

    #[test]
    fn chroma_is_max_normalized() {
        let map = ChromaMap::new(12, &[0.0, 110.0, 130.81]);
        let chroma = map.apply(&[5.0, 4.0, 2.0]);
        assert_eq!(chroma.len(), 12);
        assert!((chroma[9] - 1.0).abs() < 1e-12);
        assert!((chroma[0] - 0.5).abs() < 1e-12);
        // DC bin is excluded
        assert!((chroma.iter().sum::<f64>() - 1.5).abs() < 1e-12);
    }
}
