//! Silence guarding for decoded signals.
//!
//! Decoders (ffmpeg in particular) often emit a run of exact zeros at the
//! start of a stream. Runs of digital silence give zero-variance feature
//! columns and `log(0)` in the cepstral stage, so such signals receive a
//! deterministic, seeded dither of at most [`PERTURBATION_AMPLITUDE`] before
//! feature extraction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound of the dither added to silent signals.
pub const PERTURBATION_AMPLITUDE: f64 = 1e-10;

/// Default seed used when the configuration does not provide one.
pub const DEFAULT_PERTURBATION_SEED: u64 = 0x5EED_0FF5;

/// Number of exact-zero samples at the start of the signal.
pub fn leading_silence_len(samples: &[f64]) -> usize {
    samples.iter().take_while(|&&s| s == 0.0).count()
}

/// Whether the signal must be dithered before feature extraction.
///
/// True when the signal starts with digital silence or is constant
/// throughout.
pub fn needs_perturbation(samples: &[f64]) -> bool {
    if leading_silence_len(samples) > 0 {
        return true;
    }
    match samples.first() {
        Some(&first) => samples.iter().all(|&s| s == first),
        None => false,
    }
}

/// Add seeded uniform noise in `[0, PERTURBATION_AMPLITUDE)` to every sample
/// when [`needs_perturbation`] holds.
///
/// Returns whether the signal was modified. The same seed always produces
/// the same dither.
pub fn perturb_silence(samples: &mut [f64], seed: u64) -> bool {
    if !needs_perturbation(samples) {
        return false;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for sample in samples.iter_mut() {
        *sample += rng.gen::<f64>() * PERTURBATION_AMPLITUDE;
    }

    tracing::trace!(
        "Perturbed {} samples ({} leading zeros)",
        samples.len(),
        leading_silence_len(samples)
    );
    true
}
