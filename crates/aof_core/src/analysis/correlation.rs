//! Sliding cross-correlation of feature sequences.
//!
//! For every candidate lag `k` the first `nframes` query frames are laid over
//! reference frames `k..k + nframes`; the products are summed over time per
//! feature column and the curve value is the L1 norm of those column sums.
//! Column sums are computed with FFT cross-correlation, one column at a time.
//!
//! Pure functions: no I/O, no shared state.

use rustfft::{num_complex::Complex, FftPlanner};

use super::types::{AnalysisError, AnalysisResult, FeatureSequence, MatchResult};

/// Curves whose spread is below this fraction of their magnitude are flat.
///
/// FFT round-off leaves a residue on curves that are constant in exact
/// arithmetic; that residue must not produce a score.
const FLAT_CURVE_TOLERANCE: f64 = 1e-9;

/// Best lag of a correlation curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatch {
    /// Index of the first maximum of the curve.
    pub lag_index: usize,
    /// Standard score of the peak.
    pub score: f64,
    /// One non-negative value per lag, `len(reference) - nframes + 1` long.
    pub curve: Vec<f64>,
}

impl CorrelationMatch {
    /// Express the match in seconds using the frame step of the sequences.
    pub fn to_match(&self, seconds_per_frame: f64) -> MatchResult {
        MatchResult {
            lag_index: self.lag_index,
            offset_seconds: self.lag_index as f64 * seconds_per_frame,
            score: self.score,
        }
    }
}

/// Correlate the first `nframes` frames of `query` against every window of
/// `reference`.
///
/// A query shorter than `nframes` is zero-padded. The reference must hold at
/// least `nframes` frames.
pub fn correlate(
    reference: &FeatureSequence,
    query: &FeatureSequence,
    nframes: usize,
) -> AnalysisResult<CorrelationMatch> {
    if reference.dimension() != query.dimension() {
        return Err(AnalysisError::DimensionMismatch {
            reference: reference.dimension(),
            query: query.dimension(),
        });
    }
    if nframes == 0 || reference.len() < nframes {
        return Err(AnalysisError::InsufficientAudioData {
            needed: nframes.max(1),
            got: reference.len(),
        });
    }

    let curve = correlation_curve(reference, query, nframes);
    let (lag_index, score) = peak_score(&curve)?;

    Ok(CorrelationMatch {
        lag_index,
        score,
        curve,
    })
}

/// Compute the L1-of-column-sums curve for all valid lags.
fn correlation_curve(reference: &FeatureSequence, query: &FeatureSequence, nframes: usize) -> Vec<f64> {
    let ref_len = reference.len();
    let num_lags = ref_len - nframes + 1;
    let used_query = query.len().min(nframes);

    let mut curve = vec![0.0; num_lags];
    if used_query == 0 {
        return curve;
    }

    // Linear (non-circular) correlation needs ref_len + nframes - 1 points
    let fft_len = (ref_len + nframes - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);
    let scale = 1.0 / fft_len as f64;

    let mut ref_buf = vec![Complex::new(0.0, 0.0); fft_len];
    let mut query_buf = vec![Complex::new(0.0, 0.0); fft_len];

    for column in 0..reference.dimension() {
        for slot in ref_buf.iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        for slot in query_buf.iter_mut() {
            *slot = Complex::new(0.0, 0.0);
        }
        for (t, frame) in reference.frames().enumerate() {
            ref_buf[t].re = frame[column];
        }
        // Frames past `used_query` stay zero: that is the padding
        for (t, frame) in query.frames().take(used_query).enumerate() {
            query_buf[t].re = frame[column];
        }

        fft.process(&mut ref_buf);
        fft.process(&mut query_buf);
        for (r, q) in ref_buf.iter_mut().zip(query_buf.iter()) {
            *r *= q.conj();
        }
        ifft.process(&mut ref_buf);

        for (value, sum) in curve.iter_mut().zip(ref_buf.iter()) {
            *value += (sum.re * scale).abs();
        }
    }

    curve
}

/// First maximum of `curve` and its z-score (population standard deviation).
fn peak_score(curve: &[f64]) -> AnalysisResult<(usize, f64)> {
    let n = curve.len() as f64;
    let mean = curve.iter().sum::<f64>() / n;
    let variance = curve.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let magnitude = curve.iter().fold(0.0_f64, |a, b| a.max(b.abs()));
    if !std_dev.is_finite() || std_dev <= magnitude * FLAT_CURVE_TOLERANCE {
        return Err(AnalysisError::UndefinedScore);
    }

    let mut lag_index = 0;
    for (i, &value) in curve.iter().enumerate() {
        if value > curve[lag_index] {
            lag_index = i;
        }
    }

    Ok((lag_index, (curve[lag_index] - mean) / std_dev))
}
