//! Windowed offset search.
//!
//! The scope recording is cut into overlapping slices (see
//! [`plan_slices`](super::slices::plan_slices)); every slice is decoded,
//! featurized and correlated against one cached excerpt of the target. The
//! best `(offset, score)` seen so far is kept in a [`SearchState`] and the
//! loop stops as soon as a slice scores above the passing threshold.
//!
//! Decode failures are fatal. Extraction or scoring failures of a single
//! slice follow the configured [`SliceFailurePolicy`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Settings, SliceFailurePolicy};

use super::alignment::AlignmentAction;
use super::correlation::{correlate, CorrelationMatch};
use super::decoder::{DecodeRequest, Decoder};
use super::features::{FeatureConfig, FeatureExtractor};
use super::slices::plan_slices;
use super::types::{AnalysisError, AnalysisResult, AudioData, FeatureSequence};

/// Runtime configuration for the offset search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Sample rate both recordings are decoded at.
    pub sample_rate: u32,
    /// Length of one scope slice (and of the target excerpt) in seconds.
    pub window_seconds: f64,
    /// Audio shared by consecutive slices in seconds.
    pub overlap_seconds: f64,
    /// A slice scoring strictly above this ends the search.
    pub passing_score: f64,
    /// Upper bound for the target pre-skip in seconds.
    pub target_preskip_cap_seconds: f64,
    /// Query frames compared at each lag.
    pub correlation_frames: usize,
    /// What to do when one slice cannot be scored.
    pub slice_failure: SliceFailurePolicy,
    /// Keep the winning correlation curve in the result.
    pub keep_curve: bool,
    /// Feature extraction settings.
    pub features: FeatureConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            window_seconds: 900.0,
            overlap_seconds: 60.0,
            passing_score: 8.0,
            target_preskip_cap_seconds: 180.0,
            correlation_frames: 1000,
            slice_failure: SliceFailurePolicy::Skip,
            keep_curve: false,
            features: FeatureConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Create from application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let search = &settings.search;
        Self {
            sample_rate: search.sample_rate,
            window_seconds: search.window_seconds,
            overlap_seconds: search.overlap_seconds,
            passing_score: search.passing_score,
            target_preskip_cap_seconds: search.target_preskip_cap_seconds,
            correlation_frames: search.correlation_frames,
            slice_failure: search.slice_failure,
            keep_curve: search.keep_curve,
            features: FeatureConfig::from_settings(&settings.features),
        }
    }

    /// Reject configurations the search cannot run with.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.window_seconds.is_nan() || self.window_seconds <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        let window_samples = self.window_seconds * self.sample_rate as f64;
        if window_samples < self.features.n_fft as f64 {
            return Err(AnalysisError::InvalidConfig(format!(
                "window of {}s holds fewer samples than one {}-point analysis frame",
                self.window_seconds, self.features.n_fft
            )));
        }
        if self.overlap_seconds.is_nan() || self.overlap_seconds < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "overlap_seconds must not be negative, got {}",
                self.overlap_seconds
            )));
        }
        if self.target_preskip_cap_seconds.is_nan() || self.target_preskip_cap_seconds < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "target_preskip_cap_seconds must not be negative, got {}",
                self.target_preskip_cap_seconds
            )));
        }
        if self.passing_score.is_nan() {
            return Err(AnalysisError::InvalidConfig(
                "passing_score must be a number".to_string(),
            ));
        }
        if self.correlation_frames == 0 {
            return Err(AnalysisError::InvalidConfig(
                "correlation_frames must be positive".to_string(),
            ));
        }
        self.features.validate()
    }

    /// Pre-skip applied to a target of `target_duration` seconds.
    pub fn target_preskip(&self, target_duration: f64) -> f64 {
        (target_duration / 3.0).min(self.target_preskip_cap_seconds).max(0.0)
    }
}

/// Outcome of one scope slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceReport {
    pub index: usize,
    /// Slice start in the scope, pre-offset included.
    pub start_seconds: f64,
    /// Slice end in the scope, pre-offset included.
    pub end_seconds: f64,
    /// Best lag inside the slice in seconds.
    pub local_offset_seconds: Option<f64>,
    /// Global offset this slice proposes.
    pub candidate_offset_seconds: Option<f64>,
    pub score: Option<f64>,
    /// Why the slice could not be scored.
    pub failure: Option<String>,
}

/// Result of an offset search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetMatch {
    /// Where the target starts in the scope, in seconds. Negative when the
    /// target starts before the scope.
    pub offset_seconds: f64,
    /// Standard score of the winning correlation peak.
    pub score: f64,
    /// Number of slices decoded and examined.
    pub slices_evaluated: usize,
    /// Per-slice outcomes in evaluation order.
    pub slices: Vec<SliceReport>,
    /// Seconds skipped at the start of the target.
    pub target_preskip_seconds: f64,
    /// Winning correlation curve, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<Vec<f64>>,
}

impl OffsetMatch {
    /// How a consumer should shift the scope audio to line up with the target.
    pub fn alignment(&self) -> AlignmentAction {
        AlignmentAction::from_offset(self.offset_seconds)
    }

    /// Pretty JSON report, curve included when it was kept.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Mutable state of one search, owned by the controller.
#[derive(Debug)]
pub struct SearchState {
    target: FeatureSequence,
    slice_index: usize,
    best_score: Option<f64>,
    best_offset_seconds: f64,
    best_curve: Option<Vec<f64>>,
}

impl SearchState {
    /// Fresh state around the cached target excerpt features.
    pub fn new(target: FeatureSequence) -> Self {
        Self {
            target,
            slice_index: 0,
            best_score: None,
            best_offset_seconds: 0.0,
            best_curve: None,
        }
    }

    /// Cached target excerpt features.
    pub fn target(&self) -> &FeatureSequence {
        &self.target
    }

    /// Slice currently being examined.
    pub fn slice_index(&self) -> usize {
        self.slice_index
    }

    /// Best score so far, if any slice was scored.
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Offset belonging to [`SearchState::best_score`].
    pub fn best_offset_seconds(&self) -> f64 {
        self.best_offset_seconds
    }

    fn begin_slice(&mut self, index: usize) {
        self.slice_index = index;
    }

    /// Record a candidate; returns whether it became the new best.
    fn consider(&mut self, offset_seconds: f64, score: f64, curve: Option<Vec<f64>>) -> bool {
        if self.best_score.is_some_and(|best| score <= best) {
            return false;
        }
        self.best_score = Some(score);
        self.best_offset_seconds = offset_seconds;
        self.best_curve = curve;
        true
    }
}

/// Offset search driven by a [`Decoder`].
pub struct OffsetSearch<D: Decoder> {
    config: SearchConfig,
    decoder: D,
    extractor: FeatureExtractor,
}

impl<D: Decoder> OffsetSearch<D> {
    /// Validate `config` and build the feature pipeline.
    pub fn new(config: SearchConfig, decoder: D) -> AnalysisResult<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.features.clone(), config.sample_rate)?;
        Ok(Self {
            config,
            decoder,
            extractor,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Find where `target` starts inside `scope`.
    ///
    /// The first `pre_offset_seconds` of the scope are ignored; the returned
    /// offset is still measured from the start of the scope file.
    pub fn find_offset(
        &self,
        scope: &Path,
        target: &Path,
        pre_offset_seconds: f64,
    ) -> AnalysisResult<OffsetMatch> {
        let cfg = &self.config;
        let rate = cfg.sample_rate;
        let pre_offset_seconds = pre_offset_seconds.max(0.0);

        let scope_duration = (self.decoder.duration(scope)? - pre_offset_seconds).max(0.0);
        let target_duration = self.decoder.duration(target)?;
        let preskip = cfg.target_preskip(target_duration);

        tracing::info!(
            "Searching {} ({:.1}s after {:.1}s pre-offset) for {} ({:.1}s, pre-skip {:.1}s)",
            scope.display(),
            scope_duration,
            pre_offset_seconds,
            target.display(),
            target_duration,
            preskip
        );

        // Target excerpt: decoded and featurized once, clip dropped right after
        let target_features = {
            let clip = self.decoder.decode(
                target,
                &DecodeRequest::range(rate, preskip, cfg.window_seconds),
            )?;
            self.extractor
                .extract(&clip.audio)
                .map_err(|err| err.in_file(target))?
        };

        let total_samples = (scope_duration * rate as f64).floor() as usize;
        let plan = plan_slices(total_samples, rate, cfg.window_seconds, cfg.overlap_seconds);
        if plan.is_empty() {
            return Err(AnalysisError::InsufficientAudioData {
                needed: cfg.features.n_fft,
                got: total_samples,
            });
        }

        let mut state = SearchState::new(target_features);
        let mut reports = Vec::with_capacity(plan.len());
        let mut first_failure: Option<AnalysisError> = None;

        for bounds in &plan {
            state.begin_slice(bounds.index);

            let slice_start = pre_offset_seconds + bounds.start_secs(rate);
            let mut report = SliceReport {
                index: bounds.index,
                start_seconds: slice_start,
                end_seconds: pre_offset_seconds + bounds.end_secs(rate),
                local_offset_seconds: None,
                candidate_offset_seconds: None,
                score: None,
                failure: None,
            };

            let scored = {
                let clip = self.decoder.decode(
                    scope,
                    &DecodeRequest::range(rate, slice_start, bounds.len() as f64 / rate as f64),
                )?;
                self.score_slice(&clip.audio, state.target())
            };

            match scored {
                Ok((matched, seconds_per_frame)) => {
                    let local = matched.to_match(seconds_per_frame).offset_seconds;
                    let candidate = slice_start + local - preskip;

                    tracing::debug!(
                        "Slice {} [{:.1}s..{:.1}s]: local {:.3}s, offset {:.3}s, score {:.2}",
                        bounds.index,
                        report.start_seconds,
                        report.end_seconds,
                        local,
                        candidate,
                        matched.score
                    );

                    report.local_offset_seconds = Some(local);
                    report.candidate_offset_seconds = Some(candidate);
                    report.score = Some(matched.score);
                    reports.push(report);

                    let curve = cfg.keep_curve.then_some(matched.curve);
                    state.consider(candidate, matched.score, curve);

                    if matched.score > cfg.passing_score {
                        tracing::debug!(
                            "Slice {} passed ({:.2} > {:.2}), stopping",
                            bounds.index,
                            matched.score,
                            cfg.passing_score
                        );
                        break;
                    }
                }
                Err(err) => match cfg.slice_failure {
                    SliceFailurePolicy::Abort => return Err(err.in_slice(bounds.index)),
                    SliceFailurePolicy::Skip => {
                        tracing::warn!("Skipping slice {}: {}", bounds.index, err);
                        report.failure = Some(err.to_string());
                        reports.push(report);
                        first_failure.get_or_insert(err.in_slice(bounds.index));
                    }
                },
            }
        }

        let slices_evaluated = reports.len();
        let Some(score) = state.best_score else {
            return Err(first_failure.unwrap_or(AnalysisError::InsufficientAudioData {
                needed: cfg.features.n_fft,
                got: total_samples,
            }));
        };

        tracing::info!(
            "Offset {:.3}s (score {:.2}) after {} of {} slices",
            state.best_offset_seconds,
            score,
            slices_evaluated,
            plan.len()
        );

        Ok(OffsetMatch {
            offset_seconds: state.best_offset_seconds,
            score,
            slices_evaluated,
            slices: reports,
            target_preskip_seconds: preskip,
            curve: state.best_curve,
        })
    }

    /// Correlate two in-memory recordings directly, without slicing or
    /// pre-skip.
    pub fn align_clips(&self, scope: &AudioData, target: &AudioData) -> AnalysisResult<OffsetMatch> {
        let target_features = self.extractor.extract(target)?;
        let (matched, seconds_per_frame) = self.score_slice(scope, &target_features)?;
        let offset = matched.to_match(seconds_per_frame).offset_seconds;

        tracing::debug!("Single-shot offset {:.3}s, score {:.2}", offset, matched.score);

        Ok(OffsetMatch {
            offset_seconds: offset,
            score: matched.score,
            slices_evaluated: 1,
            slices: vec![SliceReport {
                index: 0,
                start_seconds: 0.0,
                end_seconds: scope.duration(),
                local_offset_seconds: Some(offset),
                candidate_offset_seconds: Some(offset),
                score: Some(matched.score),
                failure: None,
            }],
            target_preskip_seconds: 0.0,
            curve: self.config.keep_curve.then_some(matched.curve),
        })
    }

    /// Featurize one slice and correlate it against the target features.
    ///
    /// The query never covers more than half of the slice, so even a slice
    /// as long as the target excerpt keeps a range of lags to score.
    ///
    /// Returns the match and the slice's seconds-per-frame.
    fn score_slice(
        &self,
        audio: &AudioData,
        target: &FeatureSequence,
    ) -> AnalysisResult<(CorrelationMatch, f64)> {
        let reference = self.extractor.extract(audio)?;
        let nframes = self
            .config
            .correlation_frames
            .min(target.len())
            .min((reference.len() / 2).max(1));
        let matched = correlate(&reference, target, nframes)?;
        Ok((matched, reference.seconds_per_frame()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decoder::MemoryDecoder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// 16 frames per second with the default 512-sample hop.
    const RATE: u32 = 8192;
    /// One analysis frame.
    const FRAME: f64 = 512.0 / RATE as f64;

    /// Noise with a random gain every quarter second.
    fn envelope_noise(seconds: f64, seed: u64) -> AudioData {
        let mut rng = StdRng::seed_from_u64(seed);
        let len = (seconds * RATE as f64) as usize;
        let block = RATE as usize / 4;
        let mut samples = Vec::with_capacity(len);
        let mut gain = 0.0;
        for i in 0..len {
            if i % block == 0 {
                gain = rng.gen_range(0.05..1.0);
            }
            samples.push(gain * rng.gen_range(-1.0..1.0));
        }
        AudioData::new(samples, RATE)
    }

    fn shifted(audio: &AudioData, seconds: f64) -> AudioData {
        audio.sample_range((seconds * RATE as f64) as usize, audio.len())
    }

    fn test_config(window_seconds: f64, overlap_seconds: f64) -> SearchConfig {
        SearchConfig {
            sample_rate: RATE,
            window_seconds,
            overlap_seconds,
            passing_score: 8.0,
            target_preskip_cap_seconds: 5.0,
            correlation_frames: 150,
            ..Default::default()
        }
    }

    fn search(
        config: SearchConfig,
        scope: AudioData,
        target: AudioData,
    ) -> OffsetSearch<MemoryDecoder> {
        let decoder = MemoryDecoder::new()
            .with_source("scope.wav", scope)
            .with_source("target.wav", target);
        OffsetSearch::new(config, decoder).unwrap()
    }

    fn run(search: &OffsetSearch<MemoryDecoder>) -> AnalysisResult<OffsetMatch> {
        search.find_offset(Path::new("scope.wav"), Path::new("target.wav"), 0.0)
    }

    #[test]
    fn identical_recordings_have_zero_offset() {
        let audio = envelope_noise(60.0, 1);
        let search = search(test_config(100.0, 10.0), audio.clone(), audio);

        let result = run(&search).unwrap();

        assert!(result.offset_seconds.abs() < FRAME, "offset {}", result.offset_seconds);
        assert!(result.score > 8.0, "score {}", result.score);
        assert!((result.target_preskip_seconds - 5.0).abs() < 1e-12);
        assert_eq!(result.slices_evaluated, 1);
    }

    #[test]
    fn finds_shift_with_scope_shorter_than_window() {
        let scope = envelope_noise(60.0, 2);
        let target = shifted(&scope, 12.0);
        let search = search(test_config(100.0, 10.0), scope, target);

        let result = run(&search).unwrap();

        assert!((result.offset_seconds - 12.0).abs() < FRAME, "offset {}", result.offset_seconds);
        assert!(result.score > 8.0);
    }

    #[test]
    fn finds_shift_with_scope_longer_than_window() {
        let scope = envelope_noise(150.0, 3);
        let target = shifted(&scope, 12.0);
        let search = search(test_config(30.0, 10.0), scope, target);

        let result = run(&search).unwrap();

        assert!((result.offset_seconds - 12.0).abs() < FRAME, "offset {}", result.offset_seconds);
        assert!(result.score > 8.0);
    }

    #[test]
    fn finds_offset_in_later_slice() {
        let scope = envelope_noise(150.0, 4);
        let target = shifted(&scope, 100.0);
        let search = search(test_config(30.0, 10.0), scope, target);

        let result = run(&search).unwrap();

        assert!((result.offset_seconds - 100.0).abs() < FRAME, "offset {}", result.offset_seconds);
        // Excerpt starts at 105s, inside slice 3 = [80s, 120s)
        let winner = result
            .slices
            .iter()
            .find(|s| s.score == Some(result.score))
            .unwrap();
        assert_eq!(winner.index, 3);
        assert!((winner.start_seconds - 80.0).abs() < 1e-9);
    }

    #[test]
    fn pre_offset_is_added_back() {
        let scope = envelope_noise(90.0, 5);
        let target = shifted(&scope, 40.0);
        let search = search(test_config(100.0, 10.0), scope, target);

        let result = search
            .find_offset(Path::new("scope.wav"), Path::new("target.wav"), 20.0)
            .unwrap();

        assert!((result.offset_seconds - 40.0).abs() < FRAME, "offset {}", result.offset_seconds);
        assert!((result.slices[0].start_seconds - 20.0).abs() < 1e-9);
    }

    #[test]
    fn short_windows_keep_a_lag_range() {
        let scope = envelope_noise(60.0, 15);
        let target = shifted(&scope, 12.0);
        for window in [5.0, 10.0] {
            let config = SearchConfig {
                passing_score: 1e9,
                slice_failure: SliceFailurePolicy::Abort,
                ..test_config(window, 60.0)
            };
            let search = search(config, scope.clone(), target.clone());

            let result = run(&search).unwrap();

            assert!(
                (result.offset_seconds - 12.0).abs() < FRAME,
                "window {}: offset {}",
                window,
                result.offset_seconds
            );
            assert!(result.slices.iter().all(|s| s.failure.is_none()));
        }
    }

    #[test]
    fn slices_without_overlap_still_score() {
        let scope = envelope_noise(60.0, 16);
        let target = shifted(&scope, 12.0);
        for policy in [SliceFailurePolicy::Skip, SliceFailurePolicy::Abort] {
            let config = SearchConfig {
                slice_failure: policy,
                ..test_config(30.0, 0.0)
            };
            let search = search(config, scope.clone(), target.clone());

            let result = run(&search).unwrap();

            assert!(
                (result.offset_seconds - 12.0).abs() < FRAME,
                "{:?}: offset {}",
                policy,
                result.offset_seconds
            );
            assert!(result.slices[0].failure.is_none());
            assert!(result.slices[0].score.is_some());
        }
    }

    #[test]
    fn passing_slice_stops_the_search() {
        let scope = envelope_noise(70.0, 6);
        let target = shifted(&scope, 45.0);
        let config = SearchConfig {
            passing_score: 0.0,
            ..test_config(20.0, 5.0)
        };
        let search = search(config, scope, target);

        let result = run(&search).unwrap();

        assert_eq!(result.slices_evaluated, 1);
        // Target excerpt plus one slice
        assert_eq!(search.decoder().decode_calls(), 2);
    }

    #[test]
    fn evaluates_every_overlapping_slice_without_early_exit() {
        let scope = envelope_noise(70.0, 7);
        let target = shifted(&scope, 45.0);
        let config = SearchConfig {
            passing_score: 1e9,
            ..test_config(20.0, 5.0)
        };
        let search = search(config, scope, target);

        let result = run(&search).unwrap();

        assert_eq!(result.slices_evaluated, 4);
        assert_eq!(search.decoder().decode_calls(), 5);
        for pair in result.slices.windows(2) {
            assert!((pair[0].end_seconds - pair[1].start_seconds - 5.0).abs() < 1e-9);
        }
        assert!((result.offset_seconds - 45.0).abs() < FRAME, "offset {}", result.offset_seconds);
    }

    #[test]
    fn corrupt_slice_is_skipped_by_default() {
        crate::logging::init_test_tracing();
        let scope = envelope_noise(70.0, 8);
        let target = shifted(&scope, 45.0);
        let config = SearchConfig {
            passing_score: 1e9,
            ..test_config(20.0, 5.0)
        };
        let mut decoder = MemoryDecoder::new()
            .with_source("scope.wav", scope)
            .with_source("target.wav", target);
        // Only slice 1 = [15s, 40s) covers this region
        decoder.corrupt_region("scope.wav", 22.0, 24.0);
        let search = OffsetSearch::new(config, decoder).unwrap();

        let result = run(&search).unwrap();

        assert_eq!(result.slices_evaluated, 4);
        assert!(result.slices[1].failure.is_some());
        assert!(result.slices[1].score.is_none());
        assert!(result.slices[0].failure.is_none());
        assert!((result.offset_seconds - 45.0).abs() < FRAME);
    }

    #[test]
    fn corrupt_slice_aborts_when_configured() {
        let scope = envelope_noise(70.0, 8);
        let target = shifted(&scope, 45.0);
        let config = SearchConfig {
            passing_score: 1e9,
            slice_failure: SliceFailurePolicy::Abort,
            ..test_config(20.0, 5.0)
        };
        let mut decoder = MemoryDecoder::new()
            .with_source("scope.wav", scope)
            .with_source("target.wav", target);
        decoder.corrupt_region("scope.wav", 22.0, 24.0);
        let search = OffsetSearch::new(config, decoder).unwrap();

        let err = run(&search).unwrap_err();

        match err {
            AnalysisError::SliceFailed { slice, source } => {
                assert_eq!(slice, 1);
                assert!(matches!(*source, AnalysisError::DegenerateSignal(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing decoded after the failing slice
        assert_eq!(search.decoder().decode_calls(), 3);
        for path in search.decoder().artifact_paths() {
            assert!(!path.exists());
        }
    }

    #[test]
    fn every_slice_failing_reports_first_failure() {
        let scope = envelope_noise(50.0, 9);
        let target = shifted(&scope, 10.0);
        let mut decoder = MemoryDecoder::new()
            .with_source("scope.wav", scope)
            .with_source("target.wav", target);
        decoder.corrupt_region("scope.wav", 0.0, 50.0);
        let search = OffsetSearch::new(test_config(20.0, 5.0), decoder).unwrap();

        let err = run(&search).unwrap_err();
        assert!(matches!(err, AnalysisError::SliceFailed { slice: 0, .. }));
    }

    #[test]
    fn decoded_artifacts_are_removed() {
        let scope = envelope_noise(70.0, 10);
        let target = shifted(&scope, 45.0);
        let config = SearchConfig {
            passing_score: 1e9,
            ..test_config(20.0, 5.0)
        };
        let search = search(config, scope, target);

        run(&search).unwrap();

        let artifacts = search.decoder().artifact_paths();
        assert_eq!(artifacts.len(), search.decoder().decode_calls());
        for path in artifacts {
            assert!(!path.exists(), "{} left behind", path.display());
        }
    }

    #[test]
    fn undecodable_target_is_fatal() {
        let decoder = MemoryDecoder::new().with_source("scope.wav", envelope_noise(30.0, 11));
        let search = OffsetSearch::new(test_config(20.0, 5.0), decoder).unwrap();

        let err = run(&search).unwrap_err();
        assert!(matches!(err, AnalysisError::AudioDecodeFailed { .. }));
    }

    #[test]
    fn unusable_target_names_the_file() {
        let short_target = AudioData::new(envelope_noise(1.0, 17).samples[..100].to_vec(), RATE);
        let search = search(test_config(20.0, 5.0), envelope_noise(30.0, 17), short_target);

        let err = run(&search).unwrap_err();

        assert!(err.to_string().contains("target.wav"), "{}", err);
        match err {
            AnalysisError::FileFailed { path, source } => {
                assert_eq!(path, Path::new("target.wav"));
                assert!(matches!(*source, AnalysisError::InsufficientAudioData { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undecodable_scope_is_fatal() {
        let decoder = MemoryDecoder::new().with_source("target.wav", envelope_noise(30.0, 12));
        let search = OffsetSearch::new(test_config(20.0, 5.0), decoder).unwrap();

        let err = run(&search).unwrap_err();
        assert!(matches!(err, AnalysisError::AudioDecodeFailed { .. }));
        assert_eq!(search.decoder().decode_calls(), 0);
    }

    #[test]
    fn keeps_curve_on_request() {
        let scope = envelope_noise(60.0, 13);
        let target = shifted(&scope, 12.0);
        let config = SearchConfig {
            keep_curve: true,
            ..test_config(100.0, 10.0)
        };
        let search = search(config, scope, target);

        let result = run(&search).unwrap();
        let json = result.to_json_pretty().unwrap();
        assert!(json.contains("\"curve\""));
        assert!(json.contains("\"slices_evaluated\": 1"));

        let curve = result.curve.unwrap();
        assert!(!curve.is_empty());
        assert!(curve.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn single_shot_alignment() {
        let scope = envelope_noise(40.0, 14);
        let target = shifted(&scope, 12.0);
        let search = search(test_config(100.0, 10.0), scope.clone(), target.clone());

        let result = search.align_clips(&scope, &target).unwrap();

        assert!((result.offset_seconds - 12.0).abs() < FRAME, "offset {}", result.offset_seconds);
        assert_eq!(result.target_preskip_seconds, 0.0);
        assert_eq!(result.alignment(), AlignmentAction::Seek { seconds: result.offset_seconds });
    }

    #[test]
    fn state_keeps_strictly_better_candidates() {
        let mut state = SearchState::new(FeatureSequence::from_flat(vec![0.0; 4], 2, 0.1));
        assert!(state.best_score().is_none());

        assert!(state.consider(1.0, 5.0, None));
        // Equal score does not replace the earlier slice
        assert!(!state.consider(2.0, 5.0, None));
        assert!(state.consider(3.0, 9.0, Some(vec![1.0])));

        assert_eq!(state.best_score(), Some(9.0));
        assert_eq!(state.best_offset_seconds(), 3.0);
        assert_eq!(state.target().len(), 2);
    }

    #[test]
    fn preskip_is_capped() {
        let config = SearchConfig::default();
        assert!((config.target_preskip(90.0) - 30.0).abs() < 1e-12);
        assert!((config.target_preskip(3600.0) - 180.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SearchConfig {
            window_seconds: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            OffsetSearch::new(config, MemoryDecoder::new()),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let config = SearchConfig {
            correlation_frames: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(SearchConfig::default().validate().is_ok());
    }
}
