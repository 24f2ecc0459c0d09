//! Decoder capability used by the search controller.
//!
//! A decoder turns a source file into mono PCM at a requested rate, for an
//! arbitrary `[start, start + duration)` range. Each decode may materialize a
//! temporary artifact on disk; the artifact belongs to the returned
//! [`DecodedClip`] and is deleted when the clip is dropped, on every exit path.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::types::{AnalysisError, AnalysisResult, AudioData};

/// What to decode from a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeRequest {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Start position in the source, in seconds.
    pub start_secs: f64,
    /// Length to decode; `None` decodes to the end of the source.
    pub duration_secs: Option<f64>,
}

impl DecodeRequest {
    /// Decode the whole source.
    pub fn full(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            start_secs: 0.0,
            duration_secs: None,
        }
    }

    /// Decode `duration_secs` starting at `start_secs`.
    pub fn range(sample_rate: u32, start_secs: f64, duration_secs: f64) -> Self {
        Self {
            sample_rate,
            start_secs,
            duration_secs: Some(duration_secs),
        }
    }
}

/// Decoded PCM plus the temporary artifact it was read from.
#[derive(Debug)]
pub struct DecodedClip {
    pub audio: AudioData,
    artifact: Option<NamedTempFile>,
}

impl DecodedClip {
    /// Clip without an on-disk artifact.
    pub fn in_memory(audio: AudioData) -> Self {
        Self {
            audio,
            artifact: None,
        }
    }

    /// Clip owning `artifact`; the file is removed when the clip drops.
    pub fn with_artifact(audio: AudioData, artifact: NamedTempFile) -> Self {
        Self {
            audio,
            artifact: Some(artifact),
        }
    }

    /// Location of the artifact while the clip is alive.
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact.as_ref().map(|f| f.path())
    }
}

/// Source of decoded audio.
pub trait Decoder: Send + Sync {
    /// Duration of the source in seconds.
    fn duration(&self, source: &Path) -> AnalysisResult<f64>;

    /// Decode the requested range of `source` as mono PCM.
    ///
    /// Any failure is reported as `AudioDecodeFailed`; callers do not retry.
    fn decode(&self, source: &Path, request: &DecodeRequest) -> AnalysisResult<DecodedClip>;
}

/// A region of a registered source that decodes to garbage.
#[derive(Debug, Clone, Copy)]
struct CorruptRegion {
    start_secs: f64,
    end_secs: f64,
}

/// Decoder serving pre-decoded signals from memory.
///
/// Used for tests and for callers that already hold PCM. Every decode writes
/// the clip to a temporary artifact so cleanup behaves like a real decoder.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    sources: HashMap<PathBuf, AudioData>,
    corrupt: HashMap<PathBuf, Vec<CorruptRegion>>,
    decode_calls: AtomicUsize,
    artifacts: Mutex<Vec<PathBuf>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `audio` under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, audio: AudioData) {
        self.sources.insert(path.into(), audio);
    }

    /// Builder form of [`MemoryDecoder::insert`].
    pub fn with_source(mut self, path: impl Into<PathBuf>, audio: AudioData) -> Self {
        self.insert(path, audio);
        self
    }

    /// Make samples of `path` within `[start_secs, end_secs)` decode as NaN.
    pub fn corrupt_region(&mut self, path: impl Into<PathBuf>, start_secs: f64, end_secs: f64) {
        self.corrupt
            .entry(path.into())
            .or_default()
            .push(CorruptRegion {
                start_secs,
                end_secs,
            });
    }

    /// Number of `decode` calls served so far, failed ones included.
    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }

    /// Paths of every artifact handed out so far.
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        self.artifacts
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }

    fn source(&self, path: &Path) -> AnalysisResult<&AudioData> {
        self.sources
            .get(path)
            .ok_or_else(|| AnalysisError::decode_failed(path, "source not registered"))
    }

    fn write_artifact(&self, source: &Path, samples: &[f64]) -> AnalysisResult<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("offset_")
            .suffix(".pcm")
            .tempfile()
            .map_err(|e| AnalysisError::decode_failed(source, format!("artifact: {}", e)))?;

        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        file.write_all(&bytes)
            .map_err(|e| AnalysisError::decode_failed(source, format!("artifact: {}", e)))?;

        if let Ok(mut paths) = self.artifacts.lock() {
            paths.push(file.path().to_path_buf());
        }
        Ok(file)
    }
}

impl Decoder for MemoryDecoder {
    fn duration(&self, source: &Path) -> AnalysisResult<f64> {
        Ok(self.source(source)?.duration())
    }

    fn decode(&self, source: &Path, request: &DecodeRequest) -> AnalysisResult<DecodedClip> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);

        let audio = self.source(source)?;
        if audio.sample_rate != request.sample_rate {
            return Err(AnalysisError::decode_failed(
                source,
                format!(
                    "stored at {} Hz, requested {} Hz",
                    audio.sample_rate, request.sample_rate
                ),
            ));
        }

        let rate = audio.sample_rate as f64;
        let start = (request.start_secs.max(0.0) * rate).round() as usize;
        let end = match request.duration_secs {
            Some(duration) => start + (duration.max(0.0) * rate).round() as usize,
            None => audio.len(),
        };

        let mut clip = audio.sample_range(start, end);
        if clip.is_empty() {
            return Err(AnalysisError::decode_failed(
                source,
                format!("no audio samples at {:.3}s", request.start_secs),
            ));
        }

        if let Some(regions) = self.corrupt.get(source) {
            for region in regions {
                let lo = (region.start_secs * rate).round() as usize;
                let hi = (region.end_secs * rate).round() as usize;
                for (i, sample) in clip.samples.iter_mut().enumerate() {
                    if (lo..hi).contains(&(start + i)) {
                        *sample = f64::NAN;
                    }
                }
            }
        }

        let artifact = self.write_artifact(source, &clip.samples)?;

        tracing::trace!(
            "Decoded {} samples of {} from {:.3}s",
            clip.len(),
            source.display(),
            request.start_secs
        );

        Ok(DecodedClip::with_artifact(clip, artifact))
    }
}
