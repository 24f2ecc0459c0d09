//! FFmpeg-backed decoder.
//!
//! Transcodes any media FFmpeg understands into mono `f64le` PCM at the
//! analysis sample rate. The PCM is written to a named temporary file that
//! the returned [`DecodedClip`] owns, then read back.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::decoder::{DecodeRequest, DecodedClip, Decoder};
use super::types::{AnalysisError, AnalysisResult, AudioData};

/// Decoder that shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
    /// Directory for PCM artifacts; the system temp dir when unset.
    temp_dir: Option<PathBuf>,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            temp_dir: None,
        }
    }
}

impl FfmpegDecoder {
    /// Decoder using `ffmpeg`/`ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder using explicit executables.
    pub fn with_binaries(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            temp_dir: None,
        }
    }

    /// Write decoded PCM under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn decode_command(&self, source: &Path, request: &DecodeRequest, output: &Path) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", request.start_secs.max(0.0)))
            .arg("-i")
            .arg(source);

        if let Some(duration) = request.duration_secs {
            cmd.arg("-t").arg(format!("{:.3}", duration));
        }

        cmd.arg("-vn") // No video
            .arg("-ac")
            .arg("1") // Mono
            .arg("-ar")
            .arg(request.sample_rate.to_string())
            .arg("-f")
            .arg("f64le")
            .arg("-acodec")
            .arg("pcm_f64le")
            .arg(output);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Decoder for FfmpegDecoder {
    fn duration(&self, source: &Path) -> AnalysisResult<f64> {
        if !source.exists() {
            return Err(AnalysisError::decode_failed(source, "file not found"));
        }

        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(source)
            .output()
            .map_err(|e| AnalysisError::decode_failed(source, format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(AnalysisError::decode_failed(
                source,
                "ffprobe failed to get duration",
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
            .map_err(|reason| AnalysisError::decode_failed(source, reason))
    }

    fn decode(&self, source: &Path, request: &DecodeRequest) -> AnalysisResult<DecodedClip> {
        if !source.exists() {
            return Err(AnalysisError::decode_failed(source, "file not found"));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("offset_").suffix(".pcm");
        let artifact = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| AnalysisError::decode_failed(source, format!("failed to create artifact: {}", e)))?;

        let mut cmd = self.decode_command(source, request, artifact.path());
        tracing::debug!("Running FFmpeg: {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|e| AnalysisError::decode_failed(source, format!("failed to spawn FFmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::decode_failed(
                source,
                format!(
                    "FFmpeg exited with code {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let bytes = std::fs::read(artifact.path())
            .map_err(|e| AnalysisError::decode_failed(source, format!("failed to read artifact: {}", e)))?;
        let samples = bytes_to_f64_samples(&bytes);

        if samples.is_empty() {
            return Err(AnalysisError::decode_failed(source, "no audio samples decoded"));
        }

        tracing::debug!(
            "Decoded {} samples ({:.2}s) from {}",
            samples.len(),
            samples.len() as f64 / request.sample_rate as f64,
            source.display()
        );

        Ok(DecodedClip::with_artifact(
            AudioData::new(samples, request.sample_rate),
            artifact,
        ))
    }
}

/// Parse ffprobe's bare `format=duration` output.
fn parse_duration(text: &str) -> Result<f64, String> {
    let duration = text
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("failed to parse duration '{}': {}", text.trim(), e))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(format!("invalid duration {}", duration));
    }
    Ok(duration)
}

/// Convert raw bytes to f64 samples (little-endian).
fn bytes_to_f64_samples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            f64::from_le_bytes(arr)
        })
        .collect()
}
