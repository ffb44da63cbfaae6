//! External encoder adapter
//!
//! Pipes the canonical WAV bytes through the `ffmpeg` CLI for delegated
//! target formats. Every failure maps to `EncodeError`, which makes the
//! engine fall back to the lossless artifact instead of surfacing it.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use layer_audio::{EncodeError, EncodedArtifact, ExportFormat, ExternalEncoder};
use tracing::debug;

/// Delegated encoding via the system `ffmpeg` binary
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    /// Use a specific binary instead of `ffmpeg` from PATH
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Codec and muxer arguments per target format
    fn format_args(format: ExportFormat, bitrate_kbps: u32) -> Vec<String> {
        let bitrate = format!("{}k", bitrate_kbps);
        let args: Vec<&str> = match format {
            ExportFormat::Mp3 => vec!["-c:a", "libmp3lame", "-b:a", &bitrate, "-f", "mp3"],
            ExportFormat::Opus => vec!["-c:a", "libopus", "-b:a", &bitrate, "-f", "opus"],
            ExportFormat::Flac => vec!["-c:a", "flac", "-f", "flac"],
            ExportFormat::WavPack => vec!["-c:a", "wavpack", "-f", "wv"],
            ExportFormat::Wav => vec!["-c:a", "pcm_s16le", "-f", "wav"],
        };
        args.into_iter().map(String::from).collect()
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalEncoder for FfmpegEncoder {
    fn encode(
        &self,
        wav: &[u8],
        format: ExportFormat,
        bitrate_kbps: u32,
    ) -> Result<EncodedArtifact, EncodeError> {
        debug!(
            "delegating {} encode @ {} kbit/s to {}",
            format, bitrate_kbps, self.binary
        );

        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"])
            .args(Self::format_args(format, bitrate_kbps))
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EncodeError::External(format!("failed to spawn {}: {}", self.binary, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncodeError::External("child stdin unavailable".to_string()))?;

        // Feed stdin from a separate thread while draining stdout; the
        // write can hit a closed pipe when ffmpeg exits early, the exit
        // status below tells the real story.
        let payload = wav.to_vec();
        let feeder = thread::spawn(move || {
            let _ = stdin.write_all(&payload);
        });

        let output = child.wait_with_output()?;
        let _ = feeder.join();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::External(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(EncodeError::EmptyOutput);
        }

        Ok(EncodedArtifact {
            bytes: output.stdout,
            format,
            mime: format.mime().to_string(),
        })
    }
}
