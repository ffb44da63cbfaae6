//! Mix export
//!
//! The canonical container is 16-bit little-endian PCM WAV, always
//! producible without external help. Lossy targets are delegated to the
//! `ExternalEncoder` collaborator; when that fails, the canonical artifact
//! is returned instead of an error.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::render::RenderedBuffer;

pub const MIN_BITRATE_KBPS: u32 = 32;
pub const MAX_BITRATE_KBPS: u32 = 512;
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Export container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Canonical lossless PCM container
    Wav,
    #[default]
    Mp3,
    Opus,
    Flac,
    WavPack,
}

impl ExportFormat {
    /// File extension of the container
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Opus => "opus",
            ExportFormat::Flac => "flac",
            ExportFormat::WavPack => "wv",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mpeg",
            ExportFormat::Opus => "audio/opus",
            ExportFormat::Flac => "audio/flac",
            ExportFormat::WavPack => "audio/x-wavpack",
        }
    }

    /// Whether this format is produced in-house, without the collaborator
    pub fn is_lossless(&self) -> bool {
        matches!(self, ExportFormat::Wav)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Error, Debug)]
#[error("unknown export format: {0}")]
pub struct ParseFormatError(String);

impl FromStr for ExportFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            "opus" => Ok(ExportFormat::Opus),
            "flac" => Ok(ExportFormat::Flac),
            "wv" => Ok(ExportFormat::WavPack),
            other => Err(ParseFormatError(other.to_string())),
        }
    }
}

/// Errors raised while encoding a mix
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("container write failed: {0}")]
    Container(String),

    #[error("external encoder failed: {0}")]
    External(String),

    #[error("external encoder produced no output")]
    EmptyOutput,
}

/// An encoded, exportable mix
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub mime: String,
}

/// External lossy-encoder collaborator
///
/// Takes the canonical WAV bytes and returns replacement bytes for the
/// requested format. Never called for the lossless format itself.
pub trait ExternalEncoder {
    fn encode(
        &self,
        wav: &[u8],
        format: ExportFormat,
        bitrate_kbps: u32,
    ) -> Result<EncodedArtifact, EncodeError>;
}

/// Parse a bitrate argument in kbit/s, clamping to the supported range
///
/// Unparsable input falls back to 192.
pub fn parse_bitrate(value: &str) -> u32 {
    value
        .trim()
        .parse::<u32>()
        .unwrap_or(DEFAULT_BITRATE_KBPS)
        .clamp(MIN_BITRATE_KBPS, MAX_BITRATE_KBPS)
}

/// Convert one float sample to 16-bit PCM
///
/// Asymmetric scaling (32768 on the negative side, 32767 on the
/// non-negative side) is part of the container contract and stays
/// bit-exact.
#[inline]
fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Serialize a rendered buffer into the canonical PCM container
pub fn wav_bytes(buffer: &RenderedBuffer) -> Result<Vec<u8>, EncodeError> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
    for frame in 0..buffer.frames() {
        for channel in &buffer.channels {
            writer
                .write_sample(sample_to_i16(channel[frame]))
                .map_err(wav_error)?;
        }
    }
    writer.finalize().map_err(wav_error)?;

    Ok(cursor.into_inner())
}

fn wav_error(e: hound::Error) -> EncodeError {
    match e {
        hound::Error::IoError(io) => EncodeError::Io(io),
        other => EncodeError::Container(other.to_string()),
    }
}

/// Encode the final buffer, delegating lossy formats to the collaborator
///
/// Collaborator failure (or absence) is absorbed: the canonical WAV
/// artifact is returned with a fallback notice in the log.
pub fn encode_mix(
    buffer: &RenderedBuffer,
    format: ExportFormat,
    bitrate_kbps: u32,
    external: Option<&dyn ExternalEncoder>,
) -> Result<EncodedArtifact, EncodeError> {
    let wav = wav_bytes(buffer)?;

    if format.is_lossless() {
        return Ok(lossless_artifact(wav));
    }

    let bitrate = bitrate_kbps.clamp(MIN_BITRATE_KBPS, MAX_BITRATE_KBPS);
    match external {
        Some(encoder) => match encoder.encode(&wav, format, bitrate) {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                warn!("external {} encode failed ({}), falling back to wav", format, err);
                Ok(lossless_artifact(wav))
            }
        },
        None => {
            warn!("no external encoder for {}, falling back to wav", format);
            Ok(lossless_artifact(wav))
        }
    }
}

fn lossless_artifact(bytes: Vec<u8>) -> EncodedArtifact {
    EncodedArtifact {
        bytes,
        format: ExportFormat::Wav,
        mime: ExportFormat::Wav.mime().to_string(),
    }
}
