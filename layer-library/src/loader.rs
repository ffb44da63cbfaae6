//! Audio source loading and decoding
//!
//! The decoder collaborator of the mixing pipeline: one file in, one
//! `DecodedSource` out, already deinterleaved per channel and resampled
//! to the session rate. Load failures are per-source; the caller logs
//! and skips, keeping the remaining sources.

use std::path::Path;

use layer_audio::DecodedSource;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading one source
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Audio file loader using Symphonia
pub struct SourceLoader {
    target_sample_rate: u32,
}

impl SourceLoader {
    /// Create a loader that resamples everything to `target_sample_rate`
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Load and decode one audio file into per-channel buffers
    pub fn load(&self, path: &Path) -> Result<DecodedSource, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let channel_count = codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        // Decode everything into one interleaved buffer
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => continue,
            };

            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        let channels = deinterleave(&samples, channel_count);
        debug!(
            "decoded {}: {} channels, {} frames @ {} Hz",
            path.display(),
            channel_count,
            channels.first().map_or(0, Vec::len),
            source_sample_rate
        );

        let channels = if source_sample_rate != self.target_sample_rate {
            self.resample(channels, source_sample_rate)?
        } else {
            channels
        };

        Ok(DecodedSource {
            channels,
            sample_rate: self.target_sample_rate,
        })
    }

    /// Resample per-channel buffers to the target rate
    fn resample(
        &self,
        channels: Vec<Vec<f32>>,
        source_rate: u32,
    ) -> Result<Vec<Vec<f32>>, LoadError> {
        use rubato::{FftFixedInOut, Resampler};

        let channel_count = channels.len();
        let frames = channels.first().map_or(0, Vec::len);
        if channel_count == 0 || frames == 0 {
            return Ok(channels);
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            channel_count,
        )
        .map_err(|e| LoadError::Resample(e.to_string()))?;

        let chunk_size = resampler.input_frames_next();
        let mut output: Vec<Vec<f32>> = vec![Vec::new(); channel_count];

        // Process in full chunks
        let mut pos = 0;
        while pos + chunk_size <= frames {
            let input: Vec<&[f32]> = channels
                .iter()
                .map(|ch| &ch[pos..pos + chunk_size])
                .collect();

            let resampled = resampler
                .process(&input, None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;

            for (ch, data) in resampled.into_iter().enumerate() {
                output[ch].extend(data);
            }

            pos += chunk_size;
        }

        // Handle remaining samples (pad with zeros, keep the proportional
        // amount of output)
        if pos < frames {
            let remaining = frames - pos;
            let padded: Vec<Vec<f32>> = channels
                .iter()
                .map(|ch| {
                    let mut v = ch[pos..].to_vec();
                    v.resize(chunk_size, 0.0);
                    v
                })
                .collect();

            let input: Vec<&[f32]> = padded.iter().map(|v| v.as_slice()).collect();

            if let Ok(resampled) = resampler.process(&input, None) {
                let keep = (remaining * self.target_sample_rate as usize) / source_rate as usize;
                for (ch, data) in resampled.into_iter().enumerate() {
                    output[ch].extend(&data[..keep.min(data.len())]);
                }
            }
        }

        Ok(output)
    }
}

/// Split interleaved samples into per-channel buffers
fn deinterleave(samples: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    if channel_count == 0 {
        return Vec::new();
    }

    let frames = samples.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (ch, sample) in frame.iter().enumerate() {
            channels[ch].push(*sample);
        }
    }
    channels
}
