//! Gain-matrix mixing and peak normalization

use crate::pool::ChannelPool;
use crate::routing::GainMatrix;

/// A rendered multi-bus sample buffer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBuffer {
    /// One buffer per output bus, equal lengths
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl RenderedBuffer {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// Maximum absolute sample value across all buses
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Mix the channel pool through a gain matrix
///
/// Each bus accumulates `pool[tap.channel] * tap.gain` over its taps;
/// buses the matrix does not cover stay silent.
pub fn render_mix(
    pool: &ChannelPool,
    matrix: &GainMatrix,
    output_channels: usize,
) -> RenderedBuffer {
    let frames = pool.frames();
    let mut channels = vec![vec![0.0f32; frames]; output_channels];

    for (bus, out) in channels.iter_mut().enumerate() {
        if bus >= matrix.bus_count() {
            break;
        }
        for tap in matrix.taps(bus) {
            let Some(source) = pool.channel(tap.channel) else {
                continue;
            };
            for (acc, sample) in out.iter_mut().zip(source) {
                *acc += sample * tap.gain;
            }
        }
    }

    RenderedBuffer {
        channels,
        sample_rate: pool.sample_rate(),
    }
}

/// Scale the buffer back into [-1, 1] when it clips
///
/// Only ever attenuates: a peak at or below 1.0 leaves the buffer
/// untouched.
pub fn normalize_peak(buffer: &mut RenderedBuffer) {
    let peak = buffer.peak();
    if peak > 1.0 {
        let scale = 1.0 / peak;
        for channel in &mut buffer.channels {
            for sample in channel.iter_mut() {
                *sample *= scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DecodedSource;
    use crate::routing::parse_routing;

    fn pool_from(channels: Vec<Vec<f32>>) -> ChannelPool {
        let source = DecodedSource {
            channels,
            sample_rate: 48000,
        };
        ChannelPool::build(&[source], 48000).unwrap()
    }

    #[test]
    fn test_taps_accumulate_with_sign() {
        let pool = pool_from(vec![vec![0.5, 0.5], vec![0.25, 0.25]]);
        let matrix = parse_routing("stereo|c0=c0+c1|c1=c0-c1", 2, 2);

        let buffer = render_mix(&pool, &matrix, 2);

        assert_eq!(buffer.channels[0], vec![0.75, 0.75]);
        assert_eq!(buffer.channels[1], vec![0.25, 0.25]);
    }

    #[test]
    fn test_default_matrix_passes_channel_zero() {
        let pool = pool_from(vec![vec![0.1, 0.2, 0.3], vec![0.9, 0.9, 0.9]]);
        let matrix = parse_routing("stereo", 2, 2);

        let buffer = render_mix(&pool, &matrix, 2);

        assert_eq!(buffer.channels[0], vec![0.1, 0.2, 0.3]);
        assert_eq!(buffer.channels[1], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_normalization_rescales_clipping_mix() {
        let pool = pool_from(vec![vec![1.0, 0.5], vec![1.0, 0.5]]);
        let matrix = parse_routing("mono|c0=c0+c1", 1, 2);

        let mut buffer = render_mix(&pool, &matrix, 1);
        assert_eq!(buffer.peak(), 2.0);

        normalize_peak(&mut buffer);
        assert_eq!(buffer.channels[0], vec![1.0, 0.5]);
    }

    #[test]
    fn test_quiet_buffer_is_never_amplified() {
        let mut buffer = RenderedBuffer {
            channels: vec![vec![0.25, -0.5]],
            sample_rate: 48000,
        };
        normalize_peak(&mut buffer);
        assert_eq!(buffer.channels[0], vec![0.25, -0.5]);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut once = RenderedBuffer {
            channels: vec![vec![3.0, -1.5, 0.75]],
            sample_rate: 48000,
        };
        normalize_peak(&mut once);
        let mut twice = once.clone();
        normalize_peak(&mut twice);
        assert_eq!(once, twice);
    }
}
