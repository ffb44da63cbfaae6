//! Channel pool - the flattened input channels of all loaded sources

use thiserror::Error;

/// A decoded multi-channel source, already at the session sample rate
#[derive(Debug, Clone)]
pub struct DecodedSource {
    /// One buffer per channel; equal lengths within a source
    pub channels: Vec<Vec<f32>>,
    /// Sample rate the channels were decoded/resampled to
    pub sample_rate: u32,
}

impl DecodedSource {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }
}

/// Errors raised while building a channel pool
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("no input channels to mix")]
    NoInput,
}

/// Flat ordered pool of mono input channels
///
/// Channel order is stable: source order, then channel order within a
/// source. That order is the index space every pan expression refers to.
pub struct ChannelPool {
    channels: Vec<Vec<f32>>,
    frames: usize,
    sample_rate: u32,
}

impl ChannelPool {
    /// Flatten decoded sources into the pool
    ///
    /// Every pool channel gets the common length (the longest source);
    /// shorter sources are zero-padded, never truncated.
    pub fn build(sources: &[DecodedSource], sample_rate: u32) -> Result<Self, PoolError> {
        if sources.is_empty() {
            return Err(PoolError::NoInput);
        }

        let frames = sources.iter().map(|s| s.frames()).max().unwrap_or(0);

        let mut channels = Vec::new();
        for source in sources {
            for data in &source.channels {
                let mut channel = vec![0.0f32; frames];
                channel[..data.len()].copy_from_slice(data);
                channels.push(channel);
            }
        }

        if channels.is_empty() {
            return Err(PoolError::NoInput);
        }

        Ok(Self {
            channels,
            frames,
            sample_rate,
        })
    }

    /// Total number of input channels across all sources
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Common length shared by every pool channel
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// One pool channel by routing index
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(samples: Vec<f32>) -> DecodedSource {
        DecodedSource {
            channels: vec![samples],
            sample_rate: 48000,
        }
    }

    #[test]
    fn test_empty_sources_is_no_input() {
        assert!(matches!(
            ChannelPool::build(&[], 48000),
            Err(PoolError::NoInput)
        ));
    }

    #[test]
    fn test_sources_without_channels_is_no_input() {
        let empty = DecodedSource {
            channels: vec![],
            sample_rate: 48000,
        };
        assert!(matches!(
            ChannelPool::build(&[empty], 48000),
            Err(PoolError::NoInput)
        ));
    }

    #[test]
    fn test_shorter_source_is_zero_padded() {
        let short = mono(vec![0.5; 1000]);
        let long = mono(vec![0.25; 1500]);

        let pool = ChannelPool::build(&[short, long], 48000).unwrap();

        assert_eq!(pool.channel_count(), 2);
        assert_eq!(pool.frames(), 1500);

        let first = pool.channel(0).unwrap();
        assert_eq!(first.len(), 1500);
        assert!(first[..1000].iter().all(|&s| s == 0.5));
        assert!(first[1000..].iter().all(|&s| s == 0.0));

        let second = pool.channel(1).unwrap();
        assert!(second[..1000].iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_channel_order_is_source_major() {
        let stereo = DecodedSource {
            channels: vec![vec![1.0; 4], vec![2.0; 4]],
            sample_rate: 48000,
        };
        let extra = mono(vec![3.0; 4]);

        let pool = ChannelPool::build(&[stereo, extra], 48000).unwrap();

        assert_eq!(pool.channel_count(), 3);
        assert_eq!(pool.channel(0).unwrap()[0], 1.0);
        assert_eq!(pool.channel(1).unwrap()[0], 2.0);
        assert_eq!(pool.channel(2).unwrap()[0], 3.0);
    }

    #[test]
    fn test_out_of_range_channel_is_none() {
        let pool = ChannelPool::build(&[mono(vec![0.0; 8])], 48000).unwrap();
        assert!(pool.channel(1).is_none());
    }
}
