//! Channel routing - pan expression generation and parsing
//!
//! The generator and parser are deliberately decoupled: they communicate
//! only through the textual routing configuration, so configurations can
//! be logged, shared, and replayed against pools with a different channel
//! count than the one they were generated for.

mod generator;
mod parser;

pub use generator::generate_routing;
pub use parser::parse_routing;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Output bus layout of the rendered mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurroundLayout {
    Mono,
    #[default]
    Stereo,
    FiveOne,
    SevenOne,
    Hexadecagonal,
    TwentyTwoTwo,
}

impl SurroundLayout {
    /// Number of output buses for this layout
    pub fn channel_count(&self) -> usize {
        match self {
            SurroundLayout::Mono => 1,
            SurroundLayout::Stereo => 2,
            SurroundLayout::FiveOne => 6,
            SurroundLayout::SevenOne => 8,
            SurroundLayout::Hexadecagonal => 16,
            SurroundLayout::TwentyTwoTwo => 24,
        }
    }

    /// Tag at the head of a routing configuration string
    pub fn tag(&self) -> &'static str {
        match self {
            SurroundLayout::Mono => "mono",
            SurroundLayout::Stereo => "stereo",
            SurroundLayout::FiveOne => "5.1",
            SurroundLayout::SevenOne => "7.1",
            SurroundLayout::Hexadecagonal => "hexadecagonal",
            SurroundLayout::TwentyTwoTwo => "22.2",
        }
    }
}

impl fmt::Display for SurroundLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Error, Debug)]
#[error("unknown surround layout: {0}")]
pub struct ParseLayoutError(String);

impl FromStr for SurroundLayout {
    type Err = ParseLayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mono" => Ok(SurroundLayout::Mono),
            "stereo" => Ok(SurroundLayout::Stereo),
            "5.1" => Ok(SurroundLayout::FiveOne),
            "7.1" => Ok(SurroundLayout::SevenOne),
            "hexadecagonal" => Ok(SurroundLayout::Hexadecagonal),
            "22.2" => Ok(SurroundLayout::TwentyTwoTwo),
            other => Err(ParseLayoutError(other.to_string())),
        }
    }
}

/// One (input channel, gain) contribution to an output bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub channel: usize,
    /// +1.0 or -1.0
    pub gain: f32,
}

/// Per-bus input taps derived from a routing configuration
///
/// Rows are never empty: buses the configuration does not mention keep a
/// unity passthrough of input channel 0.
#[derive(Debug, Clone, PartialEq)]
pub struct GainMatrix {
    rows: Vec<Vec<Tap>>,
}

impl GainMatrix {
    pub(crate) fn passthrough(output_channels: usize) -> Self {
        Self {
            rows: vec![
                vec![Tap {
                    channel: 0,
                    gain: 1.0,
                }];
                output_channels
            ],
        }
    }

    pub(crate) fn set_row(&mut self, bus: usize, taps: Vec<Tap>) {
        self.rows[bus] = taps;
    }

    pub fn bus_count(&self) -> usize {
        self.rows.len()
    }

    /// Taps feeding one output bus
    pub fn taps(&self, bus: usize) -> &[Tap] {
        &self.rows[bus]
    }
}
