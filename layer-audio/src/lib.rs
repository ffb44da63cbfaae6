//! Mixing engine for LayerAudio - channel routing and offline rendering
//!
//! This crate provides the core mixing pipeline:
//! - ChannelPool: input channels of all loaded sources, flattened
//! - Routing: pan-expression generation and parsing
//! - Render: gain-matrix mixing with peak normalization
//! - Tone: two-band shelving EQ and output gain
//! - Encode: canonical PCM container plus external-encoder delegation
//! - Session: per-mix lifecycle, render jobs, lifecycle events

mod encode;
mod pool;
mod render;
mod rng;
mod routing;
mod session;
mod tone;

pub use encode::{
    encode_mix, parse_bitrate, wav_bytes, EncodeError, EncodedArtifact, ExportFormat,
    ExternalEncoder, ParseFormatError, DEFAULT_BITRATE_KBPS, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS,
};
pub use pool::{ChannelPool, DecodedSource, PoolError};
pub use render::{normalize_peak, render_mix, RenderedBuffer};
pub use rng::{RandomSource, XorShift64};
pub use routing::{
    generate_routing, parse_routing, GainMatrix, ParseLayoutError, SurroundLayout, Tap,
};
pub use session::{MixSession, RenderError, RenderEvent, RenderJob, SessionParams};
pub use tone::{ToneParams, ToneShaper};
