//! Source handling for LayerAudio - decoding, export delegation, config

mod config;
mod encoder;
mod loader;

pub use config::Config;
pub use encoder::FfmpegEncoder;
pub use loader::{LoadError, SourceLoader};
