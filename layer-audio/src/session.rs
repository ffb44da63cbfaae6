//! Mix session lifecycle
//!
//! A session owns the channel pool and the current routing configuration.
//! Render work is snapshotted into value-type jobs so the session keeps
//! accepting "regenerate" requests while a job runs; a generation counter
//! decides which results are still worth keeping (latest request wins).

use std::sync::Arc;

use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, info};

use crate::encode::{encode_mix, EncodeError, EncodedArtifact, ExportFormat, ExternalEncoder};
use crate::pool::{ChannelPool, DecodedSource, PoolError};
use crate::render::{normalize_peak, render_mix};
use crate::rng::RandomSource;
use crate::routing::{generate_routing, parse_routing, SurroundLayout};
use crate::tone::{ToneParams, ToneShaper};

/// Bounds the default routing table density is drawn from
const MIN_POOL_SIZE: usize = 1;
const MAX_POOL_SIZE: usize = 314;

/// Immutable per-session parameters
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub layout: SurroundLayout,
    /// Maximum number of terms per generated pan expression
    pub complexity: usize,
    /// Routing table density, independent of real channel counts
    pub pool_size: usize,
    pub format: ExportFormat,
    pub bitrate_kbps: u32,
}

impl SessionParams {
    /// Draw a default routing table density from [1, 314]
    pub fn default_pool_size(rng: &mut dyn RandomSource) -> usize {
        rng.rand_int(MIN_POOL_SIZE as i64, MAX_POOL_SIZE as i64) as usize
    }
}

/// Render lifecycle events for external observers
///
/// Observers (progress bars, logs, mix history) subscribe to these; they
/// carry no influence back into the pipeline.
#[derive(Debug, Clone)]
pub enum RenderEvent {
    Started { generation: u64 },
    /// Coarse pipeline progress in [0, 1]
    Progress { generation: u64, fraction: f32 },
    Completed { generation: u64, format: ExportFormat },
    Failed { generation: u64, message: String },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// One mixing session over a fixed set of decoded sources
pub struct MixSession {
    pool: Arc<ChannelPool>,
    params: SessionParams,
    routing: String,
    generation: u64,
}

impl MixSession {
    /// Build the channel pool and generate the first routing configuration
    pub fn start(
        sources: &[DecodedSource],
        sample_rate: u32,
        params: SessionParams,
        rng: &mut dyn RandomSource,
    ) -> Result<Self, PoolError> {
        let pool = Arc::new(ChannelPool::build(sources, sample_rate)?);
        info!(
            "session pool ready: {} channels, {} frames @ {} Hz",
            pool.channel_count(),
            pool.frames(),
            pool.sample_rate()
        );

        let mut session = Self {
            pool,
            params,
            routing: String::new(),
            generation: 0,
        };
        session.regenerate(rng);
        Ok(session)
    }

    /// Rebuild the routing configuration, superseding in-flight renders
    pub fn regenerate(&mut self, rng: &mut dyn RandomSource) {
        self.routing = generate_routing(
            self.params.layout,
            self.params.pool_size,
            self.params.complexity,
            self.pool.channel_count(),
            rng,
        );
        self.generation += 1;
        debug!(
            "routing configuration (generation {}): {}",
            self.generation, self.routing
        );
    }

    /// The loggable/shareable routing configuration string
    pub fn routing(&self) -> &str {
        &self.routing
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    /// Whether a render generation is still the latest request
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Snapshot everything one render needs
    pub fn prepare_render(&self, tone: ToneParams) -> RenderJob {
        RenderJob {
            generation: self.generation,
            pool: Arc::clone(&self.pool),
            routing: self.routing.clone(),
            output_channels: self.params.layout.channel_count(),
            tone,
            format: self.params.format,
            bitrate_kbps: self.params.bitrate_kbps,
        }
    }
}

/// A self-contained render request
///
/// Value snapshot: runs without touching the session, so a newer request
/// can supersede it while it is in flight.
pub struct RenderJob {
    generation: u64,
    pool: Arc<ChannelPool>,
    routing: String,
    output_channels: usize,
    tone: ToneParams,
    format: ExportFormat,
    bitrate_kbps: u32,
}

impl RenderJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run the full pipeline: parse, mix, normalize, shape, encode
    ///
    /// Synchronous and pure CPU; the only stage allowed to fail slowly is
    /// the external encoder, and its failures are absorbed by the
    /// lossless fallback inside `encode_mix`.
    pub fn run(
        &self,
        external: Option<&dyn ExternalEncoder>,
        events: Option<&Sender<RenderEvent>>,
    ) -> Result<EncodedArtifact, RenderError> {
        self.emit(
            events,
            RenderEvent::Started {
                generation: self.generation,
            },
        );

        let matrix = parse_routing(&self.routing, self.output_channels, self.pool.channel_count());
        self.progress(events, 0.25);

        let mut buffer = render_mix(&self.pool, &matrix, self.output_channels);
        normalize_peak(&mut buffer);
        self.progress(events, 0.6);

        ToneShaper::new(buffer.sample_rate, self.tone).shape(&mut buffer);
        self.progress(events, 0.8);

        match encode_mix(&buffer, self.format, self.bitrate_kbps, external) {
            Ok(artifact) => {
                self.emit(
                    events,
                    RenderEvent::Completed {
                        generation: self.generation,
                        format: artifact.format,
                    },
                );
                Ok(artifact)
            }
            Err(err) => {
                self.emit(
                    events,
                    RenderEvent::Failed {
                        generation: self.generation,
                        message: err.to_string(),
                    },
                );
                Err(err.into())
            }
        }
    }

    fn progress(&self, events: Option<&Sender<RenderEvent>>, fraction: f32) {
        self.emit(
            events,
            RenderEvent::Progress {
                generation: self.generation,
                fraction,
            },
        );
    }

    fn emit(&self, events: Option<&Sender<RenderEvent>>, event: RenderEvent) {
        if let Some(tx) = events {
            let _ = tx.send(event);
        }
    }
}
