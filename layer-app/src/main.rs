//! LayerAudio - randomized channel-layering mixer
//!
//! Loads a set of audio files, flattens their channels into one pool,
//! routes them into output buses through a generated pan configuration,
//! and exports the rendered mix.
//!
//! ## Command line
//!
//! `layer-app [options] <audio files...>` - see `--help` for options.
//! Each `--mixes` iteration after the first regenerates the routing
//! configuration before rendering.

use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context};
use chrono::Utc;
use crossbeam_channel::unbounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use layer_audio::{
    parse_bitrate, DecodedSource, EncodedArtifact, ExportFormat, MixSession, RenderEvent,
    SessionParams, SurroundLayout, ToneParams, XorShift64,
};
use layer_library::{Config, FfmpegEncoder, SourceLoader};

/// Session sample rate; every source is resampled to this
const SESSION_SAMPLE_RATE: u32 = 48000;

struct Args {
    inputs: Vec<PathBuf>,
    layout: SurroundLayout,
    complexity: usize,
    pool_size: Option<usize>,
    format: ExportFormat,
    bitrate_kbps: u32,
    tone: ToneParams,
    mixes: usize,
    seed: Option<u64>,
    out_dir: PathBuf,
}

fn usage() -> ! {
    eprintln!("Usage: layer-app [options] <audio files...>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --layout <mono|stereo|5.1|7.1|hexadecagonal|22.2>");
    eprintln!("  --craziness <n>    max terms per pan expression (default 3)");
    eprintln!("  --pool-size <n>    routing table density (default: random)");
    eprintln!("  --format <wav|mp3|opus|flac|wv>");
    eprintln!("  --bitrate <kbps>   clamped to [32, 512], default 192");
    eprintln!("  --bass <knob>      bass shelf knob (gain = knob/10 dB)");
    eprintln!("  --treble <knob>    treble shelf knob (gain = knob/10 dB)");
    eprintln!("  --volume <scale>   linear output gain (default 1.0)");
    eprintln!("  --mixes <n>        number of mixes to render (default 1)");
    eprintln!("  --seed <n>         seed the routing generator");
    eprintln!("  --out-dir <path>   output directory (default .)");
    std::process::exit(2);
}

fn parse_args(config: &Config) -> anyhow::Result<Args> {
    let mut args = Args {
        inputs: Vec::new(),
        layout: config.layout.unwrap_or_default(),
        complexity: config.complexity.unwrap_or(3),
        pool_size: None,
        format: config.format.unwrap_or_default(),
        bitrate_kbps: config.bitrate.unwrap_or(192),
        tone: ToneParams::default(),
        mixes: 1,
        seed: None,
        out_dir: PathBuf::from("."),
    };

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        let mut value = |name: &str| {
            argv.next()
                .with_context(|| format!("missing value for {}", name))
        };

        match arg.as_str() {
            "-h" | "--help" => usage(),
            "--layout" => {
                let v = value("--layout")?;
                args.layout = v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("unknown layout: {}", v))?;
            }
            "--craziness" => {
                args.complexity = value("--craziness")?
                    .parse()
                    .context("--craziness takes an integer")?;
            }
            "--pool-size" => {
                args.pool_size = Some(
                    value("--pool-size")?
                        .parse()
                        .context("--pool-size takes an integer")?,
                );
            }
            "--format" => {
                let v = value("--format")?;
                args.format = v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("unknown format: {}", v))?;
            }
            "--bitrate" => {
                args.bitrate_kbps = parse_bitrate(&value("--bitrate")?);
            }
            "--bass" => {
                args.tone.bass = value("--bass")?.parse().context("--bass takes a number")?;
            }
            "--treble" => {
                args.tone.treble = value("--treble")?
                    .parse()
                    .context("--treble takes a number")?;
            }
            "--volume" => {
                args.tone.volume = value("--volume")?
                    .parse()
                    .context("--volume takes a number")?;
            }
            "--mixes" => {
                args.mixes = value("--mixes")?
                    .parse()
                    .context("--mixes takes an integer")?;
            }
            "--seed" => {
                args.seed = Some(value("--seed")?.parse().context("--seed takes an integer")?);
            }
            "--out-dir" => {
                args.out_dir = PathBuf::from(value("--out-dir")?);
            }
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            _ => args.inputs.push(PathBuf::from(arg)),
        }
    }

    if args.inputs.is_empty() {
        usage();
    }
    if args.complexity == 0 {
        bail!("--craziness must be at least 1");
    }

    Ok(args)
}

/// `out_<compact ISO 8601>.<ext>` - colons and dots stripped from the
/// timestamp so the name is filesystem-safe everywhere
fn artifact_filename(format: ExportFormat) -> String {
    let timestamp = Utc::now().format("%Y-%m-%dT%H%M%S%3fZ");
    format!("out_{}.{}", timestamp, format.extension())
}

fn load_sources(loader: &SourceLoader, inputs: &[PathBuf]) -> Vec<DecodedSource> {
    let mut sources = Vec::new();
    for (index, path) in inputs.iter().enumerate() {
        match loader.load(path) {
            Ok(source) => {
                info!(
                    "song {}: {} ({} channels)",
                    index + 1,
                    path.display(),
                    source.channel_count()
                );
                sources.push(source);
            }
            Err(err) => {
                warn!("skipping {}: {}", path.display(), err);
            }
        }
    }
    sources
}

/// Run one render job on a worker thread, draining events on this one
fn run_render(
    session: &MixSession,
    tone: ToneParams,
) -> anyhow::Result<(u64, EncodedArtifact)> {
    let job = session.prepare_render(tone);
    let generation = job.generation();
    let (tx, rx) = unbounded();

    let worker = thread::spawn(move || {
        let encoder = FfmpegEncoder::new();
        let result = job.run(Some(&encoder), Some(&tx));
        drop(tx);
        result
    });

    for event in rx {
        match event {
            RenderEvent::Started { generation } => {
                info!("render started (generation {})", generation);
            }
            RenderEvent::Progress { fraction, .. } => {
                info!("render progress: {:.0}%", fraction * 100.0);
            }
            RenderEvent::Completed { format, .. } => {
                info!("render complete ({})", format);
            }
            RenderEvent::Failed { message, .. } => {
                warn!("render failed: {}", message);
            }
        }
    }

    let artifact = worker
        .join()
        .map_err(|_| anyhow::anyhow!("render thread panicked"))?
        .context("render failed")?;

    Ok((generation, artifact))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let args = parse_args(&config)?;

    let mut rng = match args.seed {
        Some(seed) => XorShift64::new(seed),
        None => XorShift64::from_entropy(),
    };

    let loader = SourceLoader::new(SESSION_SAMPLE_RATE);
    let sources = load_sources(&loader, &args.inputs);
    if sources.is_empty() {
        bail!("none of the input files could be decoded");
    }

    let pool_size = args
        .pool_size
        .unwrap_or_else(|| SessionParams::default_pool_size(&mut rng));
    let params = SessionParams {
        layout: args.layout,
        complexity: args.complexity,
        pool_size,
        format: args.format,
        bitrate_kbps: args.bitrate_kbps,
    };
    info!(
        "layout {} ({} buses), craziness {}, pool size {}",
        params.layout,
        params.layout.channel_count(),
        params.complexity,
        params.pool_size
    );

    let mut session = MixSession::start(&sources, SESSION_SAMPLE_RATE, params, &mut rng)
        .context("cannot start a mixing session")?;
    info!("pan config: {}", session.routing());

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("cannot create {}", args.out_dir.display()))?;

    for mix in 0..args.mixes {
        if mix > 0 {
            session.regenerate(&mut rng);
            info!("pan config: {}", session.routing());
        }

        let (generation, artifact) = run_render(&session, args.tone)?;

        // A regenerate while the job ran would have superseded it
        if !session.is_current(generation) {
            info!("discarding superseded render (generation {})", generation);
            continue;
        }

        let path = args.out_dir.join(artifact_filename(artifact.format));
        std::fs::write(&path, &artifact.bytes)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!("mix written: {} ({})", path.display(), artifact.mime);
    }

    Ok(())
}
