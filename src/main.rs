//! Cadenza command-line player

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cadenza::audio::{spawn_tick_driver, AudioOutput};
use cadenza::timing::{ms_to_ticks, MAX_PASSAGE_TICKS, TICK_RATE};
use cadenza::{EngineConfig, FadeCurve, Passage, PassageTiming, PlaybackEngine};

#[derive(Parser, Debug)]
#[command(name = "cadenza", about = "Play audio files with crossfading")]
struct Args {
    /// Audio files to play, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Master volume, 0.0 to 1.0
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Engine configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Play only the first N seconds of each file
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Crossfade length in milliseconds (requires --duration-secs, since
    /// the fade-out position must be known up front)
    #[arg(long, default_value_t = 2_000)]
    crossfade_ms: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let (mut engine, mixer) = PlaybackEngine::new(config.clone())?;
    engine.set_master_volume(args.volume);

    for file in &args.files {
        let timing = match args.duration_secs {
            Some(secs) => {
                let end = secs as i64 * TICK_RATE;
                let fade = ms_to_ticks(args.crossfade_ms as i64).min(end / 2);
                PassageTiming {
                    start: 0,
                    fade_in_start: 0,
                    lead_in_start: fade,
                    lead_out_start: end - fade,
                    fade_out_start: end - fade,
                    end,
                }
            }
            None => PassageTiming::full(0, MAX_PASSAGE_TICKS),
        };
        let mut passage = Passage::from_file(file, timing)
            .with_context(|| format!("queueing {}", file.display()))?;
        passage.fade_in_curve = FadeCurve::Cosine;
        passage.fade_out_curve = FadeCurve::Cosine;
        engine.enqueue(passage);
        info!("queued {}", file.display());
    }

    // Log player events as they happen
    let mut event_rx = engine.events();
    std::thread::Builder::new()
        .name("event-log".into())
        .spawn(move || {
            while let Ok(event) = event_rx.blocking_recv() {
                info!(?event, "player event");
            }
        })?;

    engine.play();

    let engine = Arc::new(Mutex::new(engine));
    let stop = Arc::new(AtomicBool::new(false));

    let _output = AudioOutput::start(mixer, config.working_sample_rate)
        .context("opening audio output")?;
    let driver = spawn_tick_driver(Arc::clone(&engine), Arc::clone(&stop))?;

    loop {
        std::thread::sleep(Duration::from_millis(200));
        let idle = match engine.lock() {
            Ok(e) => e.is_idle(),
            Err(poisoned) => poisoned.into_inner().is_idle(),
        };
        if idle {
            break;
        }
    }

    stop.store(true, Ordering::Release);
    let _ = driver.join();
    info!("playback finished");
    Ok(())
}
