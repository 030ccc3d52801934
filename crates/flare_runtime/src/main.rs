//! Flare Runtime
//!
//! Runs the scripted demo show headless, either on the rayon reference
//! device or on the GPU with offscreen rendering, and logs the engine's
//! diagnostics as they come back.

mod gpu;
mod show;
mod slots;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use flare_core::{CpuDevice, EngineConfig, FrameStatus, ParticleDevice, ParticleEngine};
use flare_metrics::FrameTimer;
use show::{Show, ShowConfig};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Frames averaged by the frame timer.
const FRAME_WINDOW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// rayon reference device
    Cpu,
    /// wgpu compute kernels with offscreen rendering
    Gpu,
}

#[derive(Parser)]
#[command(name = "flare")]
#[command(about = "Fireworks particle engine demo", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device that runs the kernels
    #[arg(long, value_enum, default_value = "cpu")]
    backend: Backend,

    /// Frames to simulate
    #[arg(long, default_value_t = 1800)]
    frames: u64,

    /// Simulation step per frame, in milliseconds
    #[arg(long, default_value_t = 16.667)]
    step_ms: f32,

    /// Seed for the show script
    #[arg(long, default_value_t = 7)]
    seed: u32,

    /// Offscreen target width (gpu backend)
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Offscreen target height (gpu backend)
    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Flare v{}", flare_core::VERSION);

    let config = match &cli.config {
        Some(path) => {
            EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => EngineConfig::from_env(),
    };
    if !config.device_spawn {
        info!("device spawning is disabled; the show will only report rejections");
    }

    match cli.backend {
        Backend::Cpu => {
            let mut engine = ParticleEngine::with_arena(config, CpuDevice::new())?;
            run_show(&mut engine, &cli, |_, _| Ok(()))
        }
        Backend::Gpu => gpu::run(config, &cli),
    }
}

/// Drive `engine` with the demo show for `cli.frames` fixed steps.
/// `after_frame` runs once the frame's compute work has been submitted.
fn run_show<D: ParticleDevice>(
    engine: &mut ParticleEngine<D>,
    cli: &Cli,
    mut after_frame: impl FnMut(&mut ParticleEngine<D>, f32) -> Result<()>,
) -> Result<()> {
    let step = Duration::from_secs_f32(cli.step_ms.max(0.1) / 1000.0);
    let show_config = ShowConfig {
        seed: cli.seed,
        ..Default::default()
    };
    let mut show = Show::new(show_config, engine.capacity());
    let mut timer = FrameTimer::new(FRAME_WINDOW);
    let mut last_logged = None;
    let mut rejected = 0u64;

    for _ in 0..cli.frames {
        let started = Instant::now();
        rejected += u64::from(show.tick(engine, step.as_secs_f32()).rejected);

        if let FrameStatus::NotReady = engine.run_frame(step) {
            bail!("particle arena is not allocated");
        }
        after_frame(engine, show.clock())?;
        timer.record(started.elapsed());

        if let Some(stats) = engine.latest_stats() {
            if last_logged != Some(stats.frame) {
                last_logged = Some(stats.frame);
                info!(
                    "frame {} | {:.2} ms | alive {} | {}",
                    stats.frame,
                    timer.frame_time_ms(),
                    stats.total_alive(),
                    stats
                );
            }
        }
    }

    let (fastest, slowest) = timer.frame_time_range_ms();
    info!(
        "show finished after {} frames ({:.1}s simulated), {} requests rejected",
        engine.frame(),
        engine.elapsed().as_secs_f32(),
        rejected
    );
    info!(
        "last {} of {} frames: {:.1} fps, {:.2}..{:.2} ms",
        timer.frames().min(FRAME_WINDOW as u64),
        timer.frames(),
        timer.fps(),
        fastest,
        slowest
    );
    for (stage, timing) in engine.profiler().iter() {
        info!("  {:<10} avg {:?} over {} calls", stage, timing.average(), timing.calls);
    }
    Ok(())
}
