//! Headless meet runner
//!
//! Runs a full meet on a stepped frame clock and prints the results of every
//! round. Set `RUST_LOG=debug` for pause/resume/reset detail.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use horse_race::{default_pool, load_pool_from_path, run_meet, Meet, MeetConfig, Result, RoundResult, SteppedFrames};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

/// Upper bound on frames for a whole meet; far beyond any valid config
const MAX_FRAMES: usize = 10_000_000;

#[derive(Parser, Debug)]
#[command(name = "horse-race", version, about = "Run a multi-round horse race meet")]
struct Args {
    /// Meet config (JSON); stock six-round meet when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Horse pool (JSON array); stock twenty-horse stable when omitted
    #[arg(long)]
    horses: Option<PathBuf>,

    /// Master seed, overriding the config
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds between frames
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Sleep between frames instead of running as fast as possible
    #[arg(long)]
    realtime: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => MeetConfig::from_path(path)?,
        None => MeetConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let pool = match &args.horses {
        Some(path) => load_pool_from_path(path)?,
        None => {
            let mut rng = match config.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            default_pool(&mut rng)
        }
    };
    log::info!("Loaded {} horses", pool.len());

    let frames = Rc::new(SteppedFrames::new());
    let mut meet = Meet::new(config, pool, frames.clone())?;
    let interval = Duration::from_millis(args.frame_ms.max(1));

    let finished = run_meet(&mut meet, &frames, interval, MAX_FRAMES, |_, _| {
        if args.realtime {
            std::thread::sleep(interval);
        }
    });
    if !finished {
        log::warn!("Meet stopped after {MAX_FRAMES} frames without finishing");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(meet.results())?);
    } else {
        for round in meet.results() {
            print_round(round);
        }
    }
    Ok(())
}

fn print_round(round: &RoundResult) {
    println!("Round {} ({}m)", round.round, round.distance);
    for placing in &round.results {
        println!(
            "  {:>2}. {:<16} cond {:>3}  {:>7.3}s",
            placing.position, placing.horse.name, placing.horse.condition, placing.finish_time
        );
    }
}
