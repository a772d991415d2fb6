//! blockbeat runner (default binary).
//!
//! Loads the configuration, starts the live-control listener, and drives the
//! session until the frame budget is spent or a stop is requested.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use blockbeat::control::{AbortHook, ControlRuntime};
use blockbeat::engine::{ClockMode, Config, Session};
use blockbeat::term::{restore_terminal, Monitor};

#[derive(Debug, Parser)]
#[command(name = "blockbeat", version, about)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seed for the piece randomizer
    #[arg(long)]
    seed: Option<u32>,

    /// Do not draw the terminal preview
    #[arg(long)]
    headless: bool,

    /// Pace the simulation to the wall clock instead of running offline
    #[arg(long)]
    realtime: bool,

    /// Number of frames to record
    #[arg(long, value_name = "N")]
    frame_limit: Option<u64>,

    /// Directory the frames are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config(&args)?;

    let monitor = !args.headless && config.window.enabled;
    // A forced abort skips the monitor's own teardown.
    let on_abort: AbortHook = Box::new(move || {
        if monitor {
            let _ = restore_terminal(&mut std::io::stdout());
        }
    });
    let (control_rt, control) = ControlRuntime::start_with_abort_hook(&config.osc, on_abort)
        .context("failed to start the control runtime")?;

    let mut session = Session::new(&config, control).context("failed to set up the session")?;
    if monitor {
        session = session.with_monitor(Monitor::new(&config.window));
    }

    let result = session.run();

    // Always stop the listener, even when recording failed.
    control_rt.shutdown();
    let summary = result.context("run aborted")?;
    log::debug!("{:?}", summary);
    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();

    if let Some(seed) = args.seed {
        config.board.seed = seed;
    }
    if let Some(limit) = args.frame_limit {
        config.frame_recorder.frame_limit = limit;
    }
    if let Some(dir) = &args.output_dir {
        config.path.output_directory = dir.clone();
    }
    if args.realtime {
        config.run.clock = ClockMode::Realtime;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
