//! prefilterd - reference daemon for the ocean prefilter
//!
//! This daemon:
//! 1. Loads configuration (file named by PREFILTER_CONFIG or --config, plus env overrides)
//! 2. Registers the configured cameras
//! 3. Runs the prefilter loop and logs trigger transitions until Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use ocean_prefilter::{DaemonConfig, Prefilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run the ocean prefilter against a configured camera")]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PREFILTER_CONFIG")]
    config: Option<PathBuf>,

    /// How often to sample the trigger for transition logging, in milliseconds.
    #[arg(long, default_value_t = 200)]
    poll_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = DaemonConfig::load_from(args.config.as_deref())?;
    let resources = config.resources()?;
    log::info!(
        "prefilterd starting: cameras={:?} watching={}",
        resources.cameras.list(),
        config.attributes.camera_name
    );

    let prefilter = Prefilter::new(&config.attributes, &resources)?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("prefilterd waiting for shutdown signal (Ctrl-C)...");
    let poll = Duration::from_millis(args.poll_ms.max(1));
    let mut was_triggered = false;
    loop {
        match rx.recv_timeout(poll) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        let triggered = prefilter.is_triggered();
        if triggered != was_triggered {
            if triggered {
                log::info!("TRIGGER on (camera {})", config.attributes.camera_name);
            } else {
                log::info!("TRIGGER off (camera {})", config.attributes.camera_name);
            }
            was_triggered = triggered;
        }
    }

    log::info!("shutdown signal received, stopping prefilter loop...");
    prefilter.close()?;
    Ok(())
}
