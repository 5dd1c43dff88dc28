use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use isotrack::{ArchiverEngine, EventBroadcaster, StatsSnapshot};

use crate::{open_database, Cli};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Seconds between statistics log lines (0 disables them).
    #[arg(long, default_value = "60")]
    pub stats_every: u64,

    /// Print engine events to stdout as JSON lines.
    #[arg(long)]
    pub print_events: bool,
}

fn log_stats(stats: &StatsSnapshot) {
    info!(
        "Uptime {} | archived {} | errors {} | in flight {} | at machine {} | reports {} applied, {} pending",
        stats.uptime,
        stats.archived,
        stats.errors,
        stats.in_flight,
        stats.at_machine,
        stats.reports_applied,
        stats.reports_deferred
    );
    if stats.dead_letter_count() > 0 {
        warn!(
            "{} dead-lettered file(s), still retried: {}",
            stats.dead_letter_count(),
            stats.dead_letters.join(", ")
        );
    }
}

pub fn execute(args: &RunArgs, cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    for (key, dir) in config.directories() {
        if !dir.is_dir() {
            warn!("{} does not exist yet: {}", key, dir.display());
        }
    }

    let db = open_database(&config)?;
    let events = EventBroadcaster::default();

    if args.print_events {
        let mut rx = events.subscribe();
        std::thread::Builder::new()
            .name("isotrack-events".to_string())
            .spawn(move || {
                loop {
                    match rx.blocking_recv() {
                        Ok(envelope) => {
                            if let Ok(line) = serde_json::to_string(&envelope) {
                                println!("{}", line);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Event printer fell behind, {} events dropped", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
            .context("Failed to spawn event printer")?;
    }

    let engine = ArchiverEngine::new(config, db, events);
    let mut handle = engine.start()?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Press Ctrl-C to stop");
    if args.stats_every == 0 {
        let _ = stop_rx.recv();
    } else {
        let every = Duration::from_secs(args.stats_every);
        loop {
            match stop_rx.recv_timeout(every) {
                Err(RecvTimeoutError::Timeout) => log_stats(&handle.stats()),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    let final_stats = handle.stats();
    handle.stop()?;
    log_stats(&final_stats);
    Ok(())
}
