//! Background tick loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{info, info_span};

use crate::broadcast::EventBroadcaster;
use crate::clock::format_timestamp;
use crate::config::ArchiverConfig;
use crate::db::Database;
use crate::engine::machine::ArchivalMachine;
use crate::engine::stats::StatsSnapshot;
use crate::error::{EngineError, Result};

/// Owns everything needed to start the tick loop. At most one loop runs per
/// engine at a time.
pub struct ArchiverEngine {
    config: ArchiverConfig,
    db: Database,
    events: EventBroadcaster,
    running: Arc<AtomicBool>,
}

impl ArchiverEngine {
    pub fn new(config: ArchiverConfig, db: Database, events: EventBroadcaster) -> Self {
        Self {
            config,
            db,
            events,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawns the tick loop on its own thread.
    pub fn start(&self) -> Result<EngineHandle> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyRunning.into());
        }

        let spawned = self.spawn();
        if spawned.is_err() {
            self.running.store(false, Ordering::Release);
        }
        spawned
    }

    fn spawn(&self) -> Result<EngineHandle> {
        let started_at = Local::now();
        let machine =
            ArchivalMachine::starting_at(&self.config, self.db.clone(), self.events.clone(), started_at)?;

        let stats = Arc::new(RwLock::new(StatsSnapshot::new(started_at)));
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let loop_stats = Arc::clone(&stats);
        let running = Arc::clone(&self.running);
        let interval = self.config.poll_interval();

        let join = std::thread::Builder::new()
            .name("isotrack-engine".to_string())
            .spawn(move || {
                let _running = RunningGuard(running);
                run_loop(machine, &loop_stats, &stop_rx, interval);
                let _ = done_tx.send(());
            })
            .map_err(EngineError::SpawnFailed)?;

        info!(
            "Archiver engine started, polling every {:?}",
            self.config.poll_interval()
        );

        Ok(EngineHandle {
            stop_tx,
            done_rx,
            join: Some(join),
            stats,
            stop_timeout: self.config.stop_timeout(),
        })
    }
}

/// Clears the running flag when the loop thread exits, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn publish(stats: &RwLock<StatsSnapshot>, snapshot: StatsSnapshot) {
    match stats.write() {
        Ok(mut guard) => *guard = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}

fn run_loop(
    mut machine: ArchivalMachine,
    stats: &RwLock<StatsSnapshot>,
    stop_rx: &Receiver<()>,
    interval: Duration,
) {
    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        let started = Instant::now();
        let now = Local::now();
        {
            let span = info_span!("tick", at = %format_timestamp(&now));
            let _enter = span.enter();
            let summary = machine.tick(now);
            if summary.archived > 0 || summary.failed > 0 {
                info!(
                    archived = summary.archived,
                    failed = summary.failed,
                    "Tick finished"
                );
            }
        }
        publish(stats, machine.snapshot(Local::now()));

        // Sleep only what is left of the interval; a stop request wakes us.
        let remaining = interval.saturating_sub(started.elapsed());
        match stop_rx.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Archiver engine stopped");
}

/// Control handle for a running tick loop.
pub struct EngineHandle {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    join: Option<JoinHandle<()>>,
    stats: Arc<RwLock<StatsSnapshot>>,
    stop_timeout: Duration,
}

impl EngineHandle {
    /// Copy of the statistics published after the last tick, with uptime
    /// brought up to date.
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = match self.stats.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        snapshot.refresh_uptime(Local::now());
        snapshot
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Asks the loop to stop and waits up to the configured stop timeout for
    /// the current tick to finish.
    pub fn stop(&mut self) -> std::result::Result<(), EngineError> {
        self.stop_with_timeout(self.stop_timeout)
    }

    pub fn stop_with_timeout(&mut self, timeout: Duration) -> std::result::Result<(), EngineError> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        info!("Stopping archiver engine...");
        let _ = self.stop_tx.try_send(());

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) => join.join().map_err(|_| EngineError::Panicked),
            // The loop exited without signalling, which only happens on panic.
            Err(RecvTimeoutError::Disconnected) => match join.join() {
                Ok(()) => Ok(()),
                Err(_) => Err(EngineError::Panicked),
            },
            Err(RecvTimeoutError::Timeout) => {
                self.join = Some(join);
                Err(EngineError::StopTimeout(timeout))
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.stop_tx.try_send(());
        }
    }
}
