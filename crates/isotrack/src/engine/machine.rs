//! The archival state machine.
//!
//! Each [`ArchivalMachine::tick`] runs three independent steps:
//!
//! 1. intake scan: stable new files become in-flight entries,
//! 2. machine stage: the first sighting of an entry at the machine starts its
//!    dwell timer; once the dwell has elapsed the file is moved to the archive
//!    and its record is written,
//! 3. report scan: new or changed reports update the store.
//!
//! A failure in one step is logged and never prevents the next one.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use log::{debug, error, info, warn};

use crate::broadcast::{EngineEvent, EventBroadcaster};
use crate::clock::{format_duration, format_timestamp};
use crate::config::ArchiverConfig;
use crate::db::{record_repo, Database, FileRecord};
use crate::engine::reports::{IngestSummary, ReportIngestor};
use crate::engine::retry::{FailureOutcome, RetryPolicy};
use crate::engine::scanner::{is_stable, DirectoryScanner};
use crate::engine::state::{InFlight, Stage};
use crate::engine::stats::StatsSnapshot;
use crate::error::{ArchiveError, ConfigError, EngineError};
use crate::extract::HeuristicDetector;
use crate::storage::verified_move;

/// What a single tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub tracked: usize,
    pub sighted: usize,
    pub archived: usize,
    pub failed: usize,
    pub reports: IngestSummary,
}

pub struct ArchivalMachine {
    intake: DirectoryScanner,
    machine_directory: PathBuf,
    archive_directory: PathBuf,
    stability_check: Duration,
    dwell: TimeDelta,
    policy: RetryPolicy,
    db: Database,
    events: EventBroadcaster,
    reports: ReportIngestor,
    in_flight: BTreeMap<String, InFlight>,
    /// Archival time of the last file whose record was written.
    last_archived_at: Option<DateTime<Local>>,
    archived: u64,
    errors: u64,
    reports_applied: u64,
    reports_deferred: u64,
    started_at: DateTime<Local>,
    last_tick_at: Option<DateTime<Local>>,
}

impl ArchivalMachine {
    pub fn new(
        config: &ArchiverConfig,
        db: Database,
        events: EventBroadcaster,
    ) -> Result<Self, ConfigError> {
        Self::starting_at(config, db, events, Local::now())
    }

    /// Like [`ArchivalMachine::new`] with an explicit start time for uptime.
    pub fn starting_at(
        config: &ArchiverConfig,
        db: Database,
        events: EventBroadcaster,
        started_at: DateTime<Local>,
    ) -> Result<Self, ConfigError> {
        let intake =
            DirectoryScanner::for_extension(&config.intake_directory, &config.tracked_extension)?;
        let reports = ReportIngestor::new(DirectoryScanner::with_glob(
            &config.reports_directory,
            &config.report_pattern,
        )?)
        .with_detector(Box::new(HeuristicDetector::for_region(
            config.report_region.as_deref(),
        )));

        Ok(Self {
            intake,
            machine_directory: config.machine_directory.clone(),
            archive_directory: config.archive_directory.clone(),
            stability_check: config.stability_check(),
            dwell: TimeDelta::from_std(config.dwell()).unwrap_or(TimeDelta::MAX),
            policy: RetryPolicy::from_config(config),
            db,
            events,
            reports,
            in_flight: BTreeMap::new(),
            last_archived_at: None,
            archived: 0,
            errors: 0,
            reports_applied: 0,
            reports_deferred: 0,
            started_at,
            last_tick_at: None,
        })
    }

    pub fn tick(&mut self, now: DateTime<Local>) -> TickSummary {
        let mut summary = TickSummary::default();

        match self.scan_intake(now) {
            Ok(tracked) => summary.tracked = tracked,
            Err(e) => warn!("Intake scan skipped: {}", e),
        }

        self.advance_machine_stage(now, &mut summary);

        match self.reports.ingest(&self.db, &self.events) {
            Ok(reports) => {
                self.reports_applied += reports.applied as u64;
                self.reports_deferred += reports.deferred as u64;
                summary.reports = reports;
            }
            Err(e) => warn!("Report scan skipped: {}", e),
        }

        self.last_tick_at = Some(now);
        summary
    }

    fn scan_intake(&mut self, now: DateTime<Local>) -> Result<usize, EngineError> {
        let files = self.intake.scan().map_err(|e| EngineError::ScanFailed {
            path: self.intake.directory().to_path_buf(),
            source: e,
        })?;

        let mut tracked = 0;
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if self.in_flight.contains_key(&name) {
                continue;
            }

            match is_stable(&path, self.stability_check) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} is still being written, skipping", name);
                    continue;
                }
                Err(e) => {
                    debug!("Stability check skipped: {}", e);
                    continue;
                }
            }

            info!("New intake file: {}", name);
            self.in_flight.insert(name.clone(), InFlight::new(path, now));
            self.events.send(EngineEvent::FileTracked { file_name: name });
            tracked += 1;
        }

        Ok(tracked)
    }

    fn advance_machine_stage(&mut self, now: DateTime<Local>, summary: &mut TickSummary) {
        let names: Vec<String> = self.in_flight.keys().cloned().collect();

        for name in names {
            let Some(entry) = self.in_flight.get_mut(&name) else {
                continue;
            };

            match entry.stage() {
                // Past the dwell already; retried at the maximum backoff.
                Stage::DeadLetter => {}
                // Already in the archive; only the record is missing.
                Stage::Moved => {}
                Stage::InTransit | Stage::AtMachine => {
                    if !self.machine_directory.join(&name).exists() {
                        continue;
                    }
                    let Some(sighted_at) = entry.machine_sighted_at else {
                        entry.machine_sighted_at = Some(now);
                        info!("{} reached the machine stage, dwell timer started", name);
                        self.events.send(EngineEvent::StageSighted {
                            file_name: name.clone(),
                        });
                        summary.sighted += 1;
                        continue;
                    };
                    if now - sighted_at < self.dwell {
                        continue;
                    }
                }
            }

            if !entry.retry.is_ready(now) {
                continue;
            }

            let Some(mut entry) = self.in_flight.remove(&name) else {
                continue;
            };
            match self.archive(&name, &mut entry, now) {
                Ok(record) => {
                    self.archived += 1;
                    summary.archived += 1;
                    info!(
                        "Archived [{}]: {} (cycle: {}, waited: {})",
                        record.id.unwrap_or_default(),
                        name,
                        record.cycle_duration.as_deref().unwrap_or("N/A"),
                        format_duration(now - entry.tracked_at)
                    );
                    self.events.send(EngineEvent::Archived {
                        file_name: name,
                        archive_path: record.archive_path,
                        record_id: record.id.unwrap_or_default(),
                        cycle_duration: record.cycle_duration,
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    self.record_failure(&name, &mut entry, now, &e);
                    self.in_flight.insert(name, entry);
                }
            }
        }
    }

    /// Moves the file to the archive (unless a previous attempt already did)
    /// and writes its record.
    fn archive(
        &mut self,
        name: &str,
        entry: &mut InFlight,
        now: DateTime<Local>,
    ) -> Result<FileRecord, ArchiveError> {
        let archive_path = self.archive_directory.join(name);

        let archived_at = match entry.moved_at {
            Some(at) => at,
            None => {
                let bytes = verified_move(&entry.intake_path, &archive_path)?;
                debug!("Moved {} bytes to {}", bytes, archive_path.display());
                entry.moved_at = Some(now);
                now
            }
        };

        let cycle_duration = match (entry.machine_sighted_at, self.last_archived_at) {
            (Some(sighted_at), Some(previous)) => Some(format_duration(sighted_at - previous)),
            _ => None,
        };

        let mut record = FileRecord::new(
            name,
            entry.intake_path.to_string_lossy(),
            self.machine_directory.join(name).to_string_lossy(),
            archive_path.to_string_lossy(),
            format_timestamp(&entry.tracked_at),
        );
        record.entered_machine_at = entry.machine_sighted_at.as_ref().map(format_timestamp);
        record.archived_at = Some(format_timestamp(&archived_at));
        record.cycle_duration = cycle_duration;

        let id = record_repo::insert(&self.db, &record)?;
        record.id = Some(id);
        // A late record write must not rewind the previous archival time.
        self.last_archived_at = Some(
            self.last_archived_at
                .map_or(archived_at, |previous| previous.max(archived_at)),
        );

        Ok(record)
    }

    fn record_failure(
        &mut self,
        name: &str,
        entry: &mut InFlight,
        now: DateTime<Local>,
        err: &ArchiveError,
    ) {
        self.errors += 1;
        let message = err.to_string();

        match entry.retry.record_failure(&self.policy, now, message.clone()) {
            FailureOutcome::RetryAt { attempt, at } => {
                warn!(
                    "Archival of {} failed (attempt {}), retrying at {}: {}",
                    name,
                    attempt,
                    format_timestamp(&at),
                    message
                );
                self.events.send(EngineEvent::ArchiveFailed {
                    file_name: name.to_string(),
                    attempt,
                    error: message,
                });
            }
            FailureOutcome::DeadLettered { attempts, retry_at } => {
                error!(
                    "Giving up on fast retries for {} after {} failed attempts{}, retrying at {}: {}",
                    name,
                    attempts,
                    if entry.moved_at.is_some() {
                        " (file is already in the archive, record not written)"
                    } else {
                        ""
                    },
                    format_timestamp(&retry_at),
                    message
                );
                self.events.send(EngineEvent::ArchiveFailed {
                    file_name: name.to_string(),
                    attempt: attempts,
                    error: message.clone(),
                });
                self.events.send(EngineEvent::DeadLettered {
                    file_name: name.to_string(),
                    attempts,
                    error: message,
                });
            }
            FailureOutcome::StillFailing { attempts, retry_at } => {
                warn!(
                    "Dead-lettered {} still cannot be archived (attempt {}), next attempt at {}: {}",
                    name,
                    attempts,
                    format_timestamp(&retry_at),
                    message
                );
                self.events.send(EngineEvent::ArchiveFailed {
                    file_name: name.to_string(),
                    attempt: attempts,
                    error: message,
                });
            }
        }
    }

    /// Resets the retry state of a dead-lettered entry so it is attempted on
    /// the next tick. Returns `false` when `file_name` is not dead-lettered.
    pub fn clear_dead_letter(&mut self, file_name: &str) -> bool {
        match self.in_flight.get_mut(file_name) {
            Some(entry) if entry.stage() == Stage::DeadLetter => {
                info!("Clearing dead letter for {}", file_name);
                entry.retry.reset();
                true
            }
            _ => false,
        }
    }

    pub fn is_tracked(&self, file_name: &str) -> bool {
        self.in_flight.contains_key(file_name)
    }

    pub fn entry(&self, file_name: &str) -> Option<&InFlight> {
        self.in_flight.get(file_name)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn at_machine_count(&self) -> usize {
        self.in_flight
            .values()
            .filter(|e| e.machine_sighted_at.is_some())
            .count()
    }

    pub fn dead_letters(&self) -> Vec<String> {
        self.in_flight
            .iter()
            .filter(|(_, e)| e.stage() == Stage::DeadLetter)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn snapshot(&self, now: DateTime<Local>) -> StatsSnapshot {
        let mut stats = StatsSnapshot::new(self.started_at);
        stats.archived = self.archived;
        stats.errors = self.errors;
        stats.in_flight = self.in_flight_count();
        stats.at_machine = self.at_machine_count();
        stats.dead_letters = self.dead_letters();
        stats.reports_applied = self.reports_applied;
        stats.reports_deferred = self.reports_deferred;
        stats.last_tick_at = self.last_tick_at;
        stats.refresh_uptime(now);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: ArchiverConfig,
        db: Database,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = ArchiverConfig::new(
            dir.path().join("a"),
            dir.path().join("b"),
            dir.path().join("c"),
            dir.path().join("d"),
        );
        for (_, path) in config.directories() {
            std::fs::create_dir_all(path).unwrap();
        }
        config.timing.stability_check_ms = 0;
        let db = Database::open(&dir.path().join("machine.db")).unwrap();
        Fixture {
            _dir: dir,
            config,
            db,
        }
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 4, 1, 7, 0, 0).unwrap()
    }

    fn machine(fx: &Fixture) -> ArchivalMachine {
        ArchivalMachine::starting_at(&fx.config, fx.db.clone(), EventBroadcaster::default(), t0())
            .unwrap()
    }

    #[test]
    fn test_intake_file_is_tracked_once() {
        let fx = fixture();
        std::fs::write(fx.config.intake_directory.join("job1.iso"), "G00").unwrap();

        let mut m = machine(&fx);
        assert_eq!(m.tick(t0()).tracked, 1);
        assert_eq!(m.tick(t0() + TimeDelta::seconds(2)).tracked, 0);
        assert_eq!(m.in_flight_count(), 1);
        assert_eq!(m.entry("job1.iso").unwrap().tracked_at, t0());
    }

    #[test]
    fn test_dwell_boundary() {
        let fx = fixture();
        std::fs::write(fx.config.intake_directory.join("job1.iso"), "G00").unwrap();
        let mut m = machine(&fx);
        m.tick(t0());

        std::fs::write(fx.config.machine_directory.join("job1.iso"), "G00").unwrap();
        let sighted = t0() + TimeDelta::seconds(2);
        assert_eq!(m.tick(sighted).sighted, 1);
        assert_eq!(m.at_machine_count(), 1);

        let just_before = sighted + TimeDelta::seconds(419);
        assert_eq!(m.tick(just_before).archived, 0);

        let at_threshold = sighted + TimeDelta::seconds(420);
        assert_eq!(m.tick(at_threshold).archived, 1);
        assert!(!m.is_tracked("job1.iso"));
        assert!(fx.config.archive_directory.join("job1.iso").exists());
        assert!(!fx.config.intake_directory.join("job1.iso").exists());
    }

    #[test]
    fn test_snapshot_counts() {
        let fx = fixture();
        std::fs::write(fx.config.intake_directory.join("job1.iso"), "G00").unwrap();
        std::fs::write(fx.config.intake_directory.join("job2.iso"), "G01").unwrap();
        std::fs::write(fx.config.machine_directory.join("job2.iso"), "G01").unwrap();

        let mut m = machine(&fx);
        m.tick(t0());
        m.tick(t0() + TimeDelta::seconds(2));

        let stats = m.snapshot(t0() + TimeDelta::seconds(3661));
        assert_eq!(stats.in_flight, 2);
        assert_eq!(stats.at_machine, 1);
        assert_eq!(stats.archived, 0);
        assert_eq!(stats.uptime, "01:01:01");
        assert_eq!(stats.last_tick_at, Some(t0() + TimeDelta::seconds(2)));
    }

    #[test]
    fn test_missing_folders_do_not_stop_the_tick() {
        let fx = fixture();
        std::fs::write(fx.config.reports_directory.join("#job9.iso.txt"), "CU-1MM\n").unwrap();
        std::fs::remove_dir_all(&fx.config.intake_directory).unwrap();

        let mut m = machine(&fx);
        let summary = m.tick(t0());
        assert_eq!(summary.tracked, 0);
        assert_eq!(summary.reports.deferred, 1);
    }
}
