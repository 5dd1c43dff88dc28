//! Test harness for isolated archiver runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use tokio::sync::broadcast::Receiver;

use isotrack::db::record_repo;
use isotrack::{
    ArchivalMachine, ArchiverConfig, Database, EngineEvent, EventBroadcaster, EventEnvelope,
    FileRecord,
};

/// Fixed start of every scripted run.
pub fn t0() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).unwrap()
}

/// `t0() + secs`.
pub fn at(secs: i64) -> DateTime<Local> {
    t0() + TimeDelta::seconds(secs)
}

/// Everything received so far, without blocking.
pub fn drain_events(rx: &mut Receiver<EventEnvelope>) -> Vec<EngineEvent> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.event)
        .collect()
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub intake: ChildPath,
    pub machine: ChildPath,
    pub archive: ChildPath,
    pub reports: ChildPath,
    pub db_path: PathBuf,
    pub config: ArchiverConfig,
    pub db: Database,
    pub events: EventBroadcaster,
}

impl TestHarness {
    /// Default settings except for an instant stability check.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut ArchiverConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let intake = temp_dir.child("a");
        let machine = temp_dir.child("b");
        let archive = temp_dir.child("c");
        let reports = temp_dir.child("d");
        for dir in [&intake, &machine, &archive, &reports] {
            dir.create_dir_all().expect("Failed to create stage directory");
        }

        let db_path = temp_dir.path().join("data").join("isotrack.db");
        let mut config = ArchiverConfig::new(
            intake.path(),
            machine.path(),
            archive.path(),
            reports.path(),
        );
        config.database_path = Some(db_path.clone());
        config.timing.stability_check_ms = 0;
        adjust(&mut config);

        let db = Database::open_with_timeout(&db_path, config.busy_timeout())
            .expect("Failed to open database");

        Self {
            temp_dir,
            intake,
            machine,
            archive,
            reports,
            db_path,
            config,
            db,
            events: EventBroadcaster::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A state machine whose uptime starts at [`t0`].
    pub fn machine(&self) -> ArchivalMachine {
        ArchivalMachine::starting_at(&self.config, self.db.clone(), self.events.clone(), t0())
            .expect("Failed to build archival machine")
    }

    pub fn drop_in_intake(&self, name: &str, contents: &[u8]) {
        self.intake.child(name).write_binary(contents).unwrap();
    }

    /// Simulates the operator copying the job to the machine folder.
    pub fn appear_at_machine(&self, name: &str) {
        self.machine.child(name).write_str("loaded").unwrap();
    }

    pub fn drop_report(&self, name: &str, contents: &str) {
        self.reports.child(name).write_str(contents).unwrap();
    }

    pub fn in_intake(&self, name: &str) -> bool {
        self.intake.child(name).path().exists()
    }

    pub fn in_archive(&self, name: &str) -> bool {
        self.archive.child(name).path().exists()
    }

    pub fn records(&self, pattern: &str) -> Vec<FileRecord> {
        record_repo::search(&self.db, pattern).expect("search failed")
    }

    /// Deletes the database files so the next write fails.
    pub fn break_database(&self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut name = self.db_path.clone().into_os_string();
            name.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(name));
        }
    }
}
