use std::path::PathBuf;

use chrono::{DateTime, Local};

use super::retry::RetryState;

/// Where a tracked file currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stable in intake, not yet seen at the machine.
    InTransit,
    /// Seen at the machine; waiting out the dwell.
    AtMachine,
    /// Moved to the archive; only the record still has to be written.
    Moved,
    DeadLetter,
}

/// A file tracked from intake until its record is persisted.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub intake_path: PathBuf,
    pub tracked_at: DateTime<Local>,
    /// First sighting at the machine stage; starts the dwell timer.
    pub machine_sighted_at: Option<DateTime<Local>>,
    /// Set once the verified move succeeded. The value is the archival time.
    pub moved_at: Option<DateTime<Local>>,
    pub retry: RetryState,
}

impl InFlight {
    pub fn new(intake_path: PathBuf, tracked_at: DateTime<Local>) -> Self {
        Self {
            intake_path,
            tracked_at,
            machine_sighted_at: None,
            moved_at: None,
            retry: RetryState::default(),
        }
    }

    pub fn stage(&self) -> Stage {
        if self.retry.is_dead_lettered() {
            Stage::DeadLetter
        } else if self.moved_at.is_some() {
            Stage::Moved
        } else if self.machine_sighted_at.is_some() {
            Stage::AtMachine
        } else {
            Stage::InTransit
        }
    }
}
