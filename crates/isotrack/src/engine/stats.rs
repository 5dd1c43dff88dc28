use chrono::{DateTime, Local};
use serde::Serialize;

use crate::clock::format_duration;

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Files archived since start.
    pub archived: u64,
    /// Failed archival attempts since start.
    pub errors: u64,
    pub started_at: DateTime<Local>,
    /// Files tracked from intake and not yet archived.
    pub in_flight: usize,
    /// Tracked files already sighted at the machine stage.
    pub at_machine: usize,
    /// `HH:MM:SS` since start.
    pub uptime: String,
    pub dead_letters: Vec<String>,
    pub reports_applied: u64,
    /// Report updates held until their file is archived.
    pub reports_deferred: u64,
    pub last_tick_at: Option<DateTime<Local>>,
}

impl StatsSnapshot {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            archived: 0,
            errors: 0,
            started_at,
            in_flight: 0,
            at_machine: 0,
            uptime: format_duration(chrono::TimeDelta::zero()),
            dead_letters: Vec::new(),
            reports_applied: 0,
            reports_deferred: 0,
            last_tick_at: None,
        }
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letters.len()
    }

    /// Recomputes `uptime` relative to `now`.
    pub fn refresh_uptime(&mut self, now: DateTime<Local>) {
        self.uptime = format_duration(now - self.started_at);
    }
}
