//! Machine report ingestion.
//!
//! Reports named `#<name>.iso.txt` carry the material, thickness and actual
//! cut time of `<name>.iso`. Each report is parsed again only when its
//! modification time changes.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use log::{debug, error, info, warn};

use crate::broadcast::{EngineEvent, EventBroadcaster};
use crate::db::{record_repo, CncMetadata, Database};
use crate::engine::scanner::DirectoryScanner;
use crate::error::ReportError;
use crate::extract::{
    decode_report, parse_material, report_target, CycleTimeExtractor, EncodingDetector,
    HeuristicDetector,
};

/// Metadata parsed from one report, keyed by the job it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportUpdate {
    pub report: String,
    pub file_name: String,
    pub metadata: CncMetadata,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Updates written to an existing record.
    pub applied: usize,
    /// Updates buffered because the record does not exist yet.
    pub deferred: usize,
    pub failed: usize,
}

pub struct ReportIngestor {
    scanner: DirectoryScanner,
    detector: Box<dyn EncodingDetector>,
    cycle_time: CycleTimeExtractor,
    seen: HashMap<String, SystemTime>,
}

impl ReportIngestor {
    pub fn new(scanner: DirectoryScanner) -> Self {
        Self {
            scanner,
            detector: Box::new(HeuristicDetector::new()),
            cycle_time: CycleTimeExtractor::new(),
            seen: HashMap::new(),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Number of report names in the de-duplication cache.
    pub fn cached_reports(&self) -> usize {
        self.seen.len()
    }

    /// Parses every new or changed report. Reports that cannot be read are
    /// skipped and picked up again on the next call.
    pub fn collect(&mut self) -> Result<Vec<ReportUpdate>, ReportError> {
        let files = self
            .scanner
            .scan()
            .map_err(|e| ReportError::ListDirectory {
                path: self.scanner.directory().to_path_buf(),
                source: e,
            })?;

        let mut updates = Vec::new();
        for path in files {
            let Some(report) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(e) => {
                    debug!("Cannot stat report {}: {}", path.display(), e);
                    continue;
                }
            };
            if self.seen.get(report) == Some(&mtime) {
                continue;
            }

            match self.parse(&path, report) {
                Ok(update) => {
                    debug!(
                        "Parsed {}: material={}, thickness={}, cnc_time={}",
                        report,
                        update.metadata.material,
                        update.metadata.thickness,
                        update.metadata.cnc_time
                    );
                    updates.push(update);
                }
                Err(e @ ReportError::UnrecognizedName(_)) => debug!("{}", e),
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            }
            self.seen.insert(report.to_string(), mtime);
        }

        Ok(updates)
    }

    fn parse(&self, path: &Path, report: &str) -> Result<ReportUpdate, ReportError> {
        let file_name =
            report_target(report).ok_or_else(|| ReportError::UnrecognizedName(report.to_string()))?;

        let bytes = std::fs::read(path).map_err(|e| ReportError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let (text, guess) = decode_report(&bytes, self.detector.as_ref());
        debug!(
            "Decoded {} as {} (confidence {:.2})",
            report,
            guess.encoding.name(),
            guess.confidence
        );

        let (material, thickness) = parse_material(&text);
        Ok(ReportUpdate {
            report: report.to_string(),
            file_name,
            metadata: CncMetadata {
                material,
                thickness,
                cnc_time: self.cycle_time.extract(&text),
            },
        })
    }

    /// Writes each update independently; one failure does not stop the rest.
    /// A failed update is forgotten by the cache so the report is re-read on
    /// the next pass.
    pub fn apply(
        &mut self,
        db: &Database,
        events: &EventBroadcaster,
        updates: Vec<ReportUpdate>,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for update in updates {
            match record_repo::update_metadata(db, &update.file_name, &update.metadata) {
                Ok(true) => {
                    summary.applied += 1;
                    events.send(EngineEvent::ReportApplied {
                        report: update.report,
                        file_name: update.file_name,
                    });
                }
                Ok(false) => {
                    summary.deferred += 1;
                    debug!(
                        "No record for '{}' yet, holding report metadata",
                        update.file_name
                    );
                    events.send(EngineEvent::ReportDeferred {
                        report: update.report,
                        file_name: update.file_name,
                    });
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Failed to store report data for '{}': {}", update.file_name, e);
                    self.seen.remove(&update.report);
                }
            }
        }

        if summary.applied > 0 {
            info!("Updated CNC data for {} files", summary.applied);
        }
        summary
    }

    /// [`collect`](Self::collect) followed by [`apply`](Self::apply).
    pub fn ingest(
        &mut self,
        db: &Database,
        events: &EventBroadcaster,
    ) -> Result<IngestSummary, ReportError> {
        let updates = self.collect()?;
        if updates.is_empty() {
            return Ok(IngestSummary::default());
        }
        Ok(self.apply(db, events, updates))
    }
}
