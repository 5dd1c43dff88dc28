pub mod machine;
pub mod reports;
pub mod retry;
pub mod runner;
pub mod scanner;
pub mod state;
pub mod stats;

pub use machine::{ArchivalMachine, TickSummary};
pub use reports::{IngestSummary, ReportIngestor, ReportUpdate};
pub use retry::{FailureOutcome, RetryPolicy, RetryState};
pub use runner::{ArchiverEngine, EngineHandle};
pub use scanner::{is_stable, DirectoryScanner};
pub use state::{InFlight, Stage};
pub use stats::StatsSnapshot;
