pub mod broadcast;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extract;
pub mod storage;

pub use broadcast::{EngineEvent, EventBroadcaster, EventEnvelope};
pub use config::{load_config, load_config_from_str, ArchiverConfig, ConfigFormat};
pub use db::{CncMetadata, Database, DatabaseError, FileRecord};
pub use engine::{ArchivalMachine, ArchiverEngine, EngineHandle, StatsSnapshot, TickSummary};
pub use error::{ArchiveError, ConfigError, EngineError, IsotrackError, ReportError, Result};
pub use extract::{extract_cycle_time, parse_material};
pub use storage::{restore_matching, RestoreReport};
