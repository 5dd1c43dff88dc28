//! Pure extraction of machine metadata from report text.

pub mod cycle_time;
pub mod encoding;
pub mod material;
pub mod report_name;

pub use cycle_time::{extract_cycle_time, CycleTimeExtractor};
pub use encoding::{decode_report, EncodingDetector, EncodingGuess, HeuristicDetector};
pub use material::parse_material;
pub use report_name::report_target;

/// Sentinel stored for any metadata field no report has supplied.
pub const UNKNOWN: &str = "unknown";
