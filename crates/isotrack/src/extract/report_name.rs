use std::sync::OnceLock;

use regex::Regex;

/// Infers the job file a report belongs to: `#<token>.iso.txt` → `<token>.iso`.
///
/// Matching is case-insensitive and the token keeps its original case.
pub fn report_target(report_file_name: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?i)#(.+?)\.iso\.txt$").ok())
        .as_ref()?;

    pattern
        .captures(report_file_name)
        .and_then(|c| c.get(1))
        .map(|token| format!("{}.iso", token.as_str()))
}
