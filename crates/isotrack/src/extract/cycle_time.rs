use std::sync::OnceLock;

use regex::Regex;

use super::UNKNOWN;

/// Cycle-time rules, most specific first. The trailing-time rule is last so
/// it never shadows a labelled value earlier in the same report.
const DEFAULT_RULES: &[(&str, &str)] = &[
    (
        "labelled",
        r"(?im)(?:Cycle\s+)?Time\s*[:=]\s*(\d{1,2}:\d{2}:\d{2}(?:[.,]\d+)?)",
    ),
    (
        "controller_comment",
        r"(?im)[;#]TIME[=:]\s*(\d{2}:\d{2}:\d{2}(?:[.,]\d+)?)",
    ),
    ("cut_or_run", r"(?im)(?:CUT\s+TIME|RUN\s+TIME)\s+(\d{1,2}:\d{2}:\d{2})"),
    ("parenthesised", r"(?im)\((\d{2}:\d{2}:\d{2}(?:[.,]\d+)?)\)"),
    ("trailing", r"(?im)(\d{2}:\d{2}:\d{2}(?:[.,]\d+)?)\s*$"),
];

#[derive(Debug)]
struct TimeRule {
    name: &'static str,
    regex: Regex,
}

/// Ordered set of compiled cycle-time rules.
#[derive(Debug)]
pub struct CycleTimeExtractor {
    rules: Vec<TimeRule>,
}

impl CycleTimeExtractor {
    pub fn new() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|(name, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some(TimeRule { name, regex }),
                Err(e) => {
                    log::error!("Invalid cycle time rule '{}': {}", name, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// Returns the first capture of the first matching rule with a comma
    /// decimal separator turned into a period, or `"unknown"`.
    pub fn extract(&self, text: &str) -> String {
        for rule in &self.rules {
            if let Some(value) = rule.regex.captures(text).and_then(|c| c.get(1)) {
                log::trace!("Cycle time matched rule '{}'", rule.name);
                return value.as_str().replace(',', ".").trim().to_string();
            }
        }
        UNKNOWN.to_string()
    }
}

impl Default for CycleTimeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// [`CycleTimeExtractor::extract`] with the default rule set.
pub fn extract_cycle_time(text: &str) -> String {
    static EXTRACTOR: OnceLock<CycleTimeExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(CycleTimeExtractor::new).extract(text)
}
