use super::UNKNOWN;

const MATERIAL_MAX_CHARS: usize = 50;
const THICKNESS_MAX_CHARS: usize = 20;

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn is_comment(line: &str) -> bool {
    line.starts_with('(') || line.starts_with(';')
}

/// Reads `MATERIAL-THICKNESS` from the first meaningful line of a report.
///
/// A leading controller comment (`(` or `;`) defers to the next two lines,
/// taking the first one with a hyphen that is not itself a `(` comment.
/// Only the first hyphen separates the fields.
pub fn parse_material(text: &str) -> (String, String) {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let Some(&first) = lines.first() else {
        return (UNKNOWN.to_string(), UNKNOWN.to_string());
    };

    let candidate = if is_comment(first) {
        match lines
            .iter()
            .skip(1)
            .take(2)
            .find(|l| l.contains('-') && !l.starts_with('('))
        {
            Some(line) => *line,
            None => return (UNKNOWN.to_string(), UNKNOWN.to_string()),
        }
    } else {
        first
    };

    match candidate.split_once('-') {
        None => (
            truncate_chars(candidate, MATERIAL_MAX_CHARS),
            UNKNOWN.to_string(),
        ),
        Some((material, thickness)) => {
            let thickness = thickness.trim();
            let thickness = if thickness.is_empty() {
                UNKNOWN.to_string()
            } else {
                truncate_chars(thickness, THICKNESS_MAX_CHARS)
            };
            (truncate_chars(material.trim(), MATERIAL_MAX_CHARS), thickness)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(material: &str, thickness: &str) -> (String, String) {
        (material.to_string(), thickness.to_string())
    }

    #[test]
    fn test_simple_material_line() {
        assert_eq!(parse_material("STEEL-3MM"), pair("STEEL", "3MM"));
    }

    #[test]
    fn test_comment_then_material_line() {
        assert_eq!(parse_material("(comment)\nALU - 5MM\n"), pair("ALU", "5MM"));
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert_eq!(parse_material(""), pair("unknown", "unknown"));
        assert_eq!(parse_material("  \n\t\n"), pair("unknown", "unknown"));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        assert_eq!(parse_material("\n\n  INOX-2MM  \n"), pair("INOX", "2MM"));
    }

    #[test]
    fn test_splits_on_first_hyphen_only() {
        assert_eq!(
            parse_material("S235-10MM-PLASMA"),
            pair("S235", "10MM-PLASMA")
        );
    }

    #[test]
    fn test_line_without_hyphen() {
        assert_eq!(parse_material("COPPER SHEET"), pair("COPPER SHEET", "unknown"));
    }

    #[test]
    fn test_empty_thickness_is_unknown() {
        assert_eq!(parse_material("BRASS -  "), pair("BRASS", "unknown"));
    }

    #[test]
    fn test_semicolon_comment_with_no_candidate() {
        assert_eq!(
            parse_material(";header\n(second comment - x)\nno hyphen here\n"),
            pair("unknown", "unknown")
        );
    }

    #[test]
    fn test_comment_lookahead_is_limited_to_two_lines() {
        let text = "(a)\nfirst\nsecond\nSTEEL-3MM\n";
        assert_eq!(parse_material(text), pair("unknown", "unknown"));
    }

    #[test]
    fn test_comment_lookahead_accepts_semicolon_line() {
        assert_eq!(parse_material("(a)\n;TIN-1MM\n"), pair(";TIN", "1MM"));
    }

    #[test]
    fn test_truncation_limits() {
        let material = "M".repeat(80);
        let thickness = "T".repeat(30);
        let (m, t) = parse_material(&format!("{}-{}", material, thickness));
        assert_eq!(m.chars().count(), 50);
        assert_eq!(t.chars().count(), 20);

        let (m, t) = parse_material(&"Ż".repeat(70));
        assert_eq!(m.chars().count(), 50);
        assert_eq!(t, "unknown");
    }
}
