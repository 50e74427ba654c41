use crate::engine::board::MARK_SUFFIX;
use crate::error::{BingoError, Result};

/// Minimum line count for an administrator submission: one label line
/// plus 24 clues. Board creation draws 25 clues and reports
/// `PoolTooSmall` against a 24-clue pool; the submission threshold is
/// kept for compatibility with existing pools.
pub const MIN_SUBMISSION_LINES: usize = 25;

/// The labeled pool of candidate clues for one round, shared by every
/// sheet in a community. Replaced wholesale by an administrative action,
/// read-only otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClueSet {
    pub label: String,
    pub clues: Vec<String>,
}

impl ClueSet {
    /// Parse an administrator submission: a `# <label>` line followed by
    /// one clue per line. Blank lines are dropped, surrounding whitespace
    /// trimmed.
    pub fn parse_submission(text: &str) -> Result<ClueSet> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let label = match lines.first() {
            Some(first) if first.starts_with('#') => first[1..].trim().to_string(),
            _ => {
                return Err(BingoError::MalformedSubmission(
                    "the first line must be a # followed by the set name".into(),
                ))
            }
        };
        if label.is_empty() {
            return Err(BingoError::MalformedSubmission(
                "the set name must not be empty".into(),
            ));
        }
        if lines.len() < MIN_SUBMISSION_LINES {
            return Err(BingoError::PoolTooSmall {
                needed: MIN_SUBMISSION_LINES - 1,
                found: lines.len() - 1,
            });
        }

        let clues: Vec<String> = lines[1..].iter().map(|line| line.to_string()).collect();
        // The mark suffix is reserved for the sheet encoding; a clue that
        // ends with it would decode as already crossed off.
        if let Some(bad) = clues.iter().find(|clue| clue.ends_with(MARK_SUFFIX)) {
            return Err(BingoError::MalformedSubmission(format!(
                "clue {bad:?} ends with the reserved marker {MARK_SUFFIX:?}"
            )));
        }
        Ok(ClueSet { label, clues })
    }

    /// Decode the stored pool. Same line format as a submission but with
    /// no minimum count: validation happened at submission time, and a
    /// short pool must still load so it can be listed or replaced.
    pub fn from_sheet(text: &str) -> Result<ClueSet> {
        let mut lines = text.lines();
        let label = match lines.next() {
            Some(first) if first.starts_with('#') => first[1..].trim().to_string(),
            _ => {
                return Err(BingoError::MalformedSubmission(
                    "stored clue pool is missing its label line".into(),
                ))
            }
        };
        let clues = lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        Ok(ClueSet { label, clues })
    }

    /// Encode for storage.
    pub fn to_sheet(&self) -> String {
        let mut out = format!("# {}\n", self.label);
        for clue in &self.clues {
            out.push_str(clue);
            out.push('\n');
        }
        out
    }

    /// The built-in pool installed by the reset operation.
    pub fn default_set() -> ClueSet {
        ClueSet::parse_submission(include_str!("../../data/default_clues.txt"))
            .expect("bundled default clue set is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(clue_count: usize) -> String {
        let mut text = String::from("# Foundations (FDN)\n");
        for i in 0..clue_count {
            text.push_str(&format!("clue number {i}\n"));
        }
        text
    }

    #[test]
    fn test_parse_valid_submission() {
        let set = ClueSet::parse_submission(&submission(24)).unwrap();
        assert_eq!(set.label, "Foundations (FDN)");
        assert_eq!(set.clues.len(), 24);
        assert_eq!(set.clues[0], "clue number 0");
    }

    #[test]
    fn test_parse_skips_blank_lines_and_trims() {
        let mut text = String::from("#  Set \n\n  first clue  \n\n");
        for i in 0..23 {
            text.push_str(&format!("clue {i}\n"));
        }
        let set = ClueSet::parse_submission(&text).unwrap();
        assert_eq!(set.label, "Set");
        assert_eq!(set.clues[0], "first clue");
        assert_eq!(set.clues.len(), 24);
    }

    #[test]
    fn test_parse_rejects_missing_label() {
        let text = (0..30).map(|i| format!("clue {i}\n")).collect::<String>();
        assert!(matches!(
            ClueSet::parse_submission(&text),
            Err(BingoError::MalformedSubmission(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_label() {
        let text = "#\n".to_string() + &submission(24)[6..];
        assert!(matches!(
            ClueSet::parse_submission(&text),
            Err(BingoError::MalformedSubmission(_))
        ));
    }

    #[test]
    fn test_parse_rejects_too_few_clues() {
        assert!(matches!(
            ClueSet::parse_submission(&submission(23)),
            Err(BingoError::PoolTooSmall {
                needed: 24,
                found: 23
            })
        ));
    }

    #[test]
    fn test_parse_rejects_reserved_marker() {
        let text = submission(23) + "find the hidden X\nends with X X\n";
        assert!(matches!(
            ClueSet::parse_submission(&text),
            Err(BingoError::MalformedSubmission(_))
        ));
    }

    #[test]
    fn test_sheet_round_trip() {
        let set = ClueSet::parse_submission(&submission(30)).unwrap();
        let decoded = ClueSet::from_sheet(&set.to_sheet()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_default_set_is_usable() {
        let set = ClueSet::default_set();
        assert!(!set.label.is_empty());
        assert!(set.clues.len() >= 25, "default set must back a full sheet");
    }
}
