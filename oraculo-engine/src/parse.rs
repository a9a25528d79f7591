use oraculo_db::models::{SlotType, DATASET_LEN};

use crate::analysis::DigitCell;

/// Number of module slots shown side by side.
pub const MODULE_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModule {
    pub rows: Vec<Vec<DigitCell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModules {
    pub modules: Vec<ParsedModule>,
    pub errors: Vec<String>,
}

pub fn empty_module() -> Vec<String> {
    vec![String::new(); DATASET_LEN]
}

pub fn is_valid_module<S: AsRef<str>>(lines: &[S]) -> bool {
    lines.iter().enumerate().all(|(i, line)| {
        let line = line.as_ref();
        if line.is_empty() {
            return false;
        }
        if i >= DATASET_LEN {
            return true;
        }
        line.len() == SlotType::for_index(i).digits() && line.chars().all(|c| c.is_ascii_digit())
    })
}

/// One cell per character; a non-digit becomes `None` and keeps its column.
pub fn coerce_row(line: &str) -> Vec<DigitCell> {
    line.trim()
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect()
}

/// Unstable modules are reported but still parsed.
pub fn parse_modules<S: AsRef<str>>(slots: &[Vec<S>]) -> ParsedModules {
    let mut modules = Vec::with_capacity(slots.len());
    let mut errors = Vec::new();

    for (index, lines) in slots.iter().enumerate() {
        if !is_valid_module(lines) {
            errors.push(format!("Vetor {} instável.", index + 1));
        }
        modules.push(ParsedModule {
            rows: lines.iter().map(|l| coerce_row(l.as_ref())).collect(),
        });
    }

    ParsedModules { modules, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_rows;

    fn module(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    fn valid() -> Vec<String> {
        module(&["1234", "5678", "9012", "3456", "7890", "1357", "246"])
    }

    #[test]
    fn test_valid_module() {
        assert!(is_valid_module(&valid()));
    }

    #[test]
    fn test_invalid_lengths() {
        let mut m = valid();
        m[6] = "2468".to_string();
        assert!(!is_valid_module(&m));
        let mut m = valid();
        m[0] = "123".to_string();
        assert!(!is_valid_module(&m));
    }

    #[test]
    fn test_empty_line_invalid() {
        assert!(!is_valid_module(&empty_module()));
    }

    #[test]
    fn test_parse_reports_but_continues() {
        let mut broken = valid();
        broken[2] = "9x12".to_string();
        let parsed = parse_modules(&[valid(), broken, empty_module()]);
        assert_eq!(parsed.errors, vec!["Vetor 2 instável.", "Vetor 3 instável."]);
        assert_eq!(parsed.modules.len(), 3);
        assert_eq!(parsed.modules[1].rows[2], vec![Some(9), None, Some(1), Some(2)]);
        assert!(parsed.modules[2].rows.iter().all(|r| r.is_empty()));
        assert_eq!(parsed.modules[0].rows[6], vec![Some(2), Some(4), Some(6)]);
    }

    #[test]
    fn test_unstable_line_counts_in_original_columns() {
        let parsed = parse_modules(&[module(&["9x12"])]);
        assert_eq!(parsed.errors.len(), 1);
        let analysis = analyze_rows(&parsed.modules[0].rows);
        assert_eq!(analysis.positional[0].count(9), 1);
        assert_eq!(analysis.positional[1].total(), 0);
        assert_eq!(analysis.positional[2].count(1), 1);
        assert_eq!(analysis.positional[3].count(2), 1);
    }

    #[test]
    fn test_coerce_row() {
        assert_eq!(coerce_row(" 12-4 "), vec![Some(1), Some(2), None, Some(4)]);
        assert!(coerce_row("").is_empty());
    }
}
