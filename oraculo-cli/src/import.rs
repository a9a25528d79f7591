use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use oraculo_db::models::{DataSet, History};

/// Fields keep their positions; only trailing empty fields are dropped.
fn parse_record(record: &csv::StringRecord) -> Result<DataSet> {
    let mut fields: Vec<&str> = record.iter().map(|f| f.trim()).collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    DataSet::parse(&fields)
}

pub struct ImportResult {
    pub total_records: u32,
    pub imported: u32,
    pub errors: u32,
}

/// Lines are read newest first, so they are pushed oldest first to keep
/// the history order.
pub fn import_reader<R: Read>(history: &mut History, reader: R) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut result = ImportResult {
        total_records: 0,
        imported: 0,
        errors: 0,
    };
    let mut sets = Vec::new();

    for record_result in reader.records() {
        result.total_records += 1;
        match record_result {
            Ok(record) => match parse_record(&record) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    warn!("Erro na linha {}: {:#}", result.total_records, e);
                    result.errors += 1;
                }
            },
            Err(e) => {
                warn!("Erro de leitura na linha {}: {}", result.total_records, e);
                result.errors += 1;
            }
        }
    }

    for set in sets.into_iter().rev() {
        history.push_front(set);
        result.imported += 1;
    }

    Ok(result)
}

pub fn import_csv(history: &mut History, path: &Path) -> Result<ImportResult> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Impossível abrir {:?}", path))?;
    import_reader(history, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let record = csv::StringRecord::from(vec!["1234", " 5678 ", "9012", "3456", "7890", "1357", "246"]);
        let set = parse_record(&record).unwrap();
        assert_eq!(set.rows()[1].to_string(), "5678");
        assert_eq!(set.shape(), vec![4, 4, 4, 4, 4, 4, 3]);
    }

    #[test]
    fn test_parse_record_invalid() {
        let record = csv::StringRecord::from(vec!["1234", "5678"]);
        assert!(parse_record(&record).is_err());
    }

    #[test]
    fn test_parse_record_keeps_positions() {
        let shifted = csv::StringRecord::from(vec!["1234", "", "5678", "9012", "3456", "7890", "1357", "246"]);
        assert!(parse_record(&shifted).is_err());
        let trailing = csv::StringRecord::from(vec!["1234", "5678", "9012", "3456", "7890", "1357", "246", ""]);
        assert_eq!(parse_record(&trailing).unwrap().rows()[6].to_string(), "246");
    }

    #[test]
    fn test_import_keeps_newest_first() {
        let data = "\
1111;1111;1111;1111;1111;1111;111
2222;2222;2222;2222;2222;2222;222
bad;line
3333;3333;3333;3333;3333;3333;333
";
        let mut history = History::default();
        let result = import_reader(&mut history, data.as_bytes()).unwrap();
        assert_eq!(result.total_records, 4);
        assert_eq!(result.imported, 3);
        assert_eq!(result.errors, 1);
        assert_eq!(history.sets()[0].rows()[0].to_string(), "1111");
        assert_eq!(history.sets()[2].rows()[0].to_string(), "3333");
    }
}
