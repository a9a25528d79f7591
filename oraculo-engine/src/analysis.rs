use serde::{Deserialize, Serialize};

/// Positional tables kept by the aggregator.
pub const COLUMNS: usize = 4;

/// Every 7th scanned row (starting at 0) is a first-prize row.
pub const FIRST_RANK_STRIDE: usize = 7;

/// Occurrence counts for the ten digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrequencyTable([u32; 10]);

impl FrequencyTable {
    pub fn count(&self, digit: u8) -> u32 {
        self.0.get(digit as usize).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, digit: u8) {
        if let Some(slot) = self.0.get_mut(digit as usize) {
            *slot += 1;
        }
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Digits sorted by decreasing count, ties by digit.
    pub fn ranked(&self) -> Vec<(u8, u32)> {
        let mut ranked: Vec<(u8, u32)> = (0..10u8).map(|d| (d, self.count(d))).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub global: FrequencyTable,
    pub positional: [FrequencyTable; COLUMNS],
    pub first_rank: FrequencyTable,
    pub row_sums: Vec<u32>,
    pub evens: u32,
    pub odds: u32,
}

impl Analysis {
    pub fn positional(&self, column: usize) -> Option<&FrequencyTable> {
        self.positional.get(column)
    }
}

/// One scanned position: `None` for a character that is not a digit, which
/// still occupies its column.
pub type DigitCell = Option<u8>;

/// Adapts a validated row to scanner cells.
pub fn to_cells(digits: &[u8]) -> Vec<DigitCell> {
    digits.iter().map(|&d| Some(d)).collect()
}

/// Scans rows in order. Empty rows are skipped but still advance the
/// first-rank stride; `None` cells are skipped but still advance the column.
pub fn analyze_rows<I, R>(rows: I) -> Analysis
where
    I: IntoIterator<Item = R>,
    R: AsRef<[DigitCell]>,
{
    let mut analysis = Analysis::default();

    for (row_index, row) in rows.into_iter().enumerate() {
        let row = row.as_ref();
        if row.is_empty() {
            continue;
        }
        let is_head = row_index % FIRST_RANK_STRIDE == 0;
        let mut sum = 0;
        let mut scanned = 0;

        for (column, cell) in row.iter().enumerate() {
            let Some(d) = *cell else {
                continue;
            };
            sum += d as u32;
            scanned += 1;
            analysis.global.increment(d);
            if let Some(table) = analysis.positional.get_mut(column) {
                table.increment(d);
            }
            if is_head {
                analysis.first_rank.increment(d);
            }
            if d % 2 == 0 {
                analysis.evens += 1;
            } else {
                analysis.odds += 1;
            }
        }

        if scanned > 0 {
            analysis.row_sums.push(sum);
        }
    }

    analysis
}

#[cfg(test)]
pub(crate) fn analyze_digits(raw: &[&[u8]]) -> Analysis {
    analyze_rows(raw.iter().map(|r| to_cells(r)))
}
