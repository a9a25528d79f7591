use std::fmt;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of sets kept in history.
pub const HISTORY_CAP: usize = 300;

/// Rows per set: six milhares and one centena.
pub const DATASET_LEN: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotType {
    Milhar,
    Centena,
}

impl SlotType {
    pub fn for_index(index: usize) -> Self {
        if index == DATASET_LEN - 1 {
            SlotType::Centena
        } else {
            SlotType::Milhar
        }
    }

    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            4 => Some(SlotType::Milhar),
            3 => Some(SlotType::Centena),
            _ => None,
        }
    }

    pub fn digits(&self) -> usize {
        match self {
            SlotType::Milhar => 4,
            SlotType::Centena => 3,
        }
    }

    /// Same-position matches needed for a near hit.
    pub fn min_matches(&self) -> usize {
        match self {
            SlotType::Milhar => 3,
            SlotType::Centena => 2,
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Milhar => write!(f, "Milhar"),
            SlotType::Centena => write!(f, "Centena"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitStatus {
    Exact,
    Near,
}

impl fmt::Display for HitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitStatus::Exact => write!(f, "ACERTO"),
            HitStatus::Near => write!(f, "QUASE ACERTO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DigitRow(Vec<u8>);

impl DigitRow {
    pub fn new(digits: Vec<u8>) -> Result<Self> {
        if SlotType::from_len(digits.len()).is_none() {
            bail!("Linha com {} dígitos (esperado 3 ou 4)", digits.len());
        }
        if let Some(d) = digits.iter().find(|&&d| d > 9) {
            bail!("Valor {} não é um dígito", d);
        }
        Ok(Self(digits))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let digits = s
            .trim()
            .chars()
            .map(|c| {
                c.to_digit(10)
                    .map(|d| d as u8)
                    .with_context(|| format!("Caractere inválido '{}' em '{}'", c, s))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(digits)
    }

    pub fn digits(&self) -> &[u8] {
        &self.0
    }

    pub fn slot_type(&self) -> SlotType {
        if self.0.len() == 3 {
            SlotType::Centena
        } else {
            SlotType::Milhar
        }
    }
}

impl TryFrom<Vec<u8>> for DigitRow {
    type Error = anyhow::Error;

    fn try_from(digits: Vec<u8>) -> Result<Self> {
        Self::new(digits)
    }
}

impl From<DigitRow> for Vec<u8> {
    fn from(row: DigitRow) -> Self {
        row.0
    }
}

impl fmt::Display for DigitRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.0 {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// One full draw: rows 0-5 are milhares, row 6 is the centena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DigitRow>", into = "Vec<DigitRow>")]
pub struct DataSet(Vec<DigitRow>);

impl DataSet {
    pub fn new(rows: Vec<DigitRow>) -> Result<Self> {
        if rows.len() != DATASET_LEN {
            bail!("Conjunto com {} linhas (esperado {})", rows.len(), DATASET_LEN);
        }
        for (i, row) in rows.iter().enumerate() {
            let expected = SlotType::for_index(i).digits();
            if row.digits().len() != expected {
                bail!(
                    "Linha {} com {} dígitos (esperado {})",
                    i + 1,
                    row.digits().len(),
                    expected
                );
            }
        }
        Ok(Self(rows))
    }

    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let rows = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                DigitRow::parse(line.as_ref()).with_context(|| format!("Linha {}", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(rows)
    }

    pub fn rows(&self) -> &[DigitRow] {
        &self.0
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.iter().map(|r| r.digits().len()).collect()
    }
}

impl TryFrom<Vec<DigitRow>> for DataSet {
    type Error = anyhow::Error;

    fn try_from(rows: Vec<DigitRow>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<DataSet> for Vec<DigitRow> {
    fn from(set: DataSet) -> Self {
        set.0
    }
}

/// Input snapshots, newest first, never longer than [`HISTORY_CAP`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DataSet>", into = "Vec<DataSet>")]
pub struct History(Vec<DataSet>);

impl History {
    pub fn push_front(&mut self, set: DataSet) {
        self.0.insert(0, set);
        self.0.truncate(HISTORY_CAP);
    }

    pub fn remove(&mut self, index: usize) -> Result<DataSet> {
        if index >= self.0.len() {
            bail!("Índice {} fora do histórico ({} entradas)", index, self.0.len());
        }
        Ok(self.0.remove(index))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sets(&self) -> &[DataSet] {
        &self.0
    }
}

impl From<Vec<DataSet>> for History {
    fn from(mut sets: Vec<DataSet>) -> Self {
        sets.truncate(HISTORY_CAP);
        Self(sets)
    }
}

impl From<History> for Vec<DataSet> {
    fn from(history: History) -> Self {
        history.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    pub value: String,
    #[serde(rename = "type")]
    pub slot: SlotType,
    pub position: u8,
    pub status: HitStatus,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectificationRecord {
    pub generated: String,
    pub actual: String,
    #[serde(rename = "type")]
    pub slot: SlotType,
    pub rank_label: String,
    pub timestamp: i64,
}

pub fn rank_label(position: u8) -> String {
    format!("{}º PRÊMIO", position)
}

pub fn validate_position(position: u8) -> Result<()> {
    if position < 1 || position as usize > DATASET_LEN {
        bail!("Posição {} fora dos limites (1-{})", position, DATASET_LEN);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Entropy(f64);

impl Entropy {
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            bail!("Entropia fora dos limites (0-1) : {}", value);
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self(0.45)
    }
}

impl TryFrom<f64> for Entropy {
    type Error = anyhow::Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Entropy> for f64 {
    fn from(entropy: Entropy) -> Self {
        entropy.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub entropy: Entropy,
    pub voice_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entropy: Entropy::default(),
            voice_enabled: true,
        }
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
pub fn make_test_set(seed: u8) -> DataSet {
    let rows = (0..DATASET_LEN)
        .map(|i| {
            let len = SlotType::for_index(i).digits();
            let digits = (0..len).map(|c| (seed + i as u8 + c as u8) % 10).collect();
            DigitRow::new(digits).unwrap()
        })
        .collect();
    DataSet::new(rows).unwrap()
}
