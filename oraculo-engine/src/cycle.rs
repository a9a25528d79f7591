use anyhow::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use oraculo_db::models::{DataSet, DigitRow, HitRecord, History, RectificationRecord, DATASET_LEN};

use crate::analysis::{analyze_rows, to_cells, Analysis, DigitCell};
use crate::collapse::{Scorer, SelectionSource};
use crate::config::{EngineConfig, GroupConfig};
use crate::parse::ParsedModule;

const CANDIDATE_COUNT: usize = 3;
const HUNDREDS_COUNT: usize = 3;
const TENS_COUNT: usize = 3;
const ELITE_TENS_COUNT: usize = 2;
const SUPER_TENS_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub sequence: Vec<u8>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPredictions {
    pub hundreds: Vec<Prediction>,
    pub tens: Vec<Prediction>,
    pub elite_tens: Vec<Prediction>,
    pub super_tens: Vec<Prediction>,
}

pub struct CycleInputs<'a> {
    pub modules: &'a [ParsedModule],
    pub history: &'a History,
    pub hits: &'a [HitRecord],
    pub rectifications: &'a [RectificationRecord],
    pub entropy: f64,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub result: DataSet,
    pub candidates: Vec<Candidate>,
    pub advanced: AdvancedPredictions,
    pub analysis: Analysis,
}

/// Module rows first, then every history row, newest set first.
pub fn combined_rows(modules: &[ParsedModule], history: &History) -> Vec<Vec<DigitCell>> {
    let module_rows = modules.iter().flat_map(|m| m.rows.iter().cloned());
    let history_rows = history
        .sets()
        .iter()
        .flat_map(|set| set.rows().iter().map(|r| to_cells(r.digits())));
    module_rows.chain(history_rows).collect()
}

fn group(
    scorer: &Scorer,
    group_config: GroupConfig,
    count: usize,
    keep_from: usize,
    source: &mut dyn SelectionSource,
) -> Vec<Prediction> {
    (0..count)
        .map(|_| {
            let seq = scorer.sequence(group_config.entropy, 1, source);
            let value = seq[keep_from..].iter().map(|d| d.to_string()).collect();
            Prediction { value, confidence: group_config.confidence }
        })
        .collect()
}

pub fn run_generation_cycle(
    inputs: &CycleInputs,
    config: &EngineConfig,
    source: &mut dyn SelectionSource,
) -> Result<GenerationOutcome> {
    let rows = combined_rows(inputs.modules, inputs.history);
    let analysis = analyze_rows(&rows);
    debug!(
        "{} linhas analisadas, {} acertos, {} retificações",
        rows.len(),
        inputs.hits.len(),
        inputs.rectifications.len()
    );

    let scorer = Scorer::new(&analysis, inputs.hits, &config.collapse);
    let cycle = &config.cycle;

    let mut result_rows = Vec::with_capacity(DATASET_LEN);
    for i in 0..DATASET_LEN {
        let seq = scorer.sequence(inputs.entropy, i as u8 + 1, source);
        // The centena keeps the last three digits of a full four-column pass.
        let digits = if i == DATASET_LEN - 1 { seq[1..].to_vec() } else { seq };
        result_rows.push(DigitRow::new(digits)?);
    }
    let result = DataSet::new(result_rows)?;

    let candidate_entropy = inputs.entropy * cycle.candidate_entropy_factor;
    let candidates = (0..CANDIDATE_COUNT)
        .map(|_| {
            let sequence = scorer.sequence(candidate_entropy, 1, source);
            let confidence = cycle.candidate_confidence + source.unit() * cycle.candidate_jitter;
            Candidate { sequence, confidence }
        })
        .collect();

    let advanced = AdvancedPredictions {
        hundreds: group(&scorer, cycle.hundreds, HUNDREDS_COUNT, 1, source),
        tens: group(&scorer, cycle.tens, TENS_COUNT, 2, source),
        elite_tens: group(&scorer, cycle.elite_tens, ELITE_TENS_COUNT, 2, source),
        super_tens: group(&scorer, cycle.super_tens, SUPER_TENS_COUNT, 2, source),
    };

    info!(
        "Ciclo gerado (entropia {:.2}) : {}",
        inputs.entropy,
        result.rows().iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" ")
    );

    Ok(GenerationOutcome {
        result,
        candidates,
        advanced,
        analysis,
    })
}
