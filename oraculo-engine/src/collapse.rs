use std::cmp::Ordering;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, RngExt, SeedableRng};

use oraculo_db::models::{HitRecord, HitStatus};

use crate::analysis::Analysis;
use crate::config::CollapseConfig;

/// Source of the randomized tie-break.
pub trait SelectionSource {
    /// Index in `[0, window)`.
    fn pick(&mut self, window: usize) -> usize;
    /// Uniform value in `[0, 1)`.
    fn unit(&mut self) -> f64;
}

pub struct RngSource<R>(pub R);

impl RngSource<StdRng> {
    pub fn seeded(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self(rng)
    }
}

impl<R: Rng> SelectionSource for RngSource<R> {
    fn pick(&mut self, window: usize) -> usize {
        self.0.random_range(0..window.max(1))
    }

    fn unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// Number of exact hits recorded at `rank` whose value contains `digit`.
pub fn exact_hits_containing(hits: &[HitRecord], rank: u8, digit: u8) -> usize {
    let c = char::from(b'0' + digit);
    hits.iter()
        .filter(|h| h.position == rank && h.status == HitStatus::Exact)
        .filter(|h| h.value.contains(c))
        .count()
}

pub fn selection_window(entropy: f64, config: &CollapseConfig) -> usize {
    ((entropy * config.window_factor).floor() as usize).max(1)
}

pub struct Scorer<'a> {
    pub analysis: &'a Analysis,
    pub hits: &'a [HitRecord],
    pub config: &'a CollapseConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(analysis: &'a Analysis, hits: &'a [HitRecord], config: &'a CollapseConfig) -> Self {
        Self { analysis, hits, config }
    }

    /// Resistance of every digit for one output position. Lower is favored.
    pub fn resistance(&self, entropy: f64, column: usize, rank: u8, previous: &[u8]) -> [f64; 10] {
        let cfg = self.config;
        let mut map = [cfg.baseline; 10];

        for (digit, resistance) in (0..10u8).zip(map.iter_mut()) {
            let mut resonance = 0.0;
            resonance += self.analysis.global.count(digit) as f64 * cfg.global_weight;
            resonance += self
                .analysis
                .positional(column)
                .map(|t| t.count(digit))
                .unwrap_or(0) as f64
                * cfg.positional_weight;

            if rank == 1 {
                resonance += self.analysis.first_rank.count(digit) as f64 * cfg.first_rank_weight;
            }

            resonance += exact_hits_containing(self.hits, rank, digit) as f64 * cfg.hit_weight;

            let occurrences = previous.iter().filter(|&&d| d == digit).count();
            if occurrences > 0 {
                resonance -= cfg.repetition_weight * occurrences as f64 * (cfg.repetition_ceiling - entropy);
            }

            *resistance -= resonance / (1.0 + entropy);
        }

        map
    }

    /// Digits by ascending resistance; equal resistances keep digit order.
    pub fn ranked(&self, entropy: f64, column: usize, rank: u8, previous: &[u8]) -> Vec<(u8, f64)> {
        let map = self.resistance(entropy, column, rank, previous);
        let mut ranked: Vec<(u8, f64)> = (0..10u8).zip(map).collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        ranked
    }

    pub fn collapse(
        &self,
        entropy: f64,
        column: usize,
        rank: u8,
        previous: &[u8],
        source: &mut dyn SelectionSource,
    ) -> u8 {
        let ranked = self.ranked(entropy, column, rank, previous);
        let window = selection_window(entropy, self.config);
        let idx = source.pick(window);

        let chosen = if idx < window { ranked.get(idx) } else { None };
        let digit = chosen.unwrap_or(&ranked[0]).0;
        debug!(
            "colapso col={} rank={} janela={} idx={} -> {} (res {:.3})",
            column, rank, window, idx, digit, ranked[0].1
        );
        digit
    }

    /// Builds one four-digit sequence, feeding earlier picks back as the
    /// repetition context.
    pub fn sequence(&self, entropy: f64, rank: u8, source: &mut dyn SelectionSource) -> Vec<u8> {
        let mut seq = Vec::with_capacity(4);
        for column in 0..4 {
            let digit = self.collapse(entropy, column, rank, &seq, source);
            seq.push(digit);
        }
        seq
    }
}

#[cfg(test)]
pub(crate) struct ScriptedSource {
    picks: Vec<usize>,
    cursor: usize,
    unit: f64,
}

#[cfg(test)]
impl ScriptedSource {
    pub(crate) fn new(picks: Vec<usize>) -> Self {
        Self { picks, cursor: 0, unit: 0.5 }
    }

    pub(crate) fn always(index: usize) -> Self {
        Self::new(vec![index])
    }
}

#[cfg(test)]
impl SelectionSource for ScriptedSource {
    fn pick(&mut self, _window: usize) -> usize {
        let idx = self.picks[self.cursor % self.picks.len()];
        self.cursor += 1;
        idx
    }

    fn unit(&mut self) -> f64 {
        self.unit
    }
}
