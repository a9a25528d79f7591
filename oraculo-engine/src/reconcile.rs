use log::info;

use oraculo_db::models::{
    rank_label, DataSet, HitRecord, HitStatus, RectificationRecord, SlotType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Exact,
    Permutation,
    Partial(usize),
    Miss,
}

impl Match {
    pub fn status(&self) -> Option<HitStatus> {
        match self {
            Match::Exact => Some(HitStatus::Exact),
            Match::Permutation | Match::Partial(_) => Some(HitStatus::Near),
            Match::Miss => None,
        }
    }
}

/// Outcome of a whole batch, drives the spoken notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Resonance,
    Permutation,
    Assimilated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub hits: Vec<HitRecord>,
    pub rectifications: Vec<RectificationRecord>,
}

impl Reconciliation {
    pub fn verdict(&self) -> Verdict {
        if self.hits.iter().any(|h| h.status == HitStatus::Exact) {
            Verdict::Resonance
        } else if self.hits.iter().any(|h| h.status == HitStatus::Near) {
            Verdict::Permutation
        } else {
            Verdict::Assimilated
        }
    }
}

fn sorted_chars(s: &str) -> Vec<char> {
    let mut chars: Vec<char> = s.chars().collect();
    chars.sort_unstable();
    chars
}

pub fn classify(generated: &str, actual: &str, slot: SlotType) -> Match {
    if generated == actual {
        return Match::Exact;
    }
    if sorted_chars(generated) == sorted_chars(actual) {
        return Match::Permutation;
    }
    let matches = actual
        .chars()
        .zip(generated.chars())
        .filter(|(a, g)| a == g)
        .count();
    if matches >= slot.min_matches() {
        Match::Partial(matches)
    } else {
        Match::Miss
    }
}

/// Compares actual values against the generated set, index by index.
/// Values shorter than three characters are ignored.
pub fn reconcile<S: AsRef<str>>(actuals: &[S], generated: &DataSet, now: i64) -> Reconciliation {
    let mut out = Reconciliation::default();

    for (idx, (actual, row)) in actuals.iter().zip(generated.rows()).enumerate() {
        let actual = actual.as_ref();
        if actual.chars().count() < 3 {
            continue;
        }

        let gen = row.to_string();
        let slot = SlotType::for_index(idx);
        let position = idx as u8 + 1;

        let outcome = classify(&gen, actual, slot);
        if let Some(status) = outcome.status() {
            out.hits.push(HitRecord {
                value: gen.clone(),
                slot,
                position,
                status,
                timestamp: now,
            });
        }
        info!("{} : gerado {} / real {} -> {:?}", rank_label(position), gen, actual, outcome);

        out.rectifications.push(RectificationRecord {
            generated: gen,
            actual: actual.to_string(),
            slot,
            rank_label: rank_label(position),
            timestamp: now,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated() -> DataSet {
        DataSet::parse(&["5352", "1234", "1234", "9876", "0000", "4321", "123"]).unwrap()
    }

    #[test]
    fn test_classify_examples() {
        assert_eq!(classify("5352", "5352", SlotType::Milhar), Match::Exact);
        assert_eq!(classify("5352", "3255", SlotType::Milhar), Match::Permutation);
        assert_eq!(classify("1234", "1235", SlotType::Milhar), Match::Partial(3));
        assert_eq!(classify("1234", "5678", SlotType::Milhar), Match::Miss);
        assert_eq!(classify("1234", "1299", SlotType::Milhar), Match::Miss);
    }

    #[test]
    fn test_classify_centena_threshold() {
        assert_eq!(classify("123", "129", SlotType::Centena), Match::Partial(2));
        assert_eq!(classify("123", "199", SlotType::Centena), Match::Miss);
        assert_eq!(classify("123", "312", SlotType::Centena), Match::Permutation);
    }

    #[test]
    fn test_reconcile_records_hits_and_rectifications() {
        let actuals = ["5352", "3214", "1235", "5678", "", "43", "123"];
        let out = reconcile(&actuals, &generated(), 1000);

        assert_eq!(out.hits.len(), 4);
        assert_eq!(out.hits[0].status, HitStatus::Exact);
        assert_eq!(out.hits[0].position, 1);
        assert_eq!(out.hits[1].status, HitStatus::Near);
        assert_eq!(out.hits[1].value, "1234");
        assert_eq!(out.hits[2].position, 3);
        assert_eq!(out.hits[3].slot, SlotType::Centena);
        assert_eq!(out.hits[3].position, 7);

        // Empty and short values are skipped entirely.
        assert_eq!(out.rectifications.len(), 5);
        let miss = &out.rectifications[3];
        assert_eq!(miss.generated, "9876");
        assert_eq!(miss.actual, "5678");
        assert_eq!(miss.rank_label, "4º PRÊMIO");
        assert!(out.rectifications.iter().all(|r| r.timestamp == 1000));
    }

    #[test]
    fn test_miss_still_rectified() {
        let set = DataSet::parse(&["1234", "1234", "1234", "1234", "1234", "1234", "123"]).unwrap();
        let out = reconcile(&["5678"], &set, 0);
        assert!(out.hits.is_empty());
        assert_eq!(out.rectifications.len(), 1);
        assert_eq!(out.rectifications[0].generated, "1234");
        assert_eq!(out.rectifications[0].actual, "5678");
        assert_eq!(out.verdict(), Verdict::Assimilated);
    }

    #[test]
    fn test_verdict_priority() {
        let exact_and_near = reconcile(&["5352", "1243"], &generated(), 0);
        assert_eq!(exact_and_near.verdict(), Verdict::Resonance);
        let near_only = reconcile(&["3255"], &generated(), 0);
        assert_eq!(near_only.verdict(), Verdict::Permutation);
        assert_eq!(Reconciliation::default().verdict(), Verdict::Assimilated);
    }

    #[test]
    fn test_extra_actuals_ignored() {
        let actuals = vec!["0000".to_string(); 9];
        let out = reconcile(&actuals, &generated(), 0);
        assert_eq!(out.rectifications.len(), 7);
    }
}
