use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use oraculo_db::db::KeyValueStore;
use oraculo_db::models::{
    rank_label, validate_position, DataSet, Entropy, HitRecord, HitStatus, History,
    RectificationRecord, Settings, SlotType, DATASET_LEN,
};

use crate::analysis::Analysis;
use crate::collapse::SelectionSource;
use crate::config::EngineConfig;
use crate::cycle::{run_generation_cycle, AdvancedPredictions, Candidate, CycleInputs, GenerationOutcome};
use crate::parse::{empty_module, parse_modules, MODULE_COUNT};
use crate::reconcile::{reconcile, Reconciliation};

pub const KEY_HISTORY: &str = "history";
pub const KEY_HITS: &str = "hits";
pub const KEY_RECT: &str = "rect";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_MODULES: [&str; MODULE_COUNT] = ["m1", "m2", "m3"];
pub const KEY_LAST_RESULT: &str = "last_res";
pub const KEY_LAST_CANDIDATES: &str = "last_cand";
pub const KEY_LAST_ADVANCED: &str = "last_adv";
pub const KEY_LAST_ANALYSIS: &str = "last_ana";
pub const KEY_LOCKED: &str = "locked";

/// Index of the live module (ONDA-REAL); the other two are read-only.
const LIVE: usize = MODULE_COUNT - 1;

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub history: History,
    pub hits: Vec<HitRecord>,
    pub rectifications: Vec<RectificationRecord>,
    pub settings: Settings,
    pub modules: [Vec<String>; MODULE_COUNT],
    pub last_result: Option<DataSet>,
    pub last_candidates: Option<Vec<Candidate>>,
    pub last_advanced: Option<AdvancedPredictions>,
    pub last_analysis: Option<Analysis>,
    pub locked: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            history: History::default(),
            hits: Vec::new(),
            rectifications: Vec::new(),
            settings: Settings::default(),
            modules: [empty_module(), empty_module(), empty_module()],
            last_result: None,
            last_candidates: None,
            last_advanced: None,
            last_analysis: None,
            locked: false,
        }
    }
}

pub struct GenerateReport {
    pub outcome: GenerationOutcome,
    pub module_errors: Vec<String>,
}

pub struct SubmitReport {
    pub reconciliation: Option<Reconciliation>,
    pub history_appended: bool,
}

fn read<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(json) => {
            let value = serde_json::from_str(&json)
                .with_context(|| format!("JSON inválido na chave '{}'", key))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn write<T: Serialize + ?Sized>(store: &impl KeyValueStore, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)
        .with_context(|| format!("Falha ao serializar a chave '{}'", key))?;
    store.set(key, &json)
}

fn normalize_module(mut lines: Vec<String>) -> Vec<String> {
    lines.resize(DATASET_LEN, String::new());
    lines
}

fn remove_at<T>(items: &mut Vec<T>, index: usize, what: &str) -> Result<T> {
    if index >= items.len() {
        bail!("Índice {} fora de {} ({} entradas)", index, what, items.len());
    }
    Ok(items.remove(index))
}

fn validate_value(value: &str) -> Result<()> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        bail!("Valor inválido '{}' (apenas dígitos)", value);
    }
    Ok(())
}

impl AppState {
    /// Reads every key; absent keys keep their defaults.
    pub fn load(store: &impl KeyValueStore) -> Result<Self> {
        let mut state = Self::default();

        if let Some(history) = read(store, KEY_HISTORY)? {
            state.history = history;
        }
        if let Some(hits) = read(store, KEY_HITS)? {
            state.hits = hits;
        }
        if let Some(rects) = read(store, KEY_RECT)? {
            state.rectifications = rects;
        }
        if let Some(settings) = read(store, KEY_SETTINGS)? {
            state.settings = settings;
        }
        for (slot, key) in state.modules.iter_mut().zip(KEY_MODULES) {
            if let Some(lines) = read::<Vec<String>>(store, key)? {
                *slot = normalize_module(lines);
            }
        }
        state.last_result = read::<Option<DataSet>>(store, KEY_LAST_RESULT)?.flatten();
        state.last_candidates = read::<Option<Vec<Candidate>>>(store, KEY_LAST_CANDIDATES)?.flatten();
        state.last_advanced = read::<Option<AdvancedPredictions>>(store, KEY_LAST_ADVANCED)?.flatten();
        state.last_analysis = read::<Option<Analysis>>(store, KEY_LAST_ANALYSIS)?.flatten();
        state.locked = read(store, KEY_LOCKED)?.unwrap_or(false);

        Ok(state)
    }

    pub fn save(&self, store: &impl KeyValueStore) -> Result<()> {
        write(store, KEY_HISTORY, &self.history)?;
        write(store, KEY_HITS, &self.hits)?;
        write(store, KEY_RECT, &self.rectifications)?;
        write(store, KEY_SETTINGS, &self.settings)?;
        for (lines, key) in self.modules.iter().zip(KEY_MODULES) {
            write(store, key, lines)?;
        }
        write(store, KEY_LAST_RESULT, &self.last_result)?;
        write(store, KEY_LAST_CANDIDATES, &self.last_candidates)?;
        write(store, KEY_LAST_ADVANCED, &self.last_advanced)?;
        write(store, KEY_LAST_ANALYSIS, &self.last_analysis)?;
        write(store, KEY_LOCKED, &self.locked)?;
        Ok(())
    }

    /// Runs one generation cycle. Returns `None` while a result is locked.
    pub fn generate(
        &mut self,
        config: &EngineConfig,
        source: &mut dyn SelectionSource,
    ) -> Result<Option<GenerateReport>> {
        if self.locked {
            info!("Matriz bloqueada, geração ignorada");
            return Ok(None);
        }
        self.complete_generation(config, source).map(Some)
    }

    /// Persists the lock ahead of a cycle so a concurrent run is rejected
    /// while this one is pending. Returns `false` when already locked.
    pub fn reserve_generation(store: &impl KeyValueStore) -> Result<bool> {
        let locked: bool = read(store, KEY_LOCKED)?.unwrap_or(false);
        if locked {
            info!("Matriz bloqueada, reserva recusada");
            return Ok(false);
        }
        write(store, KEY_LOCKED, &true)?;
        Ok(true)
    }

    /// Runs the cycle regardless of the lock and locks the result. Pairs
    /// with [`AppState::reserve_generation`].
    pub fn complete_generation(
        &mut self,
        config: &EngineConfig,
        source: &mut dyn SelectionSource,
    ) -> Result<GenerateReport> {
        let parsed = parse_modules(&self.modules);
        for err in &parsed.errors {
            warn!("{}", err);
        }

        let inputs = CycleInputs {
            modules: &parsed.modules,
            history: &self.history,
            hits: &self.hits,
            rectifications: &self.rectifications,
            entropy: self.settings.entropy.value(),
        };
        let outcome = run_generation_cycle(&inputs, config, source)?;

        self.last_result = Some(outcome.result.clone());
        self.last_candidates = Some(outcome.candidates.clone());
        self.last_advanced = Some(outcome.advanced.clone());
        self.last_analysis = Some(outcome.analysis.clone());
        self.locked = true;

        Ok(GenerateReport {
            outcome,
            module_errors: parsed.errors,
        })
    }

    /// Reconciles the actual draw, rotates the modules and records the
    /// draw in history when it is well formed.
    pub fn submit_actuals(&mut self, values: Vec<String>, now: i64) -> SubmitReport {
        let values = normalize_module(values);

        let reconciliation = self.last_result.as_ref().map(|generated| reconcile(&values, generated, now));
        if let Some(rec) = &reconciliation {
            let mut hits = rec.hits.clone();
            hits.append(&mut self.hits);
            self.hits = hits;

            let mut rects = rec.rectifications.clone();
            rects.append(&mut self.rectifications);
            self.rectifications = rects;
        }

        let history_appended = match DataSet::parse(&values) {
            Ok(set) => {
                self.history.push_front(set);
                true
            }
            Err(e) => {
                warn!("Conjunto real não gravado no histórico : {:#}", e);
                false
            }
        };

        self.modules.rotate_left(1);
        self.modules[LIVE] = values;
        self.locked = false;

        SubmitReport {
            reconciliation,
            history_appended,
        }
    }

    pub fn set_live_module(&mut self, values: Vec<String>) {
        self.modules[LIVE] = normalize_module(values);
        self.locked = false;
    }

    pub fn clear_live_module(&mut self) {
        self.modules[LIVE] = empty_module();
    }

    pub fn mark_hit(&mut self, value: &str, position: u8, status: HitStatus, now: i64) -> Result<()> {
        validate_position(position)?;
        validate_value(value)?;
        self.hits.insert(
            0,
            HitRecord {
                value: value.to_string(),
                slot: SlotType::for_index(position as usize - 1),
                position,
                status,
                timestamp: now,
            },
        );
        Ok(())
    }

    pub fn rectify(&mut self, generated: &str, actual: &str, position: u8, now: i64) -> Result<()> {
        validate_position(position)?;
        validate_value(generated)?;
        validate_value(actual)?;
        self.rectifications.insert(
            0,
            RectificationRecord {
                generated: generated.to_string(),
                actual: actual.to_string(),
                slot: SlotType::for_index(position as usize - 1),
                rank_label: rank_label(position),
                timestamp: now,
            },
        );
        Ok(())
    }

    pub fn delete_history(&mut self, index: usize) -> Result<()> {
        self.history.remove(index)?;
        Ok(())
    }

    pub fn delete_hit(&mut self, index: usize) -> Result<()> {
        remove_at(&mut self.hits, index, "acertos")?;
        Ok(())
    }

    pub fn delete_rectification(&mut self, index: usize) -> Result<()> {
        remove_at(&mut self.rectifications, index, "retificações")?;
        Ok(())
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn clear_hits(&mut self) {
        self.hits.clear();
    }

    pub fn clear_rectifications(&mut self) {
        self.rectifications.clear();
    }

    pub fn set_entropy(&mut self, value: f64) -> Result<()> {
        self.settings.entropy = Entropy::new(value)?;
        Ok(())
    }

    pub fn toggle_voice(&mut self) -> bool {
        self.settings.voice_enabled = !self.settings.voice_enabled;
        self.settings.voice_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::{RngSource, ScriptedSource};
    use rand::rngs::StdRng;
    use oraculo_db::db::migrate;
    use oraculo_db::rusqlite::Connection;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn lines(raw: [&str; DATASET_LEN]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn draw() -> Vec<String> {
        lines(["1234", "5678", "9012", "3456", "7890", "1357", "246"])
    }

    #[test]
    fn test_load_defaults_from_empty_store() {
        let conn = memory_db();
        let state = AppState::load(&conn).unwrap();
        assert_eq!(state, AppState::default());
        assert!((state.settings.entropy.value() - 0.45).abs() < 1e-10);
        assert!(state.settings.voice_enabled);
        assert!(state.modules.iter().all(|m| m.len() == DATASET_LEN));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let conn = memory_db();
        let mut state = AppState::default();
        state.set_live_module(draw());
        state.generate(&EngineConfig::default(), &mut RngSource::<StdRng>::seeded(Some(11))).unwrap();
        state.mark_hit("5352", 2, HitStatus::Near, 42).unwrap();
        state.rectify("1234", "4321", 7, 43).unwrap();
        state.set_entropy(0.8).unwrap();
        state.history.push_front(DataSet::parse(&draw()).unwrap());

        state.save(&conn).unwrap();
        let loaded = AppState::load(&conn).unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.locked);
    }

    #[test]
    fn test_corrupt_key_reports_name() {
        let conn = memory_db();
        conn.set(KEY_HITS, "{not json").unwrap();
        let err = AppState::load(&conn).unwrap_err();
        assert!(format!("{err:#}").contains("hits"));
    }

    #[test]
    fn test_generate_locks_until_submit() {
        let mut state = AppState::default();
        let config = EngineConfig::default();
        let mut source = ScriptedSource::always(0);

        let report = state.generate(&config, &mut source).unwrap().unwrap();
        assert_eq!(report.outcome.result.shape(), vec![4, 4, 4, 4, 4, 4, 3]);
        assert_eq!(report.module_errors.len(), 3);
        assert!(state.locked);
        assert!(state.generate(&config, &mut source).unwrap().is_none());

        state.submit_actuals(draw(), 0);
        assert!(!state.locked);
        assert!(state.generate(&config, &mut source).unwrap().is_some());
    }

    #[test]
    fn test_submit_reconciles_and_rotates() {
        let mut state = AppState::default();
        state.modules[0] = lines(["1111", "1111", "1111", "1111", "1111", "1111", "111"]);
        state.modules[1] = lines(["2222", "2222", "2222", "2222", "2222", "2222", "222"]);
        state.generate(&EngineConfig::default(), &mut ScriptedSource::always(0)).unwrap();
        let generated = state.last_result.clone().unwrap();
        let mut actual: Vec<String> = generated.rows().iter().map(|r| r.to_string()).collect();
        actual[1] = "0000".to_string();

        state.hits.push(HitRecord {
            value: "9999".to_string(),
            slot: SlotType::Milhar,
            position: 3,
            status: HitStatus::Exact,
            timestamp: 1,
        });

        let report = state.submit_actuals(actual.clone(), 99);
        let rec = report.reconciliation.unwrap();
        assert!(report.history_appended);
        assert_eq!(rec.rectifications.len(), 7);
        // New batch goes in front of the existing log.
        assert_eq!(state.hits.len(), rec.hits.len() + 1);
        assert_eq!(state.hits[0].timestamp, 99);
        assert_eq!(state.hits.last().unwrap().value, "9999");
        assert_eq!(state.rectifications.len(), 7);

        assert_eq!(state.modules[0][0], "2222");
        assert_eq!(state.modules[1][0], "");
        assert_eq!(state.modules[2], actual);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_submit_without_result_only_records_history() {
        let mut state = AppState::default();
        let report = state.submit_actuals(draw(), 0);
        assert!(report.reconciliation.is_none());
        assert!(state.rectifications.is_empty());
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn test_malformed_submit_skips_history() {
        let mut state = AppState::default();
        let report = state.submit_actuals(vec!["12".to_string(), "abcd".to_string()], 0);
        assert!(!report.history_appended);
        assert!(state.history.is_empty());
        assert_eq!(state.modules[LIVE].len(), DATASET_LEN);
    }

    #[test]
    fn test_manual_entries_validation() {
        let mut state = AppState::default();
        assert!(state.mark_hit("12a4", 1, HitStatus::Exact, 0).is_err());
        assert!(state.mark_hit("1234", 0, HitStatus::Exact, 0).is_err());
        state.mark_hit("123", 7, HitStatus::Exact, 0).unwrap();
        assert_eq!(state.hits[0].slot, SlotType::Centena);
        state.rectify("1234", "1243", 1, 0).unwrap();
        assert_eq!(state.rectifications[0].rank_label, "1º PRÊMIO");
    }

    #[test]
    fn test_delete_and_clear() {
        let mut state = AppState::default();
        state.mark_hit("1234", 1, HitStatus::Exact, 0).unwrap();
        state.mark_hit("5678", 2, HitStatus::Near, 1).unwrap();
        assert!(state.delete_hit(5).is_err());
        state.delete_hit(0).unwrap();
        assert_eq!(state.hits[0].value, "1234");
        state.clear_hits();
        assert!(state.hits.is_empty());
        assert!(state.delete_rectification(0).is_err());
        assert!(state.delete_history(0).is_err());
    }

    #[test]
    fn test_settings_changes() {
        let mut state = AppState::default();
        assert!(state.set_entropy(1.2).is_err());
        state.set_entropy(0.1).unwrap();
        assert!((state.settings.entropy.value() - 0.1).abs() < 1e-10);
        assert!(!state.toggle_voice());
        assert!(state.toggle_voice());
    }

    #[test]
    fn test_clear_live_module_keeps_lock() {
        let mut state = AppState::default();
        state.set_live_module(draw());
        state.locked = true;
        state.clear_live_module();
        assert!(state.locked);
        assert!(state.modules[LIVE].iter().all(|l| l.is_empty()));
    }

    #[test]
    fn test_reserve_generation_rejects_second_run() {
        let conn = memory_db();
        assert!(AppState::reserve_generation(&conn).unwrap());
        assert!(!AppState::reserve_generation(&conn).unwrap());
        assert!(AppState::load(&conn).unwrap().locked);
    }

    #[test]
    fn test_pending_generation_keeps_concurrent_writes() {
        let conn = memory_db();
        assert!(AppState::reserve_generation(&conn).unwrap());

        let mut other = AppState::load(&conn).unwrap();
        other.mark_hit("1234", 1, HitStatus::Exact, 5).unwrap();
        other.save(&conn).unwrap();

        let mut state = AppState::load(&conn).unwrap();
        let report = state
            .complete_generation(&EngineConfig::default(), &mut ScriptedSource::always(0))
            .unwrap();
        state.save(&conn).unwrap();

        assert_eq!(report.outcome.result.shape(), vec![4, 4, 4, 4, 4, 4, 3]);
        let loaded = AppState::load(&conn).unwrap();
        assert_eq!(loaded.hits.len(), 1);
        assert_eq!(loaded.hits[0].value, "1234");
        assert!(loaded.locked);
        assert!(loaded.last_result.is_some());
    }
}
