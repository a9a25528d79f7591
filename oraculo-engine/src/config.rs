use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Weights of the resistance scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    pub baseline: f64,
    pub global_weight: f64,
    pub positional_weight: f64,
    pub first_rank_weight: f64,
    pub hit_weight: f64,
    pub repetition_weight: f64,
    pub repetition_ceiling: f64,
    pub window_factor: f64,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            baseline: 100.0,
            global_weight: 0.35,
            positional_weight: 2.5,
            first_rank_weight: 9.0,
            hit_weight: 35.0,
            repetition_weight: 25.0,
            repetition_ceiling: 1.2,
            window_factor: 3.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub entropy: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub candidate_entropy_factor: f64,
    pub candidate_confidence: f64,
    pub candidate_jitter: f64,
    pub hundreds: GroupConfig,
    pub tens: GroupConfig,
    pub elite_tens: GroupConfig,
    pub super_tens: GroupConfig,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            candidate_entropy_factor: 0.35,
            candidate_confidence: 99.88,
            candidate_jitter: 0.11,
            hundreds: GroupConfig { entropy: 0.08, confidence: 99.98 },
            tens: GroupConfig { entropy: 0.12, confidence: 99.97 },
            elite_tens: GroupConfig { entropy: 0.04, confidence: 99.99 },
            super_tens: GroupConfig { entropy: 0.06, confidence: 99.96 },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub collapse: CollapseConfig,
    pub cycle: CycleConfig,
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossível ler {:?}", path))?;
    let config: EngineConfig = serde_json::from_str(&json)
        .with_context(|| format!("JSON inválido em {:?}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!((config.collapse.baseline - 100.0).abs() < 1e-10);
        assert!((config.collapse.window_factor - 3.5).abs() < 1e-10);
        assert!((config.cycle.elite_tens.entropy - 0.04).abs() < 1e-10);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"collapse":{"hit_weight":50.0}}"#).unwrap();
        assert!((config.collapse.hit_weight - 50.0).abs() < 1e-10);
        assert!((config.collapse.global_weight - 0.35).abs() < 1e-10);
        assert_eq!(config.cycle, CycleConfig::default());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }
}
