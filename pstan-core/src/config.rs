//! Pipeline configuration: which stages run, in what order, with which
//! windows and thresholds.
//!
//! Loaded from TOML:
//!
//! ```toml
//! window = 16
//!
//! [[stages]]
//! name = "base"
//! kind = "base"
//!
//! [[stages]]
//! name = "atr"
//! kind = "atr"
//! window = 20
//! params = { break_threshold = 2.5 }
//! ```
//!
//! Params use `BTreeMap` so the serialized form, and therefore the
//! `config_hash`, is independent of insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::processors::DEFAULT_WINDOW;

/// The eight stage kinds, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Base,
    Volume,
    Rsi,
    Macd,
    Boll,
    Atr,
    Pressure,
    Signals,
}

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        StageKind::Base,
        StageKind::Volume,
        StageKind::Rsi,
        StageKind::Macd,
        StageKind::Boll,
        StageKind::Atr,
        StageKind::Pressure,
        StageKind::Signals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Base => "base",
            StageKind::Volume => "volume",
            StageKind::Rsi => "rsi",
            StageKind::Macd => "macd",
            StageKind::Boll => "boll",
            StageKind::Atr => "atr",
            StageKind::Pressure => "pressure",
            StageKind::Signals => "signals",
        }
    }

    /// Parameter names the stage accepts in `params`.
    pub fn known_params(&self) -> &'static [&'static str] {
        match self {
            StageKind::Base => &["efficiency_period"],
            StageKind::Boll => &["squeeze_threshold", "num_std"],
            StageKind::Atr => &["compression_threshold", "break_threshold"],
            StageKind::Signals => &[
                "volume_ratio_slow_min",
                "buy_sell_ratio_min",
                "rsi_min",
                "volume_zscore_min",
            ],
            StageKind::Volume | StageKind::Rsi | StageKind::Macd | StageKind::Pressure => &[],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[[stages]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    pub name: String,
    pub kind: StageKind,
    /// Falls back to [`PipelineConfig::window`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl StageConfig {
    pub fn new(kind: StageKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            kind,
            window: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl PipelineConfig {
    /// Every stage in canonical order, all sharing `window`.
    pub fn default_chain(window: usize) -> Self {
        Self {
            window,
            stages: StageKind::ALL.iter().map(|&k| StageConfig::new(k)).collect(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PipelineError::ConfigParse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::ConfigParse(e.to_string()))
    }

    /// Deterministic hex digest of the whole configuration.
    ///
    /// Canonical serialization: fields in declaration order, params sorted
    /// (BTreeMap), so equal configs always hash equal.
    pub fn config_hash(&self) -> Result<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::default_chain(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stages_with_fallback_window() {
        let config = PipelineConfig::from_toml(
            r#"
            window = 8

            [[stages]]
            name = "base"
            kind = "base"

            [[stages]]
            name = "atr_wide"
            kind = "atr"
            window = 20
            params = { break_threshold = 2.5 }
            "#,
        )
        .unwrap();

        assert_eq!(config.window, 8);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].kind, StageKind::Base);
        assert_eq!(config.stages[0].window, None);
        assert_eq!(config.stages[1].window, Some(20));
        assert_eq!(config.stages[1].params["break_threshold"], 2.5);
    }

    #[test]
    fn window_defaults_to_sixteen() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.window, 16);
        assert!(config.stages.is_empty());
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = PipelineConfig::from_toml(
            r#"
            [[stages]]
            name = "x"
            kind = "stochastic"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigParse(_)));
    }

    #[test]
    fn default_chain_is_canonical_order() {
        let config = PipelineConfig::default_chain(16);
        let names: Vec<&str> = config.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["base", "volume", "rsi", "macd", "boll", "atr", "pressure", "signals"]
        );
    }

    #[test]
    fn toml_round_trip() {
        let mut config = PipelineConfig::default_chain(12);
        config.stages[5] = StageConfig::new(StageKind::Atr).with_param("break_threshold", 2.0);
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn config_hash_is_deterministic_and_param_sensitive() {
        let a = PipelineConfig::default_chain(16);
        let b = PipelineConfig::default_chain(16);
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        assert_eq!(a.config_hash().unwrap().len(), 64);

        let mut c = a.clone();
        c.stages[4] = StageConfig::new(StageKind::Boll).with_param("num_std", 2.5);
        assert_ne!(a.config_hash().unwrap(), c.config_hash().unwrap());
    }

    #[test]
    fn param_order_does_not_change_hash() {
        let mut a = PipelineConfig::default_chain(16);
        let mut b = a.clone();
        a.stages[7] = StageConfig::new(StageKind::Signals)
            .with_param("rsi_min", 55.0)
            .with_param("volume_zscore_min", 1.5);
        b.stages[7] = StageConfig::new(StageKind::Signals)
            .with_param("volume_zscore_min", 1.5)
            .with_param("rsi_min", 55.0);
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn kind_display_matches_serde_name() {
        for kind in StageKind::ALL {
            let toml = format!("name = \"s\"\nkind = \"{kind}\"\n");
            let stage: StageConfig = toml::from_str(&toml).unwrap();
            assert_eq!(stage.kind, kind);
        }
    }
}
