//! Stage factory: converts a `StageConfig` into a runtime processor.

use std::sync::Arc;

use crate::config::{StageConfig, StageKind};
use crate::error::{PipelineError, Result};
use crate::processor::Processor;
use crate::processors::{atr, boll, signals, Atr, Base, Boll, Macd, Pressure, Rsi, Signals, Volume};

// ─── Helpers ─────────────────────────────────────────────────────────

/// Extract a named f64 parameter from a `StageConfig`, falling back to `default`.
fn param(config: &StageConfig, name: &str, default: f64) -> f64 {
    config.params.get(name).copied().unwrap_or(default)
}

/// Extract a named whole-number parameter from a `StageConfig`, falling back
/// to `default`. Fractional or negative values are rejected.
fn param_usize(config: &StageConfig, name: &str, default: usize) -> Result<usize> {
    match config.params.get(name).copied() {
        None => Ok(default),
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        Some(v) => Err(PipelineError::InvalidConfig(format!(
            "stage `{}`: parameter `{name}` must be a whole number, got {v}",
            config.name
        ))),
    }
}

/// Parameters that scale a band or a threshold and must stay above zero.
const POSITIVE_PARAMS: &[&str] = &[
    "num_std",
    "squeeze_threshold",
    "compression_threshold",
    "break_threshold",
];

/// Every stage needs at least two rows in its window.
pub(crate) fn check_window(stage: &str, window: usize) -> Result<()> {
    if window < 2 {
        return Err(PipelineError::InvalidConfig(format!(
            "stage `{stage}`: window must be >= 2, got {window}"
        )));
    }
    Ok(())
}

fn validate(config: &StageConfig, window: usize) -> Result<()> {
    check_window(&config.name, window)?;
    let known = config.kind.known_params();
    if let Some(unknown) = config.params.keys().find(|k| !known.contains(&k.as_str())) {
        return Err(PipelineError::InvalidConfig(format!(
            "stage `{}` ({}) has no parameter `{unknown}`",
            config.name, config.kind
        )));
    }
    if let Some((name, value)) = config.params.iter().find(|(_, v)| !v.is_finite()) {
        return Err(PipelineError::InvalidConfig(format!(
            "stage `{}`: parameter `{name}` must be finite, got {value}",
            config.name
        )));
    }
    if let Some((name, value)) = config
        .params
        .iter()
        .find(|(k, v)| POSITIVE_PARAMS.contains(&k.as_str()) && **v <= 0.0)
    {
        return Err(PipelineError::InvalidConfig(format!(
            "stage `{}`: parameter `{name}` must be > 0, got {value}",
            config.name
        )));
    }
    Ok(())
}

// ─── Stage factory ───────────────────────────────────────────────────

/// Create a processor from a `StageConfig`. A stage without its own window
/// uses `default_window`.
pub fn create_stage(config: &StageConfig, default_window: usize) -> Result<Arc<dyn Processor>> {
    let window = config.window.unwrap_or(default_window);
    validate(config, window)?;

    let stage: Arc<dyn Processor> = match config.kind {
        StageKind::Base => {
            let period = param_usize(config, "efficiency_period", window)?;
            if period == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "stage `{}`: efficiency_period must be >= 1",
                    config.name
                )));
            }
            Arc::new(Base::new(window).with_efficiency_period(period))
        }
        StageKind::Volume => Arc::new(Volume::new(window)),
        StageKind::Rsi => Arc::new(Rsi::new(window)),
        StageKind::Macd => Arc::new(Macd::new(window)),
        StageKind::Boll => Arc::new(
            Boll::new(window)
                .with_squeeze_threshold(param(
                    config,
                    "squeeze_threshold",
                    boll::DEFAULT_SQUEEZE_THRESHOLD,
                ))
                .with_num_std(param(config, "num_std", boll::DEFAULT_NUM_STD)),
        ),
        StageKind::Atr => Arc::new(
            Atr::new(window)
                .with_compression_threshold(param(
                    config,
                    "compression_threshold",
                    atr::DEFAULT_COMPRESSION_THRESHOLD,
                ))
                .with_break_threshold(param(
                    config,
                    "break_threshold",
                    atr::DEFAULT_BREAK_THRESHOLD,
                )),
        ),
        StageKind::Pressure => Arc::new(Pressure::new(window)),
        StageKind::Signals => Arc::new(
            Signals::new(window)
                .with_volume_ratio_slow_min(param(
                    config,
                    "volume_ratio_slow_min",
                    signals::DEFAULT_VOLUME_RATIO_SLOW_MIN,
                ))
                .with_buy_sell_ratio_min(param(
                    config,
                    "buy_sell_ratio_min",
                    signals::DEFAULT_BUY_SELL_RATIO_MIN,
                ))
                .with_rsi_min(param(config, "rsi_min", signals::DEFAULT_RSI_MIN))
                .with_volume_zscore_min(param(
                    config,
                    "volume_zscore_min",
                    signals::DEFAULT_VOLUME_ZSCORE_MIN,
                )),
        ),
    };

    Ok(stage)
}
