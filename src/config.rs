use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::analytics::AnalyticsSettings;
use crate::error::ConfigError;
use crate::forecast::{
    DEFAULT_MIN_HISTORY_BARS, DEFAULT_MODEL_NAME, DEFAULT_MODEL_VERSION, ForecastEngine,
};
use crate::model::LookbackPeriod;
use crate::pivot::{DEFAULT_TOLERANCE, DEFAULT_WINDOW_RADIUS, PivotEngine};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_short_period() -> String {
    "30d".into()
}

fn default_long_period() -> String {
    "90d".into()
}

fn default_pivot_window() -> usize {
    DEFAULT_WINDOW_RADIUS
}

fn default_level_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.into()
}

fn default_model_version() -> String {
    DEFAULT_MODEL_VERSION.into()
}

fn default_min_history_bars() -> usize {
    DEFAULT_MIN_HISTORY_BARS
}

fn default_min_lookback_days() -> u32 {
    90
}

fn default_lookback_multiplier() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_short_period")]
    pub technical_period: String,
    #[serde(default = "default_short_period")]
    pub volatility_period: String,
    #[serde(default = "default_long_period")]
    pub levels_period: String,
    #[serde(default = "default_long_period")]
    pub correlation_period: String,
    #[serde(default = "default_pivot_window")]
    pub pivot_window: usize,
    #[serde(default = "default_level_tolerance")]
    pub level_tolerance: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            technical_period: default_short_period(),
            volatility_period: default_short_period(),
            levels_period: default_long_period(),
            correlation_period: default_long_period(),
            pivot_window: default_pivot_window(),
            level_tolerance: default_level_tolerance(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_model_version")]
    pub model_version: String,
    #[serde(default = "default_min_history_bars")]
    pub min_history_bars: usize,
    #[serde(default = "default_min_lookback_days")]
    pub min_lookback_days: u32,
    #[serde(default = "default_lookback_multiplier")]
    pub lookback_multiplier: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            model_version: default_model_version(),
            min_history_bars: default_min_history_bars(),
            min_lookback_days: default_min_lookback_days(),
            lookback_multiplier: default_lookback_multiplier(),
        }
    }
}

impl AppConfig {
    /// Lookbacks and prediction sizing. Periods were checked by [`load`].
    pub fn analytics_settings(&self) -> AnalyticsSettings {
        AnalyticsSettings {
            technical_period: LookbackPeriod::parse(&self.analytics.technical_period),
            volatility_period: LookbackPeriod::parse(&self.analytics.volatility_period),
            levels_period: LookbackPeriod::parse(&self.analytics.levels_period),
            correlation_period: LookbackPeriod::parse(&self.analytics.correlation_period),
            min_lookback_days: self.forecast.min_lookback_days,
            lookback_multiplier: self.forecast.lookback_multiplier,
        }
    }

    pub fn pivot_engine(&self) -> Result<PivotEngine, Report<ConfigError>> {
        PivotEngine::new(self.analytics.pivot_window, self.analytics.level_tolerance).change_context(
            ConfigError::Validation {
                field: "analytics.pivot_window / analytics.level_tolerance".into(),
            },
        )
    }

    pub fn forecast_engine(&self) -> ForecastEngine {
        ForecastEngine::new(
            &self.forecast.model_name,
            &self.forecast.model_version,
            self.forecast.min_history_bars,
        )
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_periods(config)?;
    validate_pivots(config)?;
    validate_forecast(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    Ok(())
}

fn validate_periods(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let periods = [
        ("technical_period", &config.analytics.technical_period),
        ("volatility_period", &config.analytics.volatility_period),
        ("levels_period", &config.analytics.levels_period),
        ("correlation_period", &config.analytics.correlation_period),
    ];
    for (name, value) in periods {
        match LookbackPeriod::parse_strict(value) {
            Some(period) if period.days() > 0 => {}
            _ => {
                return Err(invalid(format!(
                    "analytics.{name}: \"{value}\" is not a period like \"30d\""
                )));
            }
        }
    }
    Ok(())
}

fn validate_pivots(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.analytics.pivot_window == 0 {
        return Err(invalid("analytics.pivot_window must be > 0".into()));
    }
    let tolerance = config.analytics.level_tolerance;
    if !(tolerance > 0.0 && tolerance < 1.0) {
        return Err(invalid(format!(
            "analytics.level_tolerance {tolerance} must be in (0, 1)"
        )));
    }
    Ok(())
}

fn validate_forecast(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.forecast.min_history_bars < 2 {
        return Err(invalid("forecast.min_history_bars must be >= 2".into()));
    }
    if config.forecast.lookback_multiplier == 0 {
        return Err(invalid("forecast.lookback_multiplier must be > 0".into()));
    }
    if config.forecast.model_name.trim().is_empty() {
        return Err(invalid("forecast.model_name must not be empty".into()));
    }
    Ok(())
}
