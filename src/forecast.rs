pub mod accuracy;

use std::fmt;

use chrono::{Days, NaiveDate};
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ForecastError, IndicatorError};
use crate::indicator::{IndicatorRequest, IndicatorSet};
use crate::model::{Bar, PredictionKind, Timeframe, Trend};
use crate::volatility::{daily_returns, population_std_dev};

pub const DEFAULT_MODEL_NAME: &str = "SimpleMovingAverageModel";
pub const DEFAULT_MODEL_VERSION: &str = "1.0";
pub const DEFAULT_MIN_HISTORY_BARS: usize = 30;

const SMA_SHORT: &str = "sma_20";
const SMA_LONG: &str = "sma_50";
const RSI: &str = "rsi_14";

/// Trailing window used for trend strength and recent volatility.
const RECENT_WINDOW: usize = 20;

const BASE_CONFIDENCE: f64 = 0.6;
const TREND_CONFIDENCE_BUMP: f64 = 0.1;
const TREND_MULTIPLIER_WEIGHT: f64 = 0.1;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_NUDGE: f64 = 0.05;
const MIN_TIME_DECAY: f64 = 0.3;
const DECAY_HORIZON_DAYS: f64 = 90.0;
const RANGE_SCALE_DAYS: f64 = 30.0;
const BULLISH_MULTIPLIER: f64 = 1.02;
const BEARISH_MULTIPLIER: f64 = 0.98;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.95;

const INPUT_FEATURES: [&str; 5] = ["price", "volume", "sma", "rsi", "macd"];

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Prediction lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Generated,
    OutcomeKnown,
    Evaluated,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generated => write!(f, "generated"),
            Self::OutcomeKnown => write!(f, "outcome_known"),
            Self::Evaluated => write!(f, "evaluated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    pub trend_strength: f64,
    pub volatility: f64,
    pub rsi: f64,
    pub timeframe_days: u32,
    pub price_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub parameters: ModelParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputData {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_points: usize,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualOutcome {
    pub actual_price: f64,
    pub observed_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: Uuid,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: PredictionKind,
    pub timeframe: Timeframe,
    pub current_price: f64,
    pub predicted_price: f64,
    pub predicted_high: f64,
    pub predicted_low: f64,
    pub predicted_trend: Trend,
    pub confidence: f64,
    pub model: ModelInfo,
    pub input_data: InputData,
    pub prediction_date: NaiveDate,
    pub target_date: NaiveDate,
    pub status: PredictionStatus,
    #[serde(default)]
    pub actual_outcome: Option<ActualOutcome>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl Prediction {
    /// Attach the observed price at the target date.
    pub fn record_outcome(
        &mut self,
        actual_price: f64,
        observed_on: NaiveDate,
    ) -> Result<(), Report<ForecastError>> {
        self.transition(PredictionStatus::Generated, PredictionStatus::OutcomeKnown)?;
        self.actual_outcome = Some(ActualOutcome {
            actual_price,
            observed_on,
        });
        Ok(())
    }

    /// Store the evaluated accuracy, rounded to 3 decimals.
    pub fn complete_evaluation(&mut self, accuracy: f64) -> Result<(), Report<ForecastError>> {
        self.transition(PredictionStatus::OutcomeKnown, PredictionStatus::Evaluated)?;
        self.accuracy = Some(round_to(accuracy, 3));
        Ok(())
    }

    fn transition(
        &mut self,
        from: PredictionStatus,
        to: PredictionStatus,
    ) -> Result<(), Report<ForecastError>> {
        if self.status != from {
            bail!(ForecastError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Trend and oscillator readings the forecast is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSignals {
    pub trend: Trend,
    pub rsi: f64,
}

impl ForecastSignals {
    /// Read SMA20, SMA50 and RSI14 from `indicators` and classify the trend
    /// against `current_price`.
    pub fn from_indicators(
        indicators: &IndicatorSet,
        current_price: f64,
    ) -> Result<Self, Report<ForecastError>> {
        let sma20 = indicators.latest(SMA_SHORT).map_err(forecast_error)?;
        let sma50 = indicators.latest(SMA_LONG).map_err(forecast_error)?;
        let rsi = indicators.latest(RSI).map_err(forecast_error)?;
        Ok(Self {
            trend: Trend::classify(current_price, sma20, sma50),
            rsi,
        })
    }
}

fn forecast_error(e: IndicatorError) -> Report<ForecastError> {
    let context = match e {
        IndicatorError::InsufficientData {
            required,
            available,
        } => ForecastError::InsufficientData {
            required,
            available,
        },
        IndicatorError::InvalidParameter { name } => ForecastError::InvalidParameter { name },
    };
    Report::new(context)
}

/// Share of net directional days among the transitions of `prices`.
///
/// Equal consecutive prices count as neither up nor down.
pub fn trend_strength(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let (mut up, mut down) = (0i64, 0i64);
    for w in prices.windows(2) {
        if w[1] > w[0] {
            up += 1;
        } else if w[1] < w[0] {
            down += 1;
        }
    }
    (up - down).abs() as f64 / (prices.len() - 1) as f64
}

/// Population std dev of the daily returns of `prices`, skipping the first
/// return (19 returns for a 20 price window).
pub fn recent_volatility(prices: &[f64]) -> f64 {
    let returns = daily_returns(prices);
    population_std_dev(returns.get(1..).unwrap_or(&[]))
}

/// `max(0, 1 - |actual - predicted| / actual)`
pub fn prediction_accuracy(predicted_price: f64, actual_price: f64) -> f64 {
    (1.0 - (actual_price - predicted_price).abs() / actual_price).max(0.0)
}

/// Heuristic price forecaster: a linear nudge of the current price from
/// trend and RSI signals, with a volatility band and a time-decayed
/// confidence.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    model_name: String,
    model_version: String,
    min_history_bars: usize,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.into(),
            model_version: DEFAULT_MODEL_VERSION.into(),
            min_history_bars: DEFAULT_MIN_HISTORY_BARS,
        }
    }
}

impl ForecastEngine {
    pub fn new(
        model_name: impl Into<String>,
        model_version: impl Into<String>,
        min_history_bars: usize,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            model_version: model_version.into(),
            min_history_bars,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Indicators [`ForecastSignals::from_indicators`] reads.
    pub fn required_indicators() -> [IndicatorRequest; 3] {
        [
            IndicatorRequest::Sma(20),
            IndicatorRequest::Sma(50),
            IndicatorRequest::Rsi(14),
        ]
    }

    pub fn generate(
        &self,
        symbol: &str,
        history: &[Bar],
        indicators: &IndicatorSet,
        timeframe: Timeframe,
        kind: PredictionKind,
        as_of: NaiveDate,
    ) -> Result<Prediction, Report<ForecastError>> {
        if history.len() < self.min_history_bars {
            bail!(ForecastError::InsufficientData {
                required: self.min_history_bars,
                available: history.len(),
            });
        }
        let (Some(first), Some(last)) = (history.first(), history.last()) else {
            bail!(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        };

        let current_price = last.close;
        let signals = ForecastSignals::from_indicators(indicators, current_price)?;

        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let recent = &closes[closes.len().saturating_sub(RECENT_WINDOW)..];
        let strength = trend_strength(recent);
        let volatility = recent_volatility(recent);

        let mut price_multiplier = 1.0;
        let mut confidence = BASE_CONFIDENCE;

        match signals.trend {
            Trend::Bullish => {
                price_multiplier += strength * TREND_MULTIPLIER_WEIGHT;
                confidence += TREND_CONFIDENCE_BUMP;
            }
            Trend::Bearish => {
                price_multiplier -= strength * TREND_MULTIPLIER_WEIGHT;
                confidence += TREND_CONFIDENCE_BUMP;
            }
            Trend::Neutral => {}
        }

        if signals.rsi < RSI_OVERSOLD {
            price_multiplier += RSI_NUDGE;
            confidence += RSI_NUDGE;
        } else if signals.rsi > RSI_OVERBOUGHT {
            price_multiplier -= RSI_NUDGE;
            confidence += RSI_NUDGE;
        }

        let timeframe_days = timeframe.days();
        let days = f64::from(timeframe_days);
        confidence *= (1.0 - days / DECAY_HORIZON_DAYS).max(MIN_TIME_DECAY);

        let predicted_price = current_price * price_multiplier;
        let price_range = current_price * volatility * (days / RANGE_SCALE_DAYS).sqrt();

        let predicted_trend = if price_multiplier > BULLISH_MULTIPLIER {
            Trend::Bullish
        } else if price_multiplier < BEARISH_MULTIPLIER {
            Trend::Bearish
        } else {
            Trend::Neutral
        };

        tracing::debug!(
            symbol,
            trend = %signals.trend,
            rsi = signals.rsi,
            strength,
            volatility,
            price_multiplier,
            "forecast signals"
        );

        Ok(Prediction {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            kind,
            timeframe,
            current_price,
            predicted_price: round_to(predicted_price, 2),
            predicted_high: round_to(predicted_price + price_range, 2),
            predicted_low: round_to(predicted_price - price_range, 2),
            predicted_trend,
            confidence: confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            model: ModelInfo {
                name: self.model_name.clone(),
                version: self.model_version.clone(),
                parameters: ModelParams {
                    trend_strength: strength,
                    volatility,
                    rsi: signals.rsi,
                    timeframe_days,
                    price_multiplier,
                },
            },
            input_data: InputData {
                start_date: first.date,
                end_date: last.date,
                data_points: history.len(),
                features: INPUT_FEATURES.iter().map(|f| f.to_string()).collect(),
            },
            prediction_date: as_of,
            target_date: as_of + Days::new(u64::from(timeframe_days)),
            status: PredictionStatus::Generated,
            actual_outcome: None,
            accuracy: None,
        })
    }

    /// Accuracy of `prediction` against the realised price.
    pub fn evaluate(
        &self,
        prediction: &Prediction,
        actual_price: f64,
    ) -> Result<f64, Report<ForecastError>> {
        if !(actual_price > 0.0) {
            bail!(ForecastError::InvalidParameter {
                name: format!("actual_price must be > 0, got {actual_price}"),
            });
        }
        Ok(prediction_accuracy(prediction.predicted_price, actual_price))
    }
}
