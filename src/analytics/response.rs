//! Response shapes assembled by the facade.
//!
//! Field names serialize in camelCase. Any part that can fail on its own is
//! a [`Field`], so one missing indicator reports `{ "error": "..." }` in its
//! slot while the rest of the response carries numbers.

use std::fmt::Display;

use serde::Serialize;

use crate::forecast::Prediction;
use crate::indicator::volume::VolumeProfile;
use crate::model::Trend;
use crate::pivot::{Level, PivotPoint};
use crate::volatility::{CorrelationStrength, VolatilityReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field<T> {
    Value(T),
    Error { error: String },
}

impl<T> Field<T> {
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(e) => Self::Error {
                error: e.to_string(),
            },
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovingAverages {
    pub sma20: Field<f64>,
    pub sma50: Field<f64>,
    pub ema12: Field<f64>,
    pub ema26: Field<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSummary {
    pub macd: Field<f64>,
    pub signal: Field<f64>,
    pub histogram: Field<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandsSummary {
    pub upper: Field<f64>,
    pub middle: Field<f64>,
    pub lower: Field<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Oscillators {
    pub stochastic_k: Field<f64>,
    pub williams_r: Field<f64>,
    pub adx: Field<f64>,
    pub mfi: Field<f64>,
    pub vwap: Field<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSummary {
    pub symbol: String,
    pub period_days: u32,
    pub data_points: usize,
    pub current_price: f64,
    pub moving_averages: MovingAverages,
    pub rsi: Field<f64>,
    pub macd: MacdSummary,
    pub bollinger_bands: BandsSummary,
    pub trend: Field<Trend>,
    pub volume: VolumeProfile,
    pub oscillators: Oscillators,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilitySummary {
    pub symbol: String,
    pub period_days: u32,
    pub data_points: usize,
    #[serde(flatten)]
    pub report: VolatilityReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotSummary {
    pub highs: Vec<PivotPoint>,
    pub lows: Vec<PivotPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsReport {
    pub symbol: String,
    pub period_days: u32,
    pub current_price: f64,
    pub resistance: Vec<Level>,
    pub support: Vec<Level>,
    pub pivot_points: PivotSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEntry {
    pub symbol: String,
    pub correlation: f64,
    pub strength: CorrelationStrength,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationReport {
    pub symbol: String,
    pub period_days: u32,
    pub correlations: Vec<CorrelationEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionList {
    pub symbol: String,
    pub predictions: Vec<Prediction>,
    pub count: usize,
}

/// Combined per-symbol overview; every section stands on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub symbol: String,
    pub technical: Field<TechnicalSummary>,
    pub volatility: Field<VolatilitySummary>,
    pub levels: Field<LevelsReport>,
    pub predictions: Field<Vec<Prediction>>,
}
