use std::fmt;

use error_stack::Report;
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::ensure_len;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Overlapping returns a pair needs, exclusive, before it is correlated.
pub const MIN_CORRELATION_OVERLAP: usize = 10;

/// Day-over-day simple returns; one fewer than the input.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`). Empty input is 0.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityClass {
    Low,
    Medium,
    High,
}

impl VolatilityClass {
    /// Bucket an annualized volatility.
    pub fn from_annualized(annualized: f64) -> Self {
        if annualized < 0.2 {
            Self::Low
        } else if annualized < 0.4 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl fmt::Display for VolatilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Coarse percentile label for a daily volatility.
pub fn volatility_percentile(daily: f64) -> &'static str {
    if daily < 0.01 {
        "Low (< 25th percentile)"
    } else if daily < 0.02 {
        "Medium (25-75th percentile)"
    } else {
        "High (> 75th percentile)"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityReport {
    pub daily: f64,
    pub annualized: f64,
    pub percentile: &'static str,
    pub classification: VolatilityClass,
}

/// Population std dev of daily returns, annualized with `sqrt(252)`.
pub fn historical_volatility(closes: &[f64]) -> Result<VolatilityReport, Report<IndicatorError>> {
    ensure_len(2, closes.len())?;
    let daily = population_std_dev(&daily_returns(closes));
    let annualized = daily * TRADING_DAYS_PER_YEAR.sqrt();
    Ok(VolatilityReport {
        daily,
        annualized,
        percentile: volatility_percentile(daily),
        classification: VolatilityClass::from_annualized(annualized),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        let abs = r.abs();
        if abs < 0.3 {
            Self::Weak
        } else if abs < 0.7 {
            Self::Moderate
        } else {
            Self::Strong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairCorrelation {
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    pub data_points: usize,
}

/// Pearson correlation over the most recent `min(len a, len b)` points.
///
/// Returns `None` unless the overlap exceeds [`MIN_CORRELATION_OVERLAP`].
/// A side with zero variance correlates at 0.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<PairCorrelation> {
    let n = a.len().min(b.len());
    if n <= MIN_CORRELATION_OVERLAP {
        return None;
    }

    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    let (mean_a, mean_b) = (mean(a), mean(b));

    let mut num = 0.0;
    let mut denom_a = 0.0;
    let mut denom_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        num += da * db;
        denom_a += da * da;
        denom_b += db * db;
    }

    let denom = (denom_a * denom_b).sqrt();
    let coefficient = if denom > 0.0 {
        (num / denom).clamp(-1.0, 1.0)
    } else {
        0.0
    };

    Some(PairCorrelation {
        coefficient,
        strength: CorrelationStrength::from_coefficient(coefficient),
        data_points: n,
    })
}
