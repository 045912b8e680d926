pub mod adx;
pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod oscillator;
pub mod rsi;
pub mod volume;

use std::collections::BTreeMap;

use error_stack::Report;

use crate::error::IndicatorError;
use crate::model::Bar;

use adx::Adx;
use bollinger::BollingerBands;
use ma::{Ema, Sma};
use macd::Macd;
use oscillator::{Stochastic, WilliamsR};
use rsi::Rsi;
use volume::{Mfi, Vwap};

/// A technical analysis indicator that operates on a slice of daily bars.
///
/// Bars must be in ascending chronological order (oldest first).
pub trait Indicator: Send + Sync {
    /// Unique name of this indicator (e.g., "rsi_14", "sma_20").
    fn name(&self) -> String;

    /// Minimum number of bars required to produce at least one output value.
    fn required_bars(&self) -> usize;

    /// Calculate indicator values from bars.
    ///
    /// The last value always corresponds to the last input bar unless the
    /// indicator documents otherwise. Fewer bars than [`Indicator::required_bars`]
    /// is an `InsufficientData` error, never an empty vector.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>>;
}

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

pub fn high_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.high).collect()
}

pub fn low_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.low).collect()
}

/// Extract volumes from a slice of bars.
pub fn volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume as f64).collect()
}

pub(crate) fn ensure_period(period: usize) -> Result<(), Report<IndicatorError>> {
    if period == 0 {
        return Err(Report::new(IndicatorError::InvalidParameter {
            name: "period must be > 0".into(),
        }));
    }
    Ok(())
}

pub(crate) fn ensure_len(required: usize, available: usize) -> Result<(), Report<IndicatorError>> {
    if available < required {
        return Err(Report::new(IndicatorError::InsufficientData {
            required,
            available,
        }));
    }
    Ok(())
}

/// Indicators a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorRequest {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    /// Produces `macd`, `macd_signal` and `macd_histogram`.
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// Produces `bollinger_upper`, `bollinger_middle` and `bollinger_lower`.
    Bollinger {
        period: usize,
        multiplier: f64,
    },
    Stochastic(usize),
    WilliamsR(usize),
    Adx(usize),
    Mfi(usize),
    Vwap,
}

impl IndicatorRequest {
    /// Key of the (first) entry this request produces in an [`IndicatorSet`].
    pub fn name(&self) -> String {
        match self {
            Self::Sma(p) => format!("sma_{p}"),
            Self::Ema(p) => format!("ema_{p}"),
            Self::Rsi(p) => format!("rsi_{p}"),
            Self::Macd { .. } => "macd".into(),
            Self::Bollinger { .. } => "bollinger_middle".into(),
            Self::Stochastic(p) => format!("stochastic_k_{p}"),
            Self::WilliamsR(p) => format!("williams_r_{p}"),
            Self::Adx(p) => format!("adx_{p}"),
            Self::Mfi(p) => format!("mfi_{p}"),
            Self::Vwap => "vwap".into(),
        }
    }
}

/// Named indicator outputs for one series.
///
/// Each entry is computed independently: one indicator running out of data
/// leaves its own entry as an error and every other entry intact.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    values: BTreeMap<String, Result<Vec<f64>, IndicatorError>>,
}

impl IndicatorSet {
    pub fn compute(bars: &[Bar], requests: &[IndicatorRequest]) -> Self {
        let mut set = Self::default();
        for request in requests {
            set.compute_one(bars, *request);
        }
        set
    }

    fn compute_one(&mut self, bars: &[Bar], request: IndicatorRequest) {
        let name = request.name();
        match request {
            IndicatorRequest::Sma(period) => self.insert_single(name, Sma::new(period), bars),
            IndicatorRequest::Ema(period) => self.insert_single(name, Ema::new(period), bars),
            IndicatorRequest::Rsi(period) => self.insert_single(name, Rsi::new(period), bars),
            IndicatorRequest::Stochastic(period) => {
                self.insert_single(name, Stochastic::new(period), bars)
            }
            IndicatorRequest::WilliamsR(period) => {
                self.insert_single(name, WilliamsR::new(period), bars)
            }
            IndicatorRequest::Adx(period) => self.insert_single(name, Adx::new(period), bars),
            IndicatorRequest::Mfi(period) => self.insert_single(name, Mfi::new(period), bars),
            IndicatorRequest::Vwap => self.insert_single(name, Ok(Vwap), bars),
            IndicatorRequest::Macd { fast, slow, signal } => {
                let output = Macd::new(fast, slow, signal).and_then(|m| m.calculate_full(bars));
                match output {
                    Ok(out) => {
                        self.insert("macd", Ok(out.macd));
                        self.insert("macd_signal", Ok(out.signal));
                        self.insert("macd_histogram", Ok(out.histogram));
                    }
                    Err(report) => {
                        tracing::debug!(error = %report.current_context(), "macd skipped");
                        for name in ["macd", "macd_signal", "macd_histogram"] {
                            self.insert(name, Err(report.current_context().clone()));
                        }
                    }
                }
            }
            IndicatorRequest::Bollinger { period, multiplier } => {
                let output = BollingerBands::new(period, multiplier)
                    .and_then(|b| b.calculate_bands(bars));
                match output {
                    Ok(out) => {
                        self.insert("bollinger_upper", Ok(out.upper));
                        self.insert("bollinger_middle", Ok(out.middle));
                        self.insert("bollinger_lower", Ok(out.lower));
                    }
                    Err(report) => {
                        tracing::debug!(error = %report.current_context(), "bollinger skipped");
                        for name in ["bollinger_upper", "bollinger_middle", "bollinger_lower"] {
                            self.insert(name, Err(report.current_context().clone()));
                        }
                    }
                }
            }
        }
    }

    /// Keyed by [`Indicator::name`]; `fallback` only names a construction
    /// failure.
    fn insert_single<I: Indicator>(
        &mut self,
        fallback: String,
        indicator: Result<I, Report<IndicatorError>>,
        bars: &[Bar],
    ) {
        let (name, result) = match indicator {
            Ok(i) => (i.name(), i.calculate(bars)),
            Err(report) => (fallback, Err(report)),
        };
        let result = result.map_err(|report| {
            tracing::debug!(indicator = %name, error = %report.current_context(), "indicator skipped");
            report.current_context().clone()
        });
        self.values.insert(name, result);
    }

    fn insert(&mut self, name: &str, value: Result<Vec<f64>, IndicatorError>) {
        self.values.insert(name.to_string(), value);
    }

    /// Full aligned series for `name`.
    pub fn series(&self, name: &str) -> Result<&[f64], IndicatorError> {
        match self.values.get(name) {
            Some(Ok(values)) => Ok(values),
            Some(Err(e)) => Err(e.clone()),
            None => Err(IndicatorError::InvalidParameter {
                name: format!("indicator not requested: {name}"),
            }),
        }
    }

    /// Most recent value for `name`.
    pub fn latest(&self, name: &str) -> Result<f64, IndicatorError> {
        let values = self.series(name)?;
        values
            .last()
            .copied()
            .ok_or(IndicatorError::InsufficientData {
                required: 1,
                available: 0,
            })
    }
}
