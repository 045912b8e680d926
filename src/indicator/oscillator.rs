//! Range oscillators: Stochastic %K and Williams %R.
//!
//! Both place the close inside the high/low range of a trailing window. A
//! window whose highest high equals its lowest low has no range; those
//! windows yield the neutral mid value instead of dividing by zero.

use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_len, ensure_period};
use crate::model::Bar;

const STOCHASTIC_NEUTRAL: f64 = 50.0;
const WILLIAMS_NEUTRAL: f64 = -50.0;

/// `(highest high, lowest low, last close)` of every trailing window of `period` bars.
fn window_ranges(bars: &[Bar], period: usize) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
    bars.windows(period).map(|w| {
        let highest = w.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = w.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let close = w[w.len() - 1].close;
        (highest, lowest, close)
    })
}

/// Stochastic %K.
pub struct Stochastic {
    period: usize,
}

impl Stochastic {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period)?;
        Ok(Self { period })
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> String {
        format!("stochastic_k_{}", self.period)
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(self.period, bars.len())?;
        Ok(window_ranges(bars, self.period)
            .map(|(highest, lowest, close)| {
                if highest == lowest {
                    STOCHASTIC_NEUTRAL
                } else {
                    (close - lowest) / (highest - lowest) * 100.0
                }
            })
            .collect())
    }
}

/// Williams %R, in `[-100, 0]`.
pub struct WilliamsR {
    period: usize,
}

impl WilliamsR {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period)?;
        Ok(Self { period })
    }
}

impl Indicator for WilliamsR {
    fn name(&self) -> String {
        format!("williams_r_{}", self.period)
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(self.period, bars.len())?;
        Ok(window_ranges(bars, self.period)
            .map(|(highest, lowest, close)| {
                if highest == lowest {
                    WILLIAMS_NEUTRAL
                } else {
                    -100.0 * (highest - close) / (highest - lowest)
                }
            })
            .collect())
    }
}
