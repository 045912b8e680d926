use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;
use crate::indicator::{Indicator, close_prices, ensure_len};
use crate::model::Bar;

/// MACD line, signal line and histogram.
///
/// Both EMAs are seeded at the start of the series, so the MACD line pairs
/// `fast[i]` with `slow[i]` from the front and is as long as the slow EMA.
/// The histogram pairs `macd[i]` with `signal[i]` the same way. Neither the
/// MACD line nor the histogram ends at the last input bar.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        if fast_period == 0 || slow_period == 0 || signal_period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "all periods must be > 0".into(),
            });
        }
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
        })
    }

    pub fn calculate_full(&self, bars: &[Bar]) -> Result<MacdOutput, Report<IndicatorError>> {
        self.calculate_prices(&close_prices(bars))
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Result<MacdOutput, Report<IndicatorError>> {
        ensure_len(self.required_bars(), prices.len())?;

        let fast_ema = Ema::new(self.fast_period)?.calculate_prices(prices)?;
        let slow_ema = Ema::new(self.slow_period)?.calculate_prices(prices)?;

        let macd: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal = Ema::new(self.signal_period)?.calculate_prices(&macd)?;
        let histogram: Vec<f64> = macd
            .iter()
            .zip(signal.iter())
            .map(|(m, s)| m - s)
            .collect();

        Ok(MacdOutput {
            macd,
            signal,
            histogram,
        })
    }
}

impl Indicator for Macd {
    fn name(&self) -> String {
        "macd".into()
    }

    /// Slow EMA warm-up plus enough MACD values to seed the signal EMA.
    fn required_bars(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }

    /// Returns MACD line values only.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        Ok(self.calculate_full(bars)?.macd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::{bars_from_closes, wave};

    fn standard() -> Macd {
        Macd::new(12, 26, 9).unwrap()
    }

    #[test]
    fn macd_invalid_fast_ge_slow() {
        assert!(Macd::new(26, 12, 9).is_err());
    }

    #[test]
    fn macd_period_zero_invalid() {
        assert!(Macd::new(0, 26, 9).is_err());
    }

    #[test]
    fn macd_insufficient_data() {
        let macd = standard();
        assert!(macd.calculate(&bars_from_closes(&[1.0; 33])).is_err());
        let out = macd.calculate_full(&bars_from_closes(&[1.0; 34])).unwrap();
        assert_eq!(out.signal.len(), 1);
    }

    #[test]
    fn macd_lengths_follow_front_alignment() {
        let closes = wave(60, 100.0);
        let out = standard().calculate_prices(&closes).unwrap();
        assert_eq!(out.macd.len(), 60 - 26 + 1);
        assert_eq!(out.signal.len(), out.macd.len() - 9 + 1);
        assert_eq!(out.histogram.len(), out.signal.len());
    }

    #[test]
    fn macd_line_pairs_emas_from_the_front() {
        let closes = wave(50, 30.0);
        let out = standard().calculate_prices(&closes).unwrap();
        let ema12 = Ema::new(12).unwrap().calculate_prices(&closes).unwrap();
        let ema26 = Ema::new(26).unwrap().calculate_prices(&closes).unwrap();
        for (i, m) in out.macd.iter().enumerate() {
            assert!((m - (ema12[i] - ema26[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn signal_is_ema_of_macd_line() {
        let closes = wave(70, 80.0);
        let out = standard().calculate_prices(&closes).unwrap();
        let independent = Ema::new(9).unwrap().calculate_prices(&out.macd).unwrap();
        assert_eq!(out.signal, independent);
        for i in 0..out.histogram.len() {
            assert!((out.histogram[i] - (out.macd[i] - out.signal[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_flat_prices_returns_zero() {
        let out = Macd::new(3, 5, 3)
            .unwrap()
            .calculate_full(&bars_from_closes(&[10.0; 10]))
            .unwrap();
        for v in out.macd.iter().chain(&out.signal).chain(&out.histogram) {
            assert!(v.abs() < 1e-9, "expected 0 for flat prices, got {v}");
        }
    }
}
