use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, close_prices, ensure_len, ensure_period};
use crate::model::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct BandsOutput {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// SMA middle band with population standard deviation envelopes.
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period)?;
        if std_dev_multiplier <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }

    pub fn calculate_bands(&self, bars: &[Bar]) -> Result<BandsOutput, Report<IndicatorError>> {
        let prices = close_prices(bars);
        ensure_len(self.period, prices.len())?;

        let middle = Sma::new(self.period)?.calculate_prices(&prices)?;
        let mut upper = Vec::with_capacity(middle.len());
        let mut lower = Vec::with_capacity(middle.len());

        for (window, &mid) in prices.windows(self.period).zip(middle.iter()) {
            let variance =
                window.iter().map(|&p| (p - mid).powi(2)).sum::<f64>() / self.period as f64;
            let std_dev = variance.sqrt();
            upper.push(mid + self.std_dev_multiplier * std_dev);
            lower.push(mid - self.std_dev_multiplier * std_dev);
        }

        Ok(BandsOutput {
            upper,
            middle,
            lower,
        })
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> String {
        "bollinger_middle".into()
    }

    fn required_bars(&self) -> usize {
        self.period
    }

    /// Returns middle band (SMA) values only.
    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        Ok(self.calculate_bands(bars)?.middle)
    }
}
