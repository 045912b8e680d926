use error_stack::Report;
use serde::Serialize;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_len, ensure_period, volumes};
use crate::model::Bar;

/// Money ratio used when a window has no negative flow at all.
const SATURATED_MONEY_RATIO: f64 = 100.0;

/// Money Flow Index.
///
/// A bar's raw flow counts as positive when its typical price is above the
/// previous bar's, otherwise (ties included) as negative.
pub struct Mfi {
    period: usize,
}

impl Mfi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period)?;
        Ok(Self { period })
    }
}

impl Indicator for Mfi {
    fn name(&self) -> String {
        format!("mfi_{}", self.period)
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(self.required_bars(), bars.len())?;

        let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
        // (positive, negative) flow of each transition into bar i + 1
        let flows: Vec<(f64, f64)> = typical
            .windows(2)
            .zip(&bars[1..])
            .map(|(tp, bar)| {
                let raw = tp[1] * bar.volume as f64;
                if tp[1] > tp[0] { (raw, 0.0) } else { (0.0, raw) }
            })
            .collect();

        Ok(flows
            .windows(self.period)
            .map(|w| {
                let positive: f64 = w.iter().map(|f| f.0).sum();
                let negative: f64 = w.iter().map(|f| f.1).sum();
                let money_ratio = if negative == 0.0 {
                    SATURATED_MONEY_RATIO
                } else {
                    positive / negative
                };
                100.0 - 100.0 / (1.0 + money_ratio)
            })
            .collect())
    }
}

/// Cumulative volume-weighted average of typical price from the first bar of
/// the series; no session resets.
pub struct Vwap;

impl Indicator for Vwap {
    fn name(&self) -> String {
        "vwap".into()
    }

    fn required_bars(&self) -> usize {
        1
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(1, bars.len())?;

        let mut cum_volume = 0.0;
        let mut cum_pv = 0.0;
        Ok(bars
            .iter()
            .map(|bar| {
                let tp = bar.typical_price();
                cum_pv += tp * bar.volume as f64;
                cum_volume += bar.volume as f64;
                // zero-volume prefix: nothing to weight by yet
                if cum_volume == 0.0 { tp } else { cum_pv / cum_volume }
            })
            .collect())
    }
}

/// Last volume against the mean volume of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeProfile {
    pub current: f64,
    pub average: f64,
    pub relative: f64,
}

impl VolumeProfile {
    pub fn from_bars(bars: &[Bar]) -> Result<Self, Report<IndicatorError>> {
        ensure_len(1, bars.len())?;
        let vols = volumes(bars);
        let current = vols[vols.len() - 1];
        let average = vols.iter().sum::<f64>() / vols.len() as f64;
        let relative = if average == 0.0 { 0.0 } else { current / average };
        Ok(Self {
            current,
            average,
            relative,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::bars_with_volumes;

    #[test]
    fn mfi_no_negative_flow_saturates() {
        let mfi = Mfi::new(3).unwrap();
        let bars = bars_with_volumes(&[
            (10.0, 10.0, 10.0, 100),
            (11.0, 11.0, 11.0, 100),
            (12.0, 12.0, 12.0, 100),
            (13.0, 13.0, 13.0, 100),
        ]);
        let values = mfi.calculate(&bars).unwrap();
        assert_eq!(values.len(), 1);
        // 100 - 100 / 101
        assert!((values[0] - (100.0 - 100.0 / 101.0)).abs() < 1e-9);
    }

    #[test]
    fn mfi_balanced_flow_is_fifty() {
        let mfi = Mfi::new(2).unwrap();
        let bars = bars_with_volumes(&[
            (10.0, 10.0, 10.0, 1),
            (12.0, 12.0, 12.0, 10),
            (10.0, 10.0, 10.0, 12),
        ]);
        // positive 12 * 10 = 120, negative 10 * 12 = 120
        let values = mfi.calculate(&bars).unwrap();
        assert!((values[0] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mfi_insufficient_data() {
        let mfi = Mfi::new(14).unwrap();
        let bars = bars_with_volumes(&[(1.0, 1.0, 1.0, 1); 14]);
        assert!(mfi.calculate(&bars).is_err());
    }

    #[test]
    fn vwap_is_cumulative() {
        let bars = bars_with_volumes(&[(10.0, 10.0, 10.0, 1), (20.0, 20.0, 20.0, 3)]);
        let values = Vwap.calculate(&bars).unwrap();
        assert_eq!(values.len(), 2);
        assert!((values[0] - 10.0).abs() < 1e-9);
        // (10 * 1 + 20 * 3) / 4
        assert!((values[1] - 17.5).abs() < 1e-9);
    }

    #[test]
    fn vwap_zero_volume_prefix_uses_typical_price() {
        let bars = bars_with_volumes(&[(12.0, 9.0, 9.0, 0), (10.0, 10.0, 10.0, 5)]);
        let values = Vwap.calculate(&bars).unwrap();
        assert!((values[0] - 10.0).abs() < 1e-9);
        assert!((values[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn vwap_empty_series_fails() {
        assert!(Vwap.calculate(&[]).is_err());
    }

    #[test]
    fn volume_profile_relative() {
        let bars = bars_with_volumes(&[
            (1.0, 1.0, 1.0, 100),
            (1.0, 1.0, 1.0, 100),
            (1.0, 1.0, 1.0, 400),
        ]);
        let profile = VolumeProfile::from_bars(&bars).unwrap();
        assert!((profile.average - 200.0).abs() < 1e-9);
        assert!((profile.relative - 2.0).abs() < 1e-9);
    }
}
