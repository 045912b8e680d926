// Directional movement index.
//
//   +DM = up move when it beats the down move and is positive, else 0
//   -DM = down move when it beats the up move and is positive, else 0
//   TR  = max(H - L, |H - prevC|, |L - prevC|)
//
// Each window of `period` transitions takes the plain mean of TR, +DM and
// -DM (no Wilder smoothing), then
//
//   +DI = avg(+DM) / avg(TR) * 100,  -DI = avg(-DM) / avg(TR) * 100
//   DX  = |+DI - -DI| / (+DI + -DI) * 100
//
// The reported value is this per-window DX.

use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_len, ensure_period};
use crate::model::Bar;

pub struct Adx {
    period: usize,
}

impl Adx {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period)?;
        Ok(Self { period })
    }
}

impl Indicator for Adx {
    fn name(&self) -> String {
        format!("adx_{}", self.period)
    }

    fn required_bars(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[Bar]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(self.required_bars(), bars.len())?;

        let mut tr = Vec::with_capacity(bars.len() - 1);
        let mut plus_dm = Vec::with_capacity(bars.len() - 1);
        let mut minus_dm = Vec::with_capacity(bars.len() - 1);

        for pair in bars.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let up_move = cur.high - prev.high;
            let down_move = prev.low - cur.low;

            plus_dm.push(if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            });
            minus_dm.push(if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            });
            tr.push(
                (cur.high - cur.low)
                    .max((cur.high - prev.close).abs())
                    .max((cur.low - prev.close).abs()),
            );
        }

        let period = self.period as f64;
        let mean = |w: &[f64]| w.iter().sum::<f64>() / period;

        Ok(tr
            .windows(self.period)
            .zip(plus_dm.windows(self.period))
            .zip(minus_dm.windows(self.period))
            .map(|((tr_w, plus_w), minus_w)| {
                let avg_tr = mean(tr_w);
                let (plus_di, minus_di) = if avg_tr == 0.0 {
                    (0.0, 0.0)
                } else {
                    (mean(plus_w) / avg_tr * 100.0, mean(minus_w) / avg_tr * 100.0)
                };
                let di_sum = plus_di + minus_di;
                if di_sum == 0.0 {
                    0.0
                } else {
                    (plus_di - minus_di).abs() / di_sum * 100.0
                }
            })
            .collect())
    }
}
