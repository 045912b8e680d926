use std::fmt;

use error_stack::{Report, bail};
use serde::Serialize;

use crate::error::IndicatorError;

pub const DEFAULT_WINDOW_RADIUS: usize = 5;
pub const DEFAULT_TOLERANCE: f64 = 0.02;

/// How many levels of each kind the nearest-level queries return.
const NEAREST_LEVELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotKind {
    High,
    Low,
}

/// A local extremum of the source series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PivotPoint {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Support,
    Resistance,
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Resistance => write!(f, "resistance"),
        }
    }
}

/// A price band where several pivots concentrated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub price: f64,
    pub strength: usize,
    #[serde(rename = "type")]
    pub kind: LevelKind,
}

/// Finds pivots and groups them into support/resistance levels.
#[derive(Debug, Clone, Copy)]
pub struct PivotEngine {
    window_radius: usize,
    tolerance: f64,
}

impl Default for PivotEngine {
    fn default() -> Self {
        Self {
            window_radius: DEFAULT_WINDOW_RADIUS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl PivotEngine {
    pub fn new(window_radius: usize, tolerance: f64) -> Result<Self, Report<IndicatorError>> {
        if window_radius == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "window_radius must be > 0".into(),
            });
        }
        if !(tolerance > 0.0 && tolerance < 1.0) {
            bail!(IndicatorError::InvalidParameter {
                name: format!("tolerance must be in (0, 1), got {tolerance}"),
            });
        }
        Ok(Self {
            window_radius,
            tolerance,
        })
    }

    /// Bars that are extreme over `window_radius` neighbours on both sides.
    ///
    /// Ties count: a high pivot only needs to be `>=` each neighbour, a low
    /// pivot `<=`. Bars closer than `window_radius` to either end are never
    /// pivots. Output is in index order.
    pub fn find_pivots(&self, values: &[f64], kind: PivotKind) -> Vec<PivotPoint> {
        let r = self.window_radius;
        if values.len() <= 2 * r {
            return Vec::new();
        }

        (r..values.len() - r)
            .filter(|&i| {
                let current = values[i];
                let neighbours = values[i - r..i].iter().chain(&values[i + 1..=i + r]);
                match kind {
                    PivotKind::High => neighbours.into_iter().all(|&p| p <= current),
                    PivotKind::Low => neighbours.into_iter().all(|&p| p >= current),
                }
            })
            .map(|index| PivotPoint {
                index,
                price: values[index],
            })
            .collect()
    }

    /// Greedy single pass grouping of pivot prices.
    ///
    /// Each pivot joins the first cluster whose first member is within
    /// `tolerance` (relative to that first member), otherwise it opens a new
    /// cluster. The result depends on pivot order. Levels come back sorted by
    /// strength, strongest first; equal strengths keep cluster creation order.
    pub fn cluster_levels(&self, pivots: &[PivotPoint], kind: LevelKind) -> Vec<Level> {
        let mut clusters: Vec<Vec<f64>> = Vec::new();

        for pivot in pivots {
            let price = pivot.price;
            let home = clusters
                .iter_mut()
                .find(|c| (price - c[0]).abs() / c[0] <= self.tolerance);
            match home {
                Some(cluster) => cluster.push(price),
                None => clusters.push(vec![price]),
            }
        }

        let mut levels: Vec<Level> = clusters
            .into_iter()
            .map(|members| Level {
                price: members.iter().sum::<f64>() / members.len() as f64,
                strength: members.len(),
                kind,
            })
            .collect();
        // stable sort keeps first-seen order among ties
        levels.sort_by(|a, b| b.strength.cmp(&a.strength));
        levels
    }
}

/// Up to three levels above `current_price`, nearest first.
pub fn nearest_resistance(levels: &[Level], current_price: f64) -> Vec<Level> {
    let mut above: Vec<Level> = levels
        .iter()
        .filter(|l| l.price > current_price)
        .cloned()
        .collect();
    above.sort_by(|a, b| a.price.total_cmp(&b.price));
    above.truncate(NEAREST_LEVELS);
    above
}

/// Up to three levels below `current_price`, nearest (highest) first.
pub fn nearest_support(levels: &[Level], current_price: f64) -> Vec<Level> {
    let mut below: Vec<Level> = levels
        .iter()
        .filter(|l| l.price < current_price)
        .cloned()
        .collect();
    below.sort_by(|a, b| b.price.total_cmp(&a.price));
    below.truncate(NEAREST_LEVELS);
    below
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pivots(prices: &[f64]) -> Vec<PivotPoint> {
        prices
            .iter()
            .enumerate()
            .map(|(index, &price)| PivotPoint { index, price })
            .collect()
    }

    fn level(price: f64, strength: usize, kind: LevelKind) -> Level {
        Level {
            price,
            strength,
            kind,
        }
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(PivotEngine::new(0, 0.02).is_err());
        assert!(PivotEngine::new(5, 0.0).is_err());
        assert!(PivotEngine::new(5, 1.5).is_err());
        assert!(PivotEngine::new(5, f64::NAN).is_err());
    }

    #[test]
    fn finds_single_peak_and_trough() {
        let engine = PivotEngine::new(2, 0.02).unwrap();
        let values = [1.0, 2.0, 5.0, 2.0, 1.0, 0.5, 1.0, 2.0];
        let highs = engine.find_pivots(&values, PivotKind::High);
        assert_eq!(highs, vec![PivotPoint { index: 2, price: 5.0 }]);
        let lows = engine.find_pivots(&values, PivotKind::Low);
        assert_eq!(lows, vec![PivotPoint { index: 5, price: 0.5 }]);
    }

    #[test]
    fn ties_count_as_pivots() {
        let engine = PivotEngine::new(1, 0.02).unwrap();
        let values = [1.0, 3.0, 3.0, 1.0];
        let highs = engine.find_pivots(&values, PivotKind::High);
        assert_eq!(highs.len(), 2);
        // a flat series is all pivots away from the edges
        let flat = [2.0; 6];
        assert_eq!(engine.find_pivots(&flat, PivotKind::Low).len(), 4);
    }

    #[test]
    fn edges_are_never_pivots() {
        let engine = PivotEngine::default();
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(engine.find_pivots(&values, PivotKind::High).is_empty());
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!(engine.find_pivots(&values, PivotKind::High).is_empty());
    }

    #[test]
    fn clusters_nearby_prices() {
        let engine = PivotEngine::default();
        let levels = engine.cluster_levels(&pivots(&[100.0, 101.0, 150.0]), LevelKind::Support);
        assert_eq!(levels.len(), 2);
        assert!((levels[0].price - 100.5).abs() < 1e-9);
        assert_eq!(levels[0].strength, 2);
        assert!((levels[1].price - 150.0).abs() < 1e-9);
        assert_eq!(levels[1].strength, 1);
    }

    #[test]
    fn clustering_compares_against_first_member_only() {
        let engine = PivotEngine::default();
        // 101.9 is within 2% of 100, 103.5 is within 2% of 101.9 but not of 100
        let forward = engine.cluster_levels(&pivots(&[100.0, 101.9, 103.5]), LevelKind::Resistance);
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].strength, 2);

        // reversed order groups differently
        let reversed =
            engine.cluster_levels(&pivots(&[103.5, 101.9, 100.0]), LevelKind::Resistance);
        assert_eq!(reversed.len(), 2);
        assert!((reversed[0].price - (103.5 + 101.9) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn clustering_is_deterministic() {
        let engine = PivotEngine::default();
        let input = pivots(&[50.0, 70.0, 50.5, 71.0, 49.8, 90.0]);
        let a = engine.cluster_levels(&input, LevelKind::Support);
        let b = engine.cluster_levels(&input, LevelKind::Support);
        assert_eq!(a, b);
        assert_eq!(a[0].strength, 3);
    }

    #[test]
    fn nearest_levels_around_price() {
        let levels = vec![
            level(90.0, 3, LevelKind::Support),
            level(120.0, 2, LevelKind::Resistance),
            level(105.0, 2, LevelKind::Resistance),
            level(95.0, 1, LevelKind::Support),
            level(80.0, 1, LevelKind::Support),
            level(70.0, 1, LevelKind::Support),
            level(110.0, 1, LevelKind::Resistance),
            level(130.0, 1, LevelKind::Resistance),
        ];
        let resistance = nearest_resistance(&levels, 100.0);
        let prices: Vec<f64> = resistance.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![105.0, 110.0, 120.0]);

        let support = nearest_support(&levels, 100.0);
        let prices: Vec<f64> = support.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![95.0, 90.0, 80.0]);
    }

    #[test]
    fn level_serializes_type_field() {
        let json = serde_json::to_value(level(10.0, 2, LevelKind::Support)).unwrap();
        assert_eq!(json["type"], "support");
        assert_eq!(json["strength"], 2);
    }
}
