use std::collections::BTreeMap;

use serde::Serialize;

use crate::forecast::{Prediction, PredictionStatus, round_to};
use crate::model::Timeframe;

pub const DEFAULT_LIMIT: usize = 100;

/// Which evaluated predictions go into an accuracy report.
#[derive(Debug, Clone)]
pub struct AccuracyFilter {
    pub model: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub limit: usize,
}

impl Default for AccuracyFilter {
    fn default() -> Self {
        Self {
            model: None,
            timeframe: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl AccuracyFilter {
    /// Evaluated predictions matching the filter, most recent first, capped
    /// at `limit`.
    pub fn select<'a>(&self, predictions: &'a [Prediction]) -> Vec<&'a Prediction> {
        let mut selected: Vec<&Prediction> = predictions
            .iter()
            .filter(|p| p.status == PredictionStatus::Evaluated)
            .filter(|p| self.model.as_deref().is_none_or(|m| p.model.name == m))
            .filter(|p| self.timeframe.is_none_or(|t| p.timeframe == t))
            .collect();
        selected.sort_by(|a, b| b.prediction_date.cmp(&a.prediction_date));
        selected.truncate(self.limit);
        selected
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupAccuracy {
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetrics {
    pub average_accuracy: f64,
    pub total_predictions: usize,
    pub accuracy_by_timeframe: BTreeMap<String, GroupAccuracy>,
    pub accuracy_by_type: BTreeMap<String, GroupAccuracy>,
}

fn group_mean(values: &[f64]) -> GroupAccuracy {
    let average = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    };
    GroupAccuracy {
        average: round_to(average, 3),
        count: values.len(),
    }
}

/// Aggregate accuracy over `predictions`.
///
/// `total_predictions` counts every input. Predictions without an accuracy
/// still create their group key but do not count towards any average.
pub fn accuracy_metrics<'a, I>(predictions: I) -> AccuracyMetrics
where
    I: IntoIterator<Item = &'a Prediction>,
{
    let mut total = 0;
    let mut all = Vec::new();
    let mut by_timeframe: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut by_type: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for p in predictions {
        total += 1;
        let timeframe = by_timeframe.entry(p.timeframe.to_string()).or_default();
        let kind = by_type.entry(p.kind.to_string()).or_default();
        if let Some(accuracy) = p.accuracy {
            all.push(accuracy);
            timeframe.push(accuracy);
            kind.push(accuracy);
        }
    }

    let overall = group_mean(&all);
    AccuracyMetrics {
        average_accuracy: overall.average,
        total_predictions: total,
        accuracy_by_timeframe: by_timeframe
            .into_iter()
            .map(|(k, v)| (k, group_mean(&v)))
            .collect(),
        accuracy_by_type: by_type
            .into_iter()
            .map(|(k, v)| (k, group_mean(&v)))
            .collect(),
    }
}
