use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SeriesError;
use crate::forecast::Prediction;
use crate::model::Bar;
use crate::storage::{PredictionStore, SeriesAccess, replace_by_id, within};

/// Process-local bars and predictions.
#[derive(Default)]
pub struct MemoryStore {
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    predictions: Mutex<Vec<Prediction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the series held for `symbol`.
    pub fn insert_bars(&self, symbol: &str, bars: Vec<Bar>) {
        let mut guard = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(symbol.to_string(), bars);
    }
}

impl SeriesAccess for MemoryStore {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SeriesError>>> {
        let symbol = symbol.to_string();
        Box::pin(async move {
            let guard = self.bars.lock().unwrap_or_else(|e| e.into_inner());
            match guard.get(&symbol) {
                Some(bars) => Ok(within(bars.clone(), start, end)),
                None => Err(Report::new(SeriesError::NotFound { symbol })),
            }
        })
    }
}

impl PredictionStore for MemoryStore {
    fn save(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>> {
        let prediction = prediction.clone();
        Box::pin(async move {
            let mut guard = self.predictions.lock().unwrap_or_else(|e| e.into_inner());
            guard.push(prediction);
            Ok(())
        })
    }

    fn list(
        &self,
        symbol: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Prediction>, Report<SeriesError>>> {
        let symbol = symbol.map(str::to_string);
        Box::pin(async move {
            let guard = self.predictions.lock().unwrap_or_else(|e| e.into_inner());
            Ok(guard
                .iter()
                .filter(|p| symbol.as_deref().is_none_or(|s| p.symbol == s))
                .cloned()
                .collect())
        })
    }

    fn update(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>> {
        let prediction = prediction.clone();
        Box::pin(async move {
            let mut guard = self.predictions.lock().unwrap_or_else(|e| e.into_inner());
            replace_by_id(&mut guard, &prediction)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::bars_from_closes;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn fetch_filters_by_date_range() {
        let store = MemoryStore::new();
        store.insert_bars("AAA", bars_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        let bars = store.fetch_bars("AAA", day(2), day(4)).await.unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let store = MemoryStore::new();
        let err = store.fetch_bars("NOPE", day(1), day(2)).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::NotFound { symbol } if symbol == "NOPE"
        ));
    }
}
