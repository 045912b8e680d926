pub mod json_file;
pub mod memory;

use chrono::NaiveDate;
use error_stack::Report;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::error::SeriesError;
use crate::forecast::Prediction;
use crate::model::Bar;

/// Read access to daily bar history.
pub trait SeriesAccess: Send + Sync {
    /// Bars of `symbol` dated within `[start, end]`, ascending by date.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SeriesError>>>;
}

/// Durable ledger of generated predictions.
pub trait PredictionStore: Send + Sync {
    fn save(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>>;

    /// Every stored prediction, optionally only those for `symbol`.
    fn list(
        &self,
        symbol: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Prediction>, Report<SeriesError>>>;

    /// Replace the stored prediction with the same id.
    fn update(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>>;
}

/// Keep bars dated within `[start, end]`.
pub(crate) fn within(bars: Vec<Bar>, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .collect()
}

pub(crate) fn replace_by_id(
    predictions: &mut [Prediction],
    updated: &Prediction,
) -> Result<(), Report<SeriesError>> {
    let id: Uuid = updated.id;
    match predictions.iter_mut().find(|p| p.id == id) {
        Some(slot) => {
            *slot = updated.clone();
            Ok(())
        }
        None => Err(Report::new(SeriesError::UnknownPrediction { id: id.to_string() })),
    }
}
