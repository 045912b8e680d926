use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::SeriesError;
use crate::forecast::Prediction;
use crate::model::Bar;
use crate::storage::{PredictionStore, SeriesAccess, replace_by_id, within};

const BARS_DIR: &str = "bars";
const PREDICTIONS_FILE: &str = "predictions.json";

/// File-backed storage under a data directory.
///
/// Bars are read from `bars/<SYMBOL>.json` (a JSON array of bars). The
/// prediction ledger is a single `predictions.json`, rewritten whole on
/// every change.
pub struct JsonFileStore {
    root: PathBuf,
    // serializes read-modify-write cycles on the ledger
    ledger: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ledger: Mutex::new(()),
        }
    }

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.root.join(BARS_DIR).join(format!("{symbol}.json"))
    }

    fn ledger_path(&self) -> PathBuf {
        self.root.join(PREDICTIONS_FILE)
    }

    async fn read_ledger(&self) -> Result<Vec<Prediction>, Report<SeriesError>> {
        let path = self.ledger_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Report::new(e)
                    .change_context(SeriesError::Read)
                    .attach(format!("path: {}", path.display())));
            }
        };
        serde_json::from_str(&content)
            .change_context(SeriesError::Parse)
            .attach_with(|| format!("path: {}", path.display()))
    }

    async fn write_ledger(&self, predictions: &[Prediction]) -> Result<(), Report<SeriesError>> {
        let path = self.ledger_path();
        ensure_parent(&path).await?;
        let content = serde_json::to_string_pretty(predictions).change_context(SeriesError::Write)?;
        tokio::fs::write(&path, content)
            .await
            .change_context(SeriesError::Write)
            .attach_with(|| format!("path: {}", path.display()))
    }
}

async fn ensure_parent(path: &Path) -> Result<(), Report<SeriesError>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .change_context(SeriesError::Write)
            .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
    }
    Ok(())
}

impl SeriesAccess for JsonFileStore {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SeriesError>>> {
        let symbol = symbol.to_string();
        Box::pin(async move {
            let path = self.bars_path(&symbol);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(Report::new(SeriesError::NotFound { symbol })
                        .attach(format!("path: {}", path.display())));
                }
                Err(e) => {
                    return Err(Report::new(e)
                        .change_context(SeriesError::Read)
                        .attach(format!("path: {}", path.display())));
                }
            };

            let bars: Vec<Bar> = serde_json::from_str(&content)
                .change_context(SeriesError::Parse)
                .attach_with(|| format!("path: {}", path.display()))?;

            let bars = within(bars, start, end);
            tracing::debug!(symbol = %symbol, bars = bars.len(), "loaded bars");
            Ok(bars)
        })
    }
}

impl PredictionStore for JsonFileStore {
    fn save(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>> {
        let prediction = prediction.clone();
        Box::pin(async move {
            let _guard = self.ledger.lock().await;
            let mut predictions = self.read_ledger().await?;
            predictions.push(prediction);
            self.write_ledger(&predictions).await
        })
    }

    fn list(
        &self,
        symbol: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Prediction>, Report<SeriesError>>> {
        let symbol = symbol.map(str::to_string);
        Box::pin(async move {
            let _guard = self.ledger.lock().await;
            let mut predictions = self.read_ledger().await?;
            if let Some(symbol) = symbol {
                predictions.retain(|p| p.symbol == symbol);
            }
            Ok(predictions)
        })
    }

    fn update(&self, prediction: &Prediction) -> BoxFuture<'_, Result<(), Report<SeriesError>>> {
        let prediction = prediction.clone();
        Box::pin(async move {
            let _guard = self.ledger.lock().await;
            let mut predictions = self.read_ledger().await?;
            replace_by_id(&mut predictions, &prediction)?;
            self.write_ledger(&predictions).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastEngine, PredictionStatus};
    use crate::indicator::IndicatorSet;
    use crate::indicator::test_support::bars_from_closes;
    use crate::model::{PredictionKind, Timeframe};

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("technical-analytics-{}", uuid::Uuid::new_v4()))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_prediction() -> Prediction {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i % 3) as f64).collect();
        let bars = bars_from_closes(&closes);
        let set = IndicatorSet::compute(&bars, &ForecastEngine::required_indicators());
        ForecastEngine::default()
            .generate(
                "AAA",
                &bars,
                &set,
                Timeframe::OneWeek,
                PredictionKind::Price,
                day(31),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn reads_bars_within_range() {
        let root = temp_root();
        let bars = bars_from_closes(&[10.0, 11.0, 12.0, 13.0]);
        std::fs::create_dir_all(root.join(BARS_DIR)).unwrap();
        std::fs::write(
            root.join(BARS_DIR).join("AAA.json"),
            serde_json::to_string(&bars).unwrap(),
        )
        .unwrap();

        let store = JsonFileStore::new(&root);
        let loaded = store.fetch_bars("AAA", day(2), day(3)).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].close, 11.0);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn missing_bar_file_is_not_found() {
        let store = JsonFileStore::new(temp_root());
        let err = store.fetch_bars("ZZZ", day(1), day(2)).await.unwrap_err();
        assert!(matches!(err.current_context(), SeriesError::NotFound { .. }));
    }

    #[tokio::test]
    async fn malformed_bar_file_is_parse_error() {
        let root = temp_root();
        std::fs::create_dir_all(root.join(BARS_DIR)).unwrap();
        std::fs::write(root.join(BARS_DIR).join("BAD.json"), "{not json").unwrap();

        let store = JsonFileStore::new(&root);
        let err = store.fetch_bars("BAD", day(1), day(2)).await.unwrap_err();
        assert!(matches!(err.current_context(), SeriesError::Parse));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn prediction_ledger_save_list_update() {
        let root = temp_root();
        let store = JsonFileStore::new(&root);
        assert!(store.list(None).await.unwrap().is_empty());

        let mut prediction = sample_prediction();
        store.save(&prediction).await.unwrap();

        let listed = store.list(Some("AAA")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, prediction.id);
        assert!(store.list(Some("BBB")).await.unwrap().is_empty());

        prediction.record_outcome(101.0, prediction.target_date).unwrap();
        store.update(&prediction).await.unwrap();
        let listed = store.list(None).await.unwrap();
        assert_eq!(listed[0].status, PredictionStatus::OutcomeKnown);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn update_of_unknown_prediction_fails() {
        let root = temp_root();
        let store = JsonFileStore::new(&root);
        let err = store.update(&sample_prediction()).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            SeriesError::UnknownPrediction { .. }
        ));
    }
}
