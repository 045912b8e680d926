pub mod response;

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use error_stack::{Report, ResultExt, bail};
use futures::future::try_join_all;

use crate::error::{AnalyticsError, ForecastError, IndicatorError, SeriesError};
use crate::forecast::accuracy::{AccuracyFilter, AccuracyMetrics, accuracy_metrics};
use crate::forecast::{ForecastEngine, Prediction, PredictionStatus, round_to};
use crate::indicator::volume::VolumeProfile;
use crate::indicator::{IndicatorRequest, IndicatorSet, close_prices, high_prices, low_prices};
use crate::model::{Bar, LookbackPeriod, PredictionKind, Timeframe, Trend};
use crate::pivot::{LevelKind, PivotEngine, PivotKind, nearest_resistance, nearest_support};
use crate::storage::{PredictionStore, SeriesAccess};
use crate::volatility::{correlation, daily_returns, historical_volatility};

use response::{
    BandsSummary, CorrelationEntry, CorrelationReport, Field, LevelsReport, MacdSummary,
    MarketSummary, MovingAverages, Oscillators, PivotSummary, PredictionList, TechnicalSummary,
    VolatilitySummary,
};

const MIN_TECHNICAL_BARS: usize = 14;
const MIN_LEVEL_BARS: usize = 20;
const RECENT_PIVOTS: usize = 5;
const SUMMARY_PREDICTIONS: usize = 3;
pub const DEFAULT_PREDICTION_LIMIT: usize = 10;

const TECHNICAL_INDICATORS: [IndicatorRequest; 12] = [
    IndicatorRequest::Sma(20),
    IndicatorRequest::Sma(50),
    IndicatorRequest::Ema(12),
    IndicatorRequest::Ema(26),
    IndicatorRequest::Rsi(14),
    IndicatorRequest::Macd {
        fast: 12,
        slow: 26,
        signal: 9,
    },
    IndicatorRequest::Bollinger {
        period: 20,
        multiplier: 2.0,
    },
    IndicatorRequest::Stochastic(14),
    IndicatorRequest::WilliamsR(14),
    IndicatorRequest::Adx(14),
    IndicatorRequest::Mfi(14),
    IndicatorRequest::Vwap,
];

/// Default lookbacks and prediction window sizing.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub technical_period: LookbackPeriod,
    pub volatility_period: LookbackPeriod,
    pub levels_period: LookbackPeriod,
    pub correlation_period: LookbackPeriod,
    pub min_lookback_days: u32,
    pub lookback_multiplier: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            technical_period: LookbackPeriod::from_days(30),
            volatility_period: LookbackPeriod::from_days(30),
            levels_period: LookbackPeriod::from_days(90),
            correlation_period: LookbackPeriod::from_days(90),
            min_lookback_days: 90,
            lookback_multiplier: 5,
        }
    }
}

impl AnalyticsSettings {
    /// Calendar days of history a prediction over `timeframe` is built from.
    pub fn prediction_lookback_days(&self, timeframe: Timeframe) -> u32 {
        timeframe
            .days()
            .saturating_mul(self.lookback_multiplier)
            .max(self.min_lookback_days)
    }
}

/// Per-request orchestration over the series source, the engines and the
/// prediction ledger.
pub struct AnalyticsFacade {
    series: Arc<dyn SeriesAccess>,
    store: Arc<dyn PredictionStore>,
    pivots: PivotEngine,
    forecast: ForecastEngine,
    settings: AnalyticsSettings,
}

fn forecast_context(e: &ForecastError, request: &str) -> AnalyticsError {
    match e {
        ForecastError::InsufficientData { .. } => AnalyticsError::InsufficientData {
            request: request.to_string(),
        },
        ForecastError::InvalidParameter { name } => {
            AnalyticsError::InvalidParameter { name: name.clone() }
        }
        ForecastError::InvalidTransition { .. } => AnalyticsError::Store,
    }
}

fn indicator_context(e: &IndicatorError, request: &str) -> AnalyticsError {
    match e {
        IndicatorError::InsufficientData { .. } => AnalyticsError::InsufficientData {
            request: request.to_string(),
        },
        IndicatorError::InvalidParameter { name } => {
            AnalyticsError::InvalidParameter { name: name.clone() }
        }
    }
}

/// Trimmed, upper-cased symbol; series files and the ledger are keyed by it.
fn normalize_symbol(symbol: &str) -> Result<String, Report<AnalyticsError>> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        bail!(AnalyticsError::InvalidParameter {
            name: "symbol must not be empty".into(),
        });
    }
    Ok(symbol.to_uppercase())
}

fn ensure_bars(bars: &[Bar], required: usize, request: &str) -> Result<(), Report<AnalyticsError>> {
    if bars.len() < required {
        return Err(Report::new(AnalyticsError::InsufficientData {
            request: request.to_string(),
        })
        .attach(format!("need {required} bars, got {}", bars.len())));
    }
    Ok(())
}

fn last_close(bars: &[Bar]) -> f64 {
    bars.last().map(|b| b.close).unwrap_or_default()
}

fn recent<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

impl AnalyticsFacade {
    pub fn new(
        series: Arc<dyn SeriesAccess>,
        store: Arc<dyn PredictionStore>,
        pivots: PivotEngine,
        forecast: ForecastEngine,
        settings: AnalyticsSettings,
    ) -> Self {
        Self {
            series,
            store,
            pivots,
            forecast,
            settings,
        }
    }

    async fn bars_for(
        &self,
        symbol: &str,
        period: LookbackPeriod,
        as_of: NaiveDate,
    ) -> Result<Vec<Bar>, Report<AnalyticsError>> {
        let start = as_of
            .checked_sub_days(Days::new(u64::from(period.days())))
            .unwrap_or(NaiveDate::MIN);
        self.series
            .fetch_bars(symbol, start, as_of)
            .await
            .change_context(AnalyticsError::Series)
            .attach_with(|| format!("symbol: {symbol}, period: {}d", period.days()))
    }

    /// Moving averages, oscillators, trend and volume for `symbol`.
    pub async fn technical_summary(
        &self,
        symbol: &str,
        period: Option<LookbackPeriod>,
        as_of: NaiveDate,
    ) -> Result<TechnicalSummary, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let period = period.unwrap_or(self.settings.technical_period);
        let bars = self.bars_for(symbol, period, as_of).await?;
        ensure_bars(&bars, MIN_TECHNICAL_BARS, "technical summary")?;

        tracing::info!(symbol, period = period.days(), bars = bars.len(), "technical summary");

        let set = IndicatorSet::compute(&bars, &TECHNICAL_INDICATORS);
        let current_price = last_close(&bars);
        let latest = |name: &str| Field::from_result(set.latest(name));

        let trend = set.latest("sma_20").and_then(|sma20| {
            set.latest("sma_50")
                .map(|sma50| Trend::classify(current_price, sma20, sma50))
        });

        let volume = VolumeProfile::from_bars(&bars)
            .change_context(AnalyticsError::InsufficientData {
                request: "technical summary".into(),
            })?;

        Ok(TechnicalSummary {
            symbol: symbol.to_string(),
            period_days: period.days(),
            data_points: bars.len(),
            current_price,
            moving_averages: MovingAverages {
                sma20: latest("sma_20"),
                sma50: latest("sma_50"),
                ema12: latest("ema_12"),
                ema26: latest("ema_26"),
            },
            rsi: latest("rsi_14"),
            macd: MacdSummary {
                macd: latest("macd"),
                signal: latest("macd_signal"),
                histogram: latest("macd_histogram"),
            },
            bollinger_bands: BandsSummary {
                upper: latest("bollinger_upper"),
                middle: latest("bollinger_middle"),
                lower: latest("bollinger_lower"),
            },
            trend: Field::from_result(trend),
            volume,
            oscillators: Oscillators {
                stochastic_k: latest("stochastic_k_14"),
                williams_r: latest("williams_r_14"),
                adx: latest("adx_14"),
                mfi: latest("mfi_14"),
                vwap: latest("vwap"),
            },
        })
    }

    pub async fn volatility(
        &self,
        symbol: &str,
        period: Option<LookbackPeriod>,
        as_of: NaiveDate,
    ) -> Result<VolatilitySummary, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let period = period.unwrap_or(self.settings.volatility_period);
        let bars = self.bars_for(symbol, period, as_of).await?;

        let report = historical_volatility(&close_prices(&bars)).map_err(|report| {
            let context = indicator_context(report.current_context(), "volatility");
            report.change_context(context)
        })?;

        tracing::info!(symbol, period = period.days(), classification = %report.classification, "volatility");

        Ok(VolatilitySummary {
            symbol: symbol.to_string(),
            period_days: period.days(),
            data_points: bars.len(),
            report,
        })
    }

    /// Nearest support/resistance levels around the last close.
    pub async fn levels(
        &self,
        symbol: &str,
        period: Option<LookbackPeriod>,
        as_of: NaiveDate,
    ) -> Result<LevelsReport, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let period = period.unwrap_or(self.settings.levels_period);
        let bars = self.bars_for(symbol, period, as_of).await?;
        ensure_bars(&bars, MIN_LEVEL_BARS, "support/resistance")?;

        let highs = self.pivots.find_pivots(&high_prices(&bars), PivotKind::High);
        let lows = self.pivots.find_pivots(&low_prices(&bars), PivotKind::Low);
        let resistance_levels = self.pivots.cluster_levels(&highs, LevelKind::Resistance);
        let support_levels = self.pivots.cluster_levels(&lows, LevelKind::Support);

        let current_price = last_close(&bars);
        tracing::info!(
            symbol,
            period = period.days(),
            high_pivots = highs.len(),
            low_pivots = lows.len(),
            "support/resistance"
        );

        Ok(LevelsReport {
            symbol: symbol.to_string(),
            period_days: period.days(),
            current_price,
            resistance: nearest_resistance(&resistance_levels, current_price),
            support: nearest_support(&support_levels, current_price),
            pivot_points: PivotSummary {
                highs: recent(&highs, RECENT_PIVOTS),
                lows: recent(&lows, RECENT_PIVOTS),
            },
        })
    }

    /// Return correlation of `symbol` against each of `compare_with`.
    ///
    /// Comparison symbols without data or with too little overlap are left
    /// out of the result.
    pub async fn correlation(
        &self,
        symbol: &str,
        compare_with: &[String],
        period: Option<LookbackPeriod>,
        as_of: NaiveDate,
    ) -> Result<CorrelationReport, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        if compare_with.is_empty() {
            bail!(AnalyticsError::InvalidParameter {
                name: "compare_with must name at least one symbol".into(),
            });
        }
        let compare_with = compare_with
            .iter()
            .map(|other| normalize_symbol(other))
            .collect::<Result<Vec<_>, _>>()?;
        let period = period.unwrap_or(self.settings.correlation_period);

        let base_bars = self.bars_for(symbol, period, as_of).await?;
        let base_returns = daily_returns(&close_prices(&base_bars));

        let others = try_join_all(compare_with.iter().map(move |other| async move {
            match self.bars_for(other, period, as_of).await {
                Ok(bars) => Ok((other.as_str(), Some(bars))),
                Err(report) if is_not_found(&report) => {
                    tracing::warn!(symbol = %other, "no data for comparison symbol, skipping");
                    Ok((other.as_str(), None))
                }
                Err(report) => Err(report),
            }
        }))
        .await?;

        let mut correlations = Vec::new();
        for (other, bars) in others {
            let Some(bars) = bars else { continue };
            let returns = daily_returns(&close_prices(&bars));
            match correlation(&base_returns, &returns) {
                Some(pair) => correlations.push(CorrelationEntry {
                    symbol: other.to_string(),
                    correlation: round_to(pair.coefficient, 3),
                    strength: pair.strength,
                    data_points: pair.data_points,
                }),
                None => {
                    tracing::warn!(
                        symbol,
                        other,
                        available = base_returns.len().min(returns.len()),
                        "insufficient overlap for correlation, skipping"
                    );
                }
            }
        }

        Ok(CorrelationReport {
            symbol: symbol.to_string(),
            period_days: period.days(),
            correlations,
        })
    }

    /// Generate a forecast from the lookback window ending at `as_of` and
    /// persist it.
    pub async fn generate_prediction(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        kind: PredictionKind,
        as_of: NaiveDate,
    ) -> Result<Prediction, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let lookback = LookbackPeriod::from_days(self.settings.prediction_lookback_days(timeframe));
        let bars = self.bars_for(symbol, lookback, as_of).await?;

        let indicators = IndicatorSet::compute(&bars, &ForecastEngine::required_indicators());
        let prediction = self
            .forecast
            .generate(symbol, &bars, &indicators, timeframe, kind, as_of)
            .map_err(|report| {
                let context = forecast_context(report.current_context(), "prediction");
                report.change_context(context)
            })?;

        self.store
            .save(&prediction)
            .await
            .change_context(AnalyticsError::Store)?;

        tracing::info!(
            symbol,
            id = %prediction.id,
            timeframe = %timeframe,
            predicted_price = prediction.predicted_price,
            confidence = prediction.confidence,
            "prediction generated"
        );
        Ok(prediction)
    }

    /// Evaluate every generated prediction whose target date has passed.
    ///
    /// The actual price is the last close on or before the target date,
    /// searched from the last bar the prediction was built on. That bar
    /// always exists, so a target on a non-trading day still resolves.
    pub async fn evaluate_due(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<Prediction>, Report<AnalyticsError>> {
        let due: Vec<Prediction> = self
            .store
            .list(None)
            .await
            .change_context(AnalyticsError::Store)?
            .into_iter()
            .filter(|p| p.status == PredictionStatus::Generated && p.target_date <= as_of)
            .collect();

        let mut evaluated = Vec::with_capacity(due.len());
        for mut prediction in due {
            let bars = match self
                .series
                .fetch_bars(
                    &prediction.symbol,
                    prediction.input_data.end_date,
                    prediction.target_date,
                )
                .await
            {
                Ok(bars) => bars,
                Err(report) if matches!(report.current_context(), SeriesError::NotFound { .. }) => {
                    Vec::new()
                }
                Err(report) => return Err(report.change_context(AnalyticsError::Series)),
            };
            let Some(outcome) = bars.last() else {
                tracing::warn!(symbol = %prediction.symbol, id = %prediction.id, "no outcome bar yet");
                continue;
            };

            let accuracy = self
                .forecast
                .evaluate(&prediction, outcome.close)
                .and_then(|accuracy| {
                    prediction.record_outcome(outcome.close, outcome.date)?;
                    prediction.complete_evaluation(accuracy)?;
                    Ok(accuracy)
                })
                .map_err(|report| {
                    let context = forecast_context(report.current_context(), "evaluation");
                    report.change_context(context)
                })?;

            self.store
                .update(&prediction)
                .await
                .change_context(AnalyticsError::Store)?;

            tracing::info!(
                symbol = %prediction.symbol,
                id = %prediction.id,
                actual = outcome.close,
                accuracy,
                "prediction evaluated"
            );
            evaluated.push(prediction);
        }
        Ok(evaluated)
    }

    pub async fn accuracy_report(
        &self,
        filter: &AccuracyFilter,
    ) -> Result<AccuracyMetrics, Report<AnalyticsError>> {
        let predictions = self
            .store
            .list(None)
            .await
            .change_context(AnalyticsError::Store)?;
        Ok(accuracy_metrics(filter.select(&predictions)))
    }

    /// Technical, volatility and level sections plus the most confident open
    /// predictions for `symbol`.
    pub async fn summary(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<MarketSummary, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let (technical, volatility, levels, predictions) = tokio::join!(
            self.technical_summary(symbol, Some(self.settings.technical_period), as_of),
            self.volatility(symbol, Some(self.settings.volatility_period), as_of),
            self.levels(symbol, Some(self.settings.levels_period), as_of),
            self.top_predictions(symbol),
        );

        Ok(MarketSummary {
            symbol: symbol.to_string(),
            technical: section(technical),
            volatility: section(volatility),
            levels: section(levels),
            predictions: section(predictions),
        })
    }

    /// Open predictions for `symbol`, newest first and then most confident.
    pub async fn predictions(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
        limit: Option<usize>,
    ) -> Result<PredictionList, Report<AnalyticsError>> {
        let symbol = normalize_symbol(symbol)?;
        let symbol = symbol.as_str();
        let mut open: Vec<Prediction> = self
            .store
            .list(Some(symbol))
            .await
            .change_context(AnalyticsError::Store)?
            .into_iter()
            .filter(|p| p.status == PredictionStatus::Generated)
            .filter(|p| timeframe.is_none_or(|t| p.timeframe == t))
            .collect();
        open.sort_by(|a, b| {
            b.prediction_date
                .cmp(&a.prediction_date)
                .then(b.confidence.total_cmp(&a.confidence))
        });
        open.truncate(limit.unwrap_or(DEFAULT_PREDICTION_LIMIT));

        tracing::info!(symbol, count = open.len(), "open predictions");
        Ok(PredictionList {
            symbol: symbol.to_string(),
            count: open.len(),
            predictions: open,
        })
    }

    async fn top_predictions(&self, symbol: &str) -> Result<Vec<Prediction>, Report<AnalyticsError>> {
        let mut open: Vec<Prediction> = self
            .store
            .list(Some(symbol))
            .await
            .change_context(AnalyticsError::Store)?
            .into_iter()
            .filter(|p| p.status == PredictionStatus::Generated)
            .collect();
        open.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        open.truncate(SUMMARY_PREDICTIONS);
        Ok(open)
    }
}

fn is_not_found(report: &Report<AnalyticsError>) -> bool {
    report
        .downcast_ref::<SeriesError>()
        .is_some_and(|e| matches!(e, SeriesError::NotFound { .. }))
}

fn section<T>(result: Result<T, Report<AnalyticsError>>) -> Field<T> {
    if let Err(report) = &result {
        tracing::debug!(error = ?report, "summary section failed");
    }
    Field::from_result(result.map_err(|report| report.current_context().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::test_support::{bars_from_closes, wave};
    use crate::storage::memory::MemoryStore;

    /// `bars_from_closes` dates start at 2024-01-01, one per calendar day.
    fn as_of_for(n: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n as u64 - 1)
    }

    fn facade_with(series: &[(&str, Vec<Bar>)]) -> (AnalyticsFacade, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for (symbol, bars) in series {
            store.insert_bars(symbol, bars.clone());
        }
        let facade = AnalyticsFacade::new(
            store.clone(),
            store.clone(),
            PivotEngine::default(),
            ForecastEngine::default(),
            AnalyticsSettings::default(),
        );
        (facade, store)
    }

    fn uptrend(n: usize) -> Vec<Bar> {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        bars_from_closes(&closes)
    }

    #[tokio::test]
    async fn technical_summary_reports_missing_fields_individually() {
        let bars = uptrend(31);
        let (facade, _) = facade_with(&[("AAA", bars)]);

        let summary = facade
            .technical_summary("AAA", None, as_of_for(31))
            .await
            .unwrap();

        assert_eq!(summary.data_points, 31);
        assert_eq!(summary.current_price, 130.0);
        assert!(summary.moving_averages.sma20.value().is_some());
        assert!(summary.moving_averages.sma50.is_error());
        assert!(summary.trend.is_error());
        assert!(summary.rsi.value().is_some());
        // 26 + 9 - 1 = 34 bars needed
        assert!(summary.macd.signal.is_error());
        assert!(summary.oscillators.vwap.value().is_some());
        assert_eq!(summary.volume.relative, 1.0);
    }

    #[tokio::test]
    async fn technical_summary_with_full_history() {
        let bars = uptrend(90);
        let (facade, _) = facade_with(&[("AAA", bars)]);

        let summary = facade
            .technical_summary("AAA", Some(LookbackPeriod::from_days(89)), as_of_for(90))
            .await
            .unwrap();

        assert_eq!(summary.trend.value(), Some(&Trend::Bullish));
        assert!(summary.macd.histogram.value().is_some());
        assert_eq!(summary.rsi.value(), Some(&100.0));
    }

    #[tokio::test]
    async fn technical_summary_needs_fourteen_bars() {
        let (facade, _) = facade_with(&[("AAA", uptrend(13))]);
        let err = facade
            .technical_summary("AAA", None, as_of_for(13))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InsufficientData { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_symbol_is_series_error() {
        let (facade, _) = facade_with(&[]);
        let err = facade
            .volatility("NOPE", None, as_of_for(10))
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), AnalyticsError::Series));
    }

    #[tokio::test]
    async fn empty_symbol_is_invalid() {
        let (facade, _) = facade_with(&[]);
        let err = facade.levels(" ", None, as_of_for(10)).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InvalidParameter { .. }
        ));
    }

    #[tokio::test]
    async fn volatility_of_single_bar_is_insufficient() {
        let (facade, _) = facade_with(&[("AAA", uptrend(1))]);
        let err = facade
            .volatility("AAA", None, as_of_for(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InsufficientData { .. }
        ));
    }

    #[tokio::test]
    async fn levels_bracket_current_price() {
        let closes = wave(90, 100.0);
        let bars = bars_from_closes(&closes);
        let current = closes[closes.len() - 1];
        let (facade, _) = facade_with(&[("AAA", bars)]);

        let report = facade.levels("AAA", None, as_of_for(90)).await.unwrap();

        assert_eq!(report.current_price, current);
        assert!(report.resistance.len() <= 3);
        assert!(report.support.len() <= 3);
        assert!(report.resistance.iter().all(|l| l.price > current));
        assert!(report.support.iter().all(|l| l.price < current));
        assert!(report.pivot_points.highs.len() <= 5);
        assert!(!report.pivot_points.lows.is_empty());
    }

    #[tokio::test]
    async fn levels_need_twenty_bars() {
        let (facade, _) = facade_with(&[("AAA", uptrend(19))]);
        let err = facade.levels("AAA", None, as_of_for(19)).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InsufficientData { .. }
        ));
    }

    #[tokio::test]
    async fn correlation_skips_short_and_missing_symbols() {
        let base = bars_from_closes(&wave(40, 100.0));
        let twin = bars_from_closes(&wave(40, 50.0).iter().map(|c| c * 2.0).collect::<Vec<_>>());
        let short = bars_from_closes(&wave(40, 10.0)[30..]);
        let (facade, _) = facade_with(&[("BASE", base.clone()), ("TWIN", twin), ("SHORT", short)]);

        let compare = vec!["TWIN".to_string(), "SHORT".to_string(), "GONE".to_string()];
        let report = facade
            .correlation("BASE", &compare, None, as_of_for(40))
            .await
            .unwrap();

        assert_eq!(report.correlations.len(), 1);
        let entry = &report.correlations[0];
        assert_eq!(entry.symbol, "TWIN");
        assert_eq!(entry.data_points, 39);
        assert!(entry.correlation > 0.0 && entry.correlation <= 1.0);
    }

    #[tokio::test]
    async fn correlation_requires_comparison_symbols() {
        let (facade, _) = facade_with(&[("BASE", uptrend(40))]);
        let err = facade
            .correlation("BASE", &[], None, as_of_for(40))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InvalidParameter { .. }
        ));
    }

    #[tokio::test]
    async fn prediction_is_generated_saved_and_evaluated() {
        let bars = uptrend(120);
        let (facade, store) = facade_with(&[("AAA", bars)]);
        let as_of = as_of_for(100);

        let prediction = facade
            .generate_prediction("AAA", Timeframe::OneWeek, PredictionKind::Price, as_of)
            .await
            .unwrap();
        assert_eq!(prediction.target_date, as_of + Days::new(7));
        assert_eq!(prediction.current_price, 199.0);
        assert_eq!(prediction.input_data.data_points, 91);
        assert_eq!(store.list(Some("AAA")).await.unwrap().len(), 1);

        // not yet due
        assert!(facade.evaluate_due(as_of).await.unwrap().is_empty());

        let evaluated = facade
            .evaluate_due(prediction.target_date)
            .await
            .unwrap();
        assert_eq!(evaluated.len(), 1);
        let done = &evaluated[0];
        assert_eq!(done.status, PredictionStatus::Evaluated);
        let actual = done.actual_outcome.as_ref().unwrap();
        assert_eq!(actual.observed_on, prediction.target_date);
        assert_eq!(actual.actual_price, 206.0);
        assert!(done.accuracy.unwrap() > 0.9);

        let stored = store.list(None).await.unwrap();
        assert_eq!(stored[0].status, PredictionStatus::Evaluated);

        let metrics = facade
            .accuracy_report(&AccuracyFilter::default())
            .await
            .unwrap();
        assert_eq!(metrics.total_predictions, 1);
        assert_eq!(metrics.accuracy_by_timeframe["1w"].count, 1);

        // already evaluated
        assert!(facade.evaluate_due(prediction.target_date).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn prediction_without_enough_history_fails() {
        let (facade, store) = facade_with(&[("AAA", uptrend(40))]);
        let err = facade
            .generate_prediction("AAA", Timeframe::OneDay, PredictionKind::Price, as_of_for(40))
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InsufficientData { .. }
        ));
        assert!(store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_reports_sections_independently() {
        let bars = uptrend(100);
        let (facade, _) = facade_with(&[("AAA", bars)]);
        let as_of = as_of_for(100);

        for timeframe in [Timeframe::OneDay, Timeframe::OneWeek, Timeframe::OneMonth, Timeframe::ThreeMonths] {
            facade
                .generate_prediction("AAA", timeframe, PredictionKind::Price, as_of)
                .await
                .unwrap();
        }

        let summary = facade.summary("AAA", as_of).await.unwrap();
        assert!(summary.technical.value().is_some());
        assert!(summary.volatility.value().is_some());
        assert!(summary.levels.value().is_some());
        let top = summary.predictions.value().unwrap();
        assert_eq!(top.len(), 3);
        assert!(top.windows(2).all(|w| w[0].confidence >= w[1].confidence));

        let missing = facade.summary("NOPE", as_of).await.unwrap();
        assert!(missing.technical.is_error());
        assert!(missing.levels.is_error());
        assert_eq!(missing.predictions.value().map(Vec::len), Some(0));
    }

    #[test]
    fn prediction_lookback_has_a_floor() {
        let settings = AnalyticsSettings::default();
        assert_eq!(settings.prediction_lookback_days(Timeframe::OneWeek), 90);
        assert_eq!(settings.prediction_lookback_days(Timeframe::OneMonth), 150);
    }

    #[test]
    fn prediction_lookback_saturates() {
        let settings = AnalyticsSettings {
            lookback_multiplier: u32::MAX,
            ..AnalyticsSettings::default()
        };
        assert_eq!(settings.prediction_lookback_days(Timeframe::ThreeMonths), u32::MAX);
    }

    fn weekdays_only(bars: Vec<Bar>) -> Vec<Bar> {
        use chrono::{Datelike, Weekday};
        bars.into_iter()
            .filter(|b| !matches!(b.date.weekday(), Weekday::Sat | Weekday::Sun))
            .collect()
    }

    #[tokio::test]
    async fn weekend_target_resolves_to_last_trading_close() {
        let (facade, store) = facade_with(&[("AAA", weekdays_only(uptrend(200)))]);
        let friday = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let from_friday = facade
            .generate_prediction("AAA", Timeframe::OneDay, PredictionKind::Price, friday)
            .await
            .unwrap();
        let from_saturday = facade
            .generate_prediction("AAA", Timeframe::OneDay, PredictionKind::Price, saturday)
            .await
            .unwrap();
        assert_eq!(from_friday.target_date, saturday);
        assert_eq!(from_saturday.input_data.end_date, friday);

        let evaluated = facade
            .evaluate_due(NaiveDate::from_ymd_opt(2024, 6, 4).unwrap())
            .await
            .unwrap();
        assert_eq!(evaluated.len(), 2);
        for done in &evaluated {
            assert_eq!(done.status, PredictionStatus::Evaluated);
            let actual = done.actual_outcome.as_ref().unwrap();
            assert_eq!(actual.observed_on, friday);
            // 2024-05-31 is day 151 of the series
            assert_eq!(actual.actual_price, 251.0);
        }

        let stored = store.list(Some("AAA")).await.unwrap();
        assert!(stored.iter().all(|p| p.status == PredictionStatus::Evaluated));
        assert_eq!(facade.predictions("AAA", None, None).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn open_predictions_newest_first_with_filters() {
        let (facade, _) = facade_with(&[("AAA", uptrend(100)), ("BBB", uptrend(100))]);
        facade
            .generate_prediction("AAA", Timeframe::OneWeek, PredictionKind::Price, as_of_for(90))
            .await
            .unwrap();
        for timeframe in [Timeframe::OneDay, Timeframe::OneWeek, Timeframe::OneMonth] {
            facade
                .generate_prediction("AAA", timeframe, PredictionKind::Price, as_of_for(100))
                .await
                .unwrap();
        }

        let all = facade.predictions("aaa", None, None).await.unwrap();
        assert_eq!(all.symbol, "AAA");
        assert_eq!(all.count, 4);
        assert_eq!(all.predictions.len(), 4);
        assert!(all.predictions[..3]
            .iter()
            .all(|p| p.prediction_date == as_of_for(100)));
        assert!(all.predictions[..3]
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(all.predictions[3].prediction_date, as_of_for(90));

        let weekly = facade
            .predictions("AAA", Some(Timeframe::OneWeek), None)
            .await
            .unwrap();
        assert_eq!(weekly.count, 2);
        assert_eq!(weekly.predictions[0].prediction_date, as_of_for(100));

        let limited = facade.predictions("AAA", None, Some(1)).await.unwrap();
        assert_eq!(limited.count, 1);

        assert_eq!(facade.predictions("BBB", None, None).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn symbols_are_normalized() {
        let (facade, store) = facade_with(&[("AAA", uptrend(100))]);
        let as_of = as_of_for(100);

        let summary = facade.technical_summary(" aaa ", None, as_of).await.unwrap();
        assert_eq!(summary.symbol, "AAA");

        let prediction = facade
            .generate_prediction("aaa", Timeframe::OneWeek, PredictionKind::Price, as_of)
            .await
            .unwrap();
        assert_eq!(prediction.symbol, "AAA");
        assert_eq!(store.list(Some("AAA")).await.unwrap().len(), 1);

        let err = facade.levels("   ", None, as_of).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            AnalyticsError::InvalidParameter { .. }
        ));
    }
}
