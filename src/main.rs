use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt, bail};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use technical_analytics::analytics::{AnalyticsFacade, DEFAULT_PREDICTION_LIMIT};
use technical_analytics::config::{self, AppConfig};
use technical_analytics::forecast::accuracy::{AccuracyFilter, DEFAULT_LIMIT};
use technical_analytics::model::{LookbackPeriod, PredictionKind, Timeframe};
use technical_analytics::report::ReportSink;
use technical_analytics::report::terminal::TerminalSink;
use technical_analytics::storage::json_file::JsonFileStore;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("invalid argument: {name}")]
    InvalidArgument { name: String },
    #[display("analytics request failed")]
    Analytics,
    #[display("failed to render output")]
    Output,
}

#[derive(Parser)]
#[command(
    name = "technical-analytics",
    about = "Technical indicators, support/resistance levels and heuristic price forecasts"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Date the request is evaluated at (YYYY-MM-DD); defaults to today (UTC)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Moving averages, oscillators, trend and volume
    Technical {
        symbol: String,
        /// Lookback such as 30d, 6w, 3m
        #[arg(long)]
        period: Option<String>,
    },
    /// Historical and annualized volatility
    Volatility {
        symbol: String,
        #[arg(long)]
        period: Option<String>,
    },
    /// Nearest support and resistance levels
    Levels {
        symbol: String,
        #[arg(long)]
        period: Option<String>,
    },
    /// Return correlation against other symbols
    Correlation {
        symbol: String,
        #[arg(long, value_delimiter = ',', required = true)]
        compare_with: Vec<String>,
        #[arg(long)]
        period: Option<String>,
    },
    /// Generate and store a forecast
    Predict {
        symbol: String,
        /// 1d, 3d, 1w, 2w, 1m or 3m
        #[arg(long, default_value = "1w")]
        timeframe: String,
        /// price, trend, volatility or support_resistance
        #[arg(long, default_value = "price")]
        kind: String,
    },
    /// Open forecasts for a symbol, newest first
    Predictions {
        symbol: String,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long, default_value_t = DEFAULT_PREDICTION_LIMIT)]
        limit: usize,
    },
    /// Evaluate stored forecasts whose target date has passed
    Evaluate,
    /// Accuracy of evaluated forecasts
    Accuracy {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Technical, volatility, levels and open forecasts in one view
    Summary { symbol: String },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let data_dir = &config.general.data_dir;
    std::fs::create_dir_all(data_dir)
        .change_context(AppError::Storage)
        .attach_with(|| format!("data_dir: {data_dir}"))?;

    let store = Arc::new(JsonFileStore::new(data_dir));
    let facade = AnalyticsFacade::new(
        store.clone(),
        store,
        config.pivot_engine().change_context(AppError::Config)?,
        config.forecast_engine(),
        config.analytics_settings(),
    );
    let sink: Arc<dyn ReportSink> = Arc::new(TerminalSink);
    let as_of = cli.as_of.unwrap_or_else(|| Utc::now().date_naive());

    info!(%as_of, "running request");

    match cli.command {
        Command::Technical { symbol, period } => {
            let result = facade
                .technical_summary(&symbol, parse_period(period.as_deref()), as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "technical", &result)
        }
        Command::Volatility { symbol, period } => {
            let result = facade
                .volatility(&symbol, parse_period(period.as_deref()), as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "volatility", &result)
        }
        Command::Levels { symbol, period } => {
            let result = facade
                .levels(&symbol, parse_period(period.as_deref()), as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "levels", &result)
        }
        Command::Correlation {
            symbol,
            compare_with,
            period,
        } => {
            let result = facade
                .correlation(&symbol, &compare_with, parse_period(period.as_deref()), as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "correlation", &result)
        }
        Command::Predict {
            symbol,
            timeframe,
            kind,
        } => {
            let Some(kind) = PredictionKind::from_str(&kind) else {
                bail!(AppError::InvalidArgument {
                    name: format!("kind \"{kind}\""),
                });
            };
            let timeframe = Timeframe::from_str_or_default(&timeframe);
            let result = facade
                .generate_prediction(&symbol, timeframe, kind, as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "predict", &result)
        }
        Command::Predictions {
            symbol,
            timeframe,
            limit,
        } => {
            let timeframe = parse_timeframe(timeframe.as_deref())?;
            let result = facade
                .predictions(&symbol, timeframe, Some(limit))
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "predictions", &result)
        }
        Command::Evaluate => {
            let result = facade
                .evaluate_due(as_of)
                .await
                .change_context(AppError::Analytics)?;
            info!(evaluated = result.len(), "evaluation complete");
            emit(sink.as_ref(), "evaluate", &result)
        }
        Command::Accuracy {
            model,
            timeframe,
            limit,
        } => {
            let timeframe = parse_timeframe(timeframe.as_deref())?;
            let filter = AccuracyFilter {
                model,
                timeframe,
                limit,
            };
            let result = facade
                .accuracy_report(&filter)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "accuracy", &result)
        }
        Command::Summary { symbol } => {
            let result = facade
                .summary(&symbol, as_of)
                .await
                .change_context(AppError::Analytics)?;
            emit(sink.as_ref(), "summary", &result)
        }
    }
}

fn parse_period(period: Option<&str>) -> Option<LookbackPeriod> {
    period.map(LookbackPeriod::parse)
}

/// Filters reject unknown labels instead of falling back to a default.
fn parse_timeframe(timeframe: Option<&str>) -> Result<Option<Timeframe>, Report<AppError>> {
    let Some(label) = timeframe else {
        return Ok(None);
    };
    match Timeframe::from_str(label) {
        Some(timeframe) => Ok(Some(timeframe)),
        None => bail!(AppError::InvalidArgument {
            name: format!("timeframe \"{label}\""),
        }),
    }
}

fn emit<T: Serialize>(
    sink: &dyn ReportSink,
    command: &str,
    result: &T,
) -> Result<(), Report<AppError>> {
    let payload = serde_json::to_value(result).change_context(AppError::Output)?;
    sink.publish(command, &payload);
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    // stdout carries the JSON result
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
