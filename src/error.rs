use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum SeriesError {
    #[display("no series data for {symbol}")]
    NotFound { symbol: String },
    #[display("failed to read series data")]
    Read,
    #[display("failed to parse series data")]
    Parse,
    #[display("failed to write data")]
    Write,
    #[display("no stored prediction with id {id}")]
    UnknownPrediction { id: String },
}

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum IndicatorError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum ForecastError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("invalid prediction transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

#[derive(Debug, Display, Error)]
pub enum AnalyticsError {
    #[display("insufficient data for {request}")]
    InsufficientData { request: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("series access failed")]
    Series,
    #[display("prediction store failed")]
    Store,
}
