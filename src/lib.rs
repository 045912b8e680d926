pub mod analytics;
pub mod config;
pub mod error;
pub mod forecast;
pub mod indicator;
pub mod model;
pub mod pivot;
pub mod report;
pub mod storage;
pub mod volatility;
