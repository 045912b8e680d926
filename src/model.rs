use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV record.
///
/// Series handed to the engine are ascending by date with unique dates; the
/// engine does not sort or deduplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// `(high + low + close) / 3`
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Direction label shared by the trend classifier and the forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// `bullish` iff `price > sma20 > sma50`, `bearish` iff `price < sma20 < sma50`.
    pub fn classify(current_price: f64, sma20: f64, sma50: f64) -> Self {
        if current_price > sma20 && sma20 > sma50 {
            Self::Bullish
        } else if current_price < sma20 && sma20 < sma50 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast horizon.
///
/// String representations match the request format (e.g. `"1w"`, `"3m"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "2w")]
    TwoWeeks,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
}

impl Timeframe {
    /// Parse a request-format string into a `Timeframe`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1d" => Some(Self::OneDay),
            "3d" => Some(Self::ThreeDays),
            "1w" => Some(Self::OneWeek),
            "2w" => Some(Self::TwoWeeks),
            "1m" => Some(Self::OneMonth),
            "3m" => Some(Self::ThreeMonths),
            _ => None,
        }
    }

    /// Like [`Timeframe::from_str`], but unknown labels resolve to one week.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| {
            tracing::warn!(timeframe = s, "unknown timeframe, defaulting to 1w");
            Self::OneWeek
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::TwoWeeks => "2w",
            Self::OneMonth => "1m",
            Self::ThreeMonths => "3m",
        }
    }

    /// Calendar days covered by the horizon.
    pub fn days(self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::ThreeDays => 3,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a prediction is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Price,
    Trend,
    Volatility,
    SupportResistance,
}

impl PredictionKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "price" => Some(Self::Price),
            "trend" => Some(Self::Trend),
            "volatility" => Some(Self::Volatility),
            "support_resistance" => Some(Self::SupportResistance),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Trend => "trend",
            Self::Volatility => "volatility",
            Self::SupportResistance => "support_resistance",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Calendar lookback such as `"30d"`, `"2w"`, `"3m"` or `"1y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackPeriod {
    days: u32,
}

impl LookbackPeriod {
    pub fn from_days(days: u32) -> Self {
        Self { days }
    }

    /// Parse `<count><unit>` where unit is one of `d`, `w`, `m`, `y`.
    ///
    /// The first such token anywhere in the input wins; input without one
    /// resolves to 30 days.
    pub fn parse(s: &str) -> Self {
        Self::parse_strict(s).unwrap_or(Self {
            days: DEFAULT_LOOKBACK_DAYS,
        })
    }

    /// Like [`LookbackPeriod::parse`] but returns `None` instead of the default.
    pub fn parse_strict(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii_digit() {
                i += 1;
                continue;
            }
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let multiplier = match bytes.get(i) {
                Some(b'd') => 1,
                Some(b'w') => 7,
                Some(b'm') => 30,
                Some(b'y') => 365,
                _ => continue,
            };
            let count: u32 = s[start..i].parse().ok()?;
            return Some(Self {
                days: count.saturating_mul(multiplier),
            });
        }
        None
    }

    pub fn days(self) -> u32 {
        self.days
    }
}
