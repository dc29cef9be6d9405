use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One OHLCV candle as persisted. `timestamp` is the candle open time in UTC;
/// within a symbol it is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Per-symbol aggregate row for the database-statistics view.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SymbolStats {
    pub symbol: String,
    pub record_count: i64,
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub avg_volume: Option<Decimal>,
}

/// Stored date range for a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SymbolSpan {
    pub record_count: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}
