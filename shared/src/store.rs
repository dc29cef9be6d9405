//! Candle persistence: idempotent batch writes plus the read-side queries the
//! export and viewer tools consume.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

use crate::models::{Candle, SymbolSpan, SymbolStats};

/// Storage seam keyed by (symbol, timestamp). Writes are last-write-wins
/// upserts; a write failure must surface to the caller rather than being
/// swallowed. Reads have no side effects.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Write the batch as one logical unit, overwriting OHLCV values for any
    /// (symbol, timestamp) already present. Empty input is a no-op. Returns
    /// the number of records applied.
    async fn upsert_batch(&self, candles: &[Candle]) -> Result<u64>;

    async fn query_symbols(&self) -> Result<Vec<String>>;

    /// Newest `limit` candles for one symbol, newest first.
    async fn query_recent(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>>;

    /// Candles with `start <= timestamp <= end`, newest first.
    async fn query_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// Full stored history for one symbol, newest first.
    async fn query_symbol_history(&self, symbol: &str) -> Result<Vec<Candle>>;

    async fn query_symbol_span(&self, symbol: &str) -> Result<SymbolSpan>;

    /// Per-symbol record count, date range and average volume, ordered by
    /// record count descending.
    async fn query_aggregate_stats(&self) -> Result<Vec<SymbolStats>>;
}

pub struct MySqlCandleStore {
    pool: MySqlPool,
}

impl MySqlCandleStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleStore for MySqlCandleStore {
    async fn upsert_batch(&self, candles: &[Candle]) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        for candle in candles {
            sqlx::query(
                r#"
                INSERT INTO candles (symbol, `timestamp`, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE
                    open = VALUES(open),
                    high = VALUES(high),
                    low = VALUES(low),
                    close = VALUES(close),
                    volume = VALUES(volume)
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.timestamp)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("Stored {} candle records", candles.len());
        Ok(candles.len() as u64)
    }

    async fn query_symbols(&self) -> Result<Vec<String>> {
        let symbols = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT symbol FROM candles ORDER BY symbol",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(symbols)
    }

    async fn query_recent(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>> {
        let candles = sqlx::query_as::<_, Candle>(
            r#"
            SELECT symbol, `timestamp`, open, high, low, close, volume
            FROM candles
            WHERE symbol = ?
            ORDER BY `timestamp` DESC
            LIMIT ?
            "#,
        )
        .bind(symbol)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(candles)
    }

    async fn query_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let candles = sqlx::query_as::<_, Candle>(
            r#"
            SELECT symbol, `timestamp`, open, high, low, close, volume
            FROM candles
            WHERE symbol = ? AND `timestamp` BETWEEN ? AND ?
            ORDER BY `timestamp` DESC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(candles)
    }

    async fn query_symbol_history(&self, symbol: &str) -> Result<Vec<Candle>> {
        let candles = sqlx::query_as::<_, Candle>(
            r#"
            SELECT symbol, `timestamp`, open, high, low, close, volume
            FROM candles
            WHERE symbol = ?
            ORDER BY `timestamp` DESC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;
        Ok(candles)
    }

    async fn query_symbol_span(&self, symbol: &str) -> Result<SymbolSpan> {
        let span = sqlx::query_as::<_, SymbolSpan>(
            r#"
            SELECT
                COUNT(*) AS record_count,
                MIN(`timestamp`) AS earliest,
                MAX(`timestamp`) AS latest
            FROM candles
            WHERE symbol = ?
            "#,
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;
        Ok(span)
    }

    async fn query_aggregate_stats(&self) -> Result<Vec<SymbolStats>> {
        let stats = sqlx::query_as::<_, SymbolStats>(
            r#"
            SELECT
                symbol,
                COUNT(*) AS record_count,
                MIN(`timestamp`) AS earliest,
                MAX(`timestamp`) AS latest,
                AVG(volume) AS avg_volume
            FROM candles
            GROUP BY symbol
            ORDER BY record_count DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }
}

/// In-memory store honoring the same contract, keyed by (symbol, timestamp).
/// Backs the driver tests and any run that should not touch MySQL.
#[derive(Default)]
pub struct MemoryCandleStore {
    candles: Mutex<BTreeMap<(String, DateTime<Utc>), Candle>>,
}

impl MemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl CandleStore for MemoryCandleStore {
    async fn upsert_batch(&self, candles: &[Candle]) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut map = self.candles.lock().unwrap();
        for candle in candles {
            map.insert((candle.symbol.clone(), candle.timestamp), candle.clone());
        }
        Ok(candles.len() as u64)
    }

    async fn query_symbols(&self) -> Result<Vec<String>> {
        let map = self.candles.lock().unwrap();
        let mut symbols: Vec<String> = map.keys().map(|(s, _)| s.clone()).collect();
        symbols.dedup();
        Ok(symbols)
    }

    async fn query_recent(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>> {
        let map = self.candles.lock().unwrap();
        let mut candles: Vec<Candle> = map
            .values()
            .filter(|c| c.symbol == symbol)
            .cloned()
            .collect();
        candles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        candles.truncate(limit as usize);
        Ok(candles)
    }

    async fn query_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let map = self.candles.lock().unwrap();
        let mut candles: Vec<Candle> = map
            .values()
            .filter(|c| c.symbol == symbol && c.timestamp >= start && c.timestamp <= end)
            .cloned()
            .collect();
        candles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(candles)
    }

    async fn query_symbol_history(&self, symbol: &str) -> Result<Vec<Candle>> {
        let map = self.candles.lock().unwrap();
        let mut candles: Vec<Candle> = map
            .values()
            .filter(|c| c.symbol == symbol)
            .cloned()
            .collect();
        candles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(candles)
    }

    async fn query_symbol_span(&self, symbol: &str) -> Result<SymbolSpan> {
        let map = self.candles.lock().unwrap();
        let timestamps: Vec<DateTime<Utc>> = map
            .values()
            .filter(|c| c.symbol == symbol)
            .map(|c| c.timestamp)
            .collect();
        Ok(SymbolSpan {
            record_count: timestamps.len() as i64,
            earliest: timestamps.iter().min().copied(),
            latest: timestamps.iter().max().copied(),
        })
    }

    async fn query_aggregate_stats(&self) -> Result<Vec<SymbolStats>> {
        let map = self.candles.lock().unwrap();
        let mut grouped: BTreeMap<String, Vec<&Candle>> = BTreeMap::new();
        for candle in map.values() {
            grouped.entry(candle.symbol.clone()).or_default().push(candle);
        }

        let mut stats: Vec<SymbolStats> = grouped
            .into_iter()
            .map(|(symbol, candles)| {
                let total: Decimal = candles.iter().map(|c| c.volume).sum();
                SymbolStats {
                    symbol,
                    record_count: candles.len() as i64,
                    earliest: candles.iter().map(|c| c.timestamp).min().unwrap(),
                    latest: candles.iter().map(|c| c.timestamp).max().unwrap(),
                    avg_volume: Some(total / Decimal::from(candles.len() as i64)),
                }
            })
            .collect();
        stats.sort_by(|a, b| b.record_count.cmp(&a.record_count));
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn candle(symbol: &str, day: u32, close: &str) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap(),
            open: Decimal::from_str("100.0").unwrap(),
            high: Decimal::from_str("110.0").unwrap(),
            low: Decimal::from_str("95.0").unwrap(),
            close: Decimal::from_str(close).unwrap(),
            volume: Decimal::from_str("1000.0").unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_over_identical_batches() {
        let store = MemoryCandleStore::new();
        let batch = vec![candle("BTCUSDT", 1, "105.0"), candle("BTCUSDT", 2, "106.0")];

        store.upsert_batch(&batch).await.unwrap();
        store.upsert_batch(&batch).await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_values_for_existing_key() {
        let store = MemoryCandleStore::new();
        store.upsert_batch(&[candle("BTCUSDT", 1, "105.0")]).await.unwrap();
        store.upsert_batch(&[candle("BTCUSDT", 1, "999.0")]).await.unwrap();

        let candles = store.query_recent("BTCUSDT", 10).await.unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, Decimal::from_str("999.0").unwrap());
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let store = MemoryCandleStore::new();
        assert_eq!(store.upsert_batch(&[]).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn recent_returns_newest_first_up_to_limit() {
        let store = MemoryCandleStore::new();
        let batch: Vec<Candle> = (1..=5).map(|d| candle("BTCUSDT", d, "105.0")).collect();
        store.upsert_batch(&batch).await.unwrap();

        let recent = store.query_recent("BTCUSDT", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].timestamp, Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap());
        assert!(recent.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive() {
        let store = MemoryCandleStore::new();
        let batch: Vec<Candle> = (1..=5).map(|d| candle("BTCUSDT", d, "105.0")).collect();
        store.upsert_batch(&batch).await.unwrap();

        let hits = store
            .query_range(
                "BTCUSDT",
                Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn span_and_stats_summarize_per_symbol() {
        let store = MemoryCandleStore::new();
        store
            .upsert_batch(&[
                candle("BTCUSDT", 1, "105.0"),
                candle("BTCUSDT", 2, "106.0"),
                candle("ETHUSDT", 1, "50.0"),
            ])
            .await
            .unwrap();

        let span = store.query_symbol_span("BTCUSDT").await.unwrap();
        assert_eq!(span.record_count, 2);
        assert_eq!(span.earliest, Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        assert_eq!(span.latest, Some(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()));

        let empty = store.query_symbol_span("DOGEUSDT").await.unwrap();
        assert_eq!(empty.record_count, 0);
        assert!(empty.earliest.is_none());

        let stats = store.query_aggregate_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].symbol, "BTCUSDT");
        assert_eq!(stats[0].record_count, 2);
        assert_eq!(stats[0].avg_volume, Some(Decimal::from_str("1000.0").unwrap()));
    }
}
