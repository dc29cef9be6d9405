//! Sequential batch ingestion: fetch each configured symbol once, upsert
//! non-empty results, pace requests with a fixed sleep.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::binance::MarketDataSource;
use crate::store::CandleStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    Stored { rows: u64 },
    NoData,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub reports: Vec<SymbolReport>,
}

impl IngestReport {
    pub fn stored(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Stored { .. }))
            .count()
    }

    pub fn no_data(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome == SymbolOutcome::NoData)
            .count()
    }

    pub fn failed(&self) -> Vec<&SymbolReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SymbolOutcome::Failed { .. }))
            .collect()
    }

    pub fn total_rows(&self) -> u64 {
        self.reports
            .iter()
            .map(|r| match r.outcome {
                SymbolOutcome::Stored { rows } => rows,
                _ => 0,
            })
            .sum()
    }
}

/// Process `symbols` strictly in order, one attempt each. A store failure is
/// recorded against its symbol and the loop moves on; the run itself never
/// fails. Fetch failures already surface as empty batches.
pub async fn run<S, T>(
    source: &S,
    store: &T,
    symbols: &[String],
    interval: &str,
    limit: u32,
    pace: Duration,
) -> IngestReport
where
    S: MarketDataSource + ?Sized,
    T: CandleStore + ?Sized,
{
    let mut report = IngestReport::default();

    for symbol in symbols {
        info!("Processing {}...", symbol);

        let candles = source.fetch_candles(symbol, interval, limit).await;

        let outcome = if candles.is_empty() {
            SymbolOutcome::NoData
        } else {
            match store.upsert_batch(&candles).await {
                Ok(rows) => SymbolOutcome::Stored { rows },
                Err(e) => {
                    error!("Error storing data for {}: {}", symbol, e);
                    SymbolOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        report.reports.push(SymbolReport {
            symbol: symbol.clone(),
            outcome,
        });

        // Fixed pacing keeps the run under the exchange request-rate ceiling.
        sleep(pace).await;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use crate::store::MemoryCandleStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;

    struct ScriptedSource {
        responses: HashMap<String, Vec<Candle>>,
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn fetch_candles(&self, symbol: &str, _interval: &str, _limit: u32) -> Vec<Candle> {
            self.responses.get(symbol).cloned().unwrap_or_default()
        }

        async fn list_tradable_symbols(&self, _quote_asset: &str) -> Vec<String> {
            let mut symbols: Vec<String> = self.responses.keys().cloned().collect();
            symbols.sort();
            symbols
        }
    }

    /// Store whose writes always fail, for exercising per-symbol isolation.
    struct BrokenStore {
        inner: MemoryCandleStore,
        fail_symbol: String,
    }

    #[async_trait]
    impl CandleStore for BrokenStore {
        async fn upsert_batch(&self, candles: &[Candle]) -> Result<u64> {
            if candles.iter().any(|c| c.symbol == self.fail_symbol) {
                bail!("connection lost mid-batch");
            }
            self.inner.upsert_batch(candles).await
        }

        async fn query_symbols(&self) -> Result<Vec<String>> {
            self.inner.query_symbols().await
        }

        async fn query_recent(&self, symbol: &str, limit: u32) -> Result<Vec<Candle>> {
            self.inner.query_recent(symbol, limit).await
        }

        async fn query_range(
            &self,
            symbol: &str,
            start: chrono::DateTime<Utc>,
            end: chrono::DateTime<Utc>,
        ) -> Result<Vec<Candle>> {
            self.inner.query_range(symbol, start, end).await
        }

        async fn query_symbol_history(&self, symbol: &str) -> Result<Vec<Candle>> {
            self.inner.query_symbol_history(symbol).await
        }

        async fn query_symbol_span(&self, symbol: &str) -> Result<crate::models::SymbolSpan> {
            self.inner.query_symbol_span(symbol).await
        }

        async fn query_aggregate_stats(&self) -> Result<Vec<crate::models::SymbolStats>> {
            self.inner.query_aggregate_stats().await
        }
    }

    fn candle(symbol: &str, day: u32) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap(),
            open: Decimal::from_str("100.0").unwrap(),
            high: Decimal::from_str("110.0").unwrap(),
            low: Decimal::from_str("95.0").unwrap(),
            close: Decimal::from_str("105.0").unwrap(),
            volume: Decimal::from_str("1000.0").unwrap(),
        }
    }

    #[tokio::test]
    async fn stores_fetched_candles_and_skips_empty_symbols() {
        let source = ScriptedSource {
            responses: HashMap::from([
                ("BTCUSDT".to_string(), vec![candle("BTCUSDT", 1), candle("BTCUSDT", 2)]),
                ("ETHUSDT".to_string(), Vec::new()),
            ]),
        };
        let store = MemoryCandleStore::new();
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        let report = run(&source, &store, &symbols, "1d", 1000, Duration::ZERO).await;

        assert_eq!(store.query_recent("BTCUSDT", 10).await.unwrap().len(), 2);
        assert!(store.query_recent("ETHUSDT", 10).await.unwrap().is_empty());
        assert_eq!(report.reports.len(), 2);
        assert_eq!(report.reports[0].outcome, SymbolOutcome::Stored { rows: 2 });
        assert_eq!(report.reports[1].outcome, SymbolOutcome::NoData);
        assert_eq!(report.total_rows(), 2);
    }

    #[tokio::test]
    async fn a_mid_list_store_failure_does_not_block_later_symbols() {
        let source = ScriptedSource {
            responses: HashMap::from([
                ("BTCUSDT".to_string(), vec![candle("BTCUSDT", 1)]),
                ("ETHUSDT".to_string(), vec![candle("ETHUSDT", 1)]),
                ("SOLUSDT".to_string(), vec![candle("SOLUSDT", 1)]),
            ]),
        };
        let store = BrokenStore {
            inner: MemoryCandleStore::new(),
            fail_symbol: "ETHUSDT".to_string(),
        };
        let symbols = vec![
            "BTCUSDT".to_string(),
            "ETHUSDT".to_string(),
            "SOLUSDT".to_string(),
        ];

        let report = run(&source, &store, &symbols, "1d", 1000, Duration::ZERO).await;

        assert_eq!(report.stored(), 2);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].symbol, "ETHUSDT");
        assert_eq!(store.query_recent("SOLUSDT", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rerunning_the_same_window_does_not_duplicate_rows() {
        let source = ScriptedSource {
            responses: HashMap::from([(
                "BTCUSDT".to_string(),
                vec![candle("BTCUSDT", 1), candle("BTCUSDT", 2), candle("BTCUSDT", 3)],
            )]),
        };
        let store = MemoryCandleStore::new();
        let symbols = vec!["BTCUSDT".to_string()];

        run(&source, &store, &symbols, "1d", 1000, Duration::ZERO).await;
        run(&source, &store, &symbols, "1d", 1000, Duration::ZERO).await;

        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn every_symbol_is_attempted_exactly_once() {
        let source = ScriptedSource {
            responses: HashMap::new(),
        };
        let store = MemoryCandleStore::new();
        let symbols = vec!["AUSDT".to_string(), "BUSDT".to_string(), "CUSDT".to_string()];

        let report = run(&source, &store, &symbols, "1d", 1000, Duration::ZERO).await;

        let attempted: Vec<&str> = report.reports.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(attempted, vec!["AUSDT", "BUSDT", "CUSDT"]);
        assert_eq!(report.no_data(), 3);
    }
}
