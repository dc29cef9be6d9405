//! Binance spot REST client for kline history and instrument listings.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::{info, warn};

use crate::models::Candle;

/// Binance caps a single klines call at 1000 rows.
pub const MAX_KLINE_LIMIT: u32 = 1000;

/// Pull-side seam for the ingestion driver. Implementations report their own
/// failures and return empty results instead of raising, so one bad symbol
/// can never abort a batch run.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Vec<Candle>;

    async fn list_tradable_symbols(&self, quote_asset: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<InstrumentInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn try_fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/klines", self.base_url);
        let limit = limit.min(MAX_KLINE_LIMIT).to_string();

        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;
        parse_klines(symbol, &payload)
    }

    async fn try_list_symbols(&self, quote_asset: &str) -> Result<Vec<String>> {
        let url = format!("{}/exchangeInfo", self.base_url);

        let response = self.http.get(&url).send().await?.error_for_status()?;
        let info: ExchangeInfo = response.json().await?;

        Ok(filter_tradable(info.symbols, quote_asset))
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Vec<Candle> {
        match self.try_fetch_candles(symbol, interval, limit).await {
            Ok(candles) => {
                info!("Fetched {} candles for {}", candles.len(), symbol);
                candles
            }
            Err(e) => {
                warn!("Error fetching candles for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }

    async fn list_tradable_symbols(&self, quote_asset: &str) -> Vec<String> {
        match self.try_list_symbols(quote_asset).await {
            Ok(symbols) => {
                info!("Exchange lists {} tradable {} pairs", symbols.len(), quote_asset);
                symbols
            }
            Err(e) => {
                warn!("Error fetching exchange info: {}", e);
                Vec::new()
            }
        }
    }
}

/// Convert the klines payload (array of `[openTime, open, high, low, close,
/// volume, ...]` rows) into normalized candles. Order is preserved as
/// delivered by the exchange.
fn parse_klines(symbol: &str, payload: &Value) -> Result<Vec<Candle>> {
    let rows = payload
        .as_array()
        .ok_or_else(|| anyhow!("klines response is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let fields = row
            .as_array()
            .ok_or_else(|| anyhow!("kline row is not an array"))?;
        if fields.len() < 6 {
            bail!("kline row has {} fields, expected at least 6", fields.len());
        }

        candles.push(Candle {
            symbol: symbol.to_string(),
            timestamp: timestamp_at(fields, 0)?,
            open: decimal_at(fields, 1)?,
            high: decimal_at(fields, 2)?,
            low: decimal_at(fields, 3)?,
            close: decimal_at(fields, 4)?,
            volume: decimal_at(fields, 5)?,
        });
    }

    Ok(candles)
}

fn filter_tradable(instruments: Vec<InstrumentInfo>, quote_asset: &str) -> Vec<String> {
    instruments
        .into_iter()
        .filter(|i| i.status == "TRADING" && i.quote_asset == quote_asset)
        .map(|i| i.symbol)
        .collect()
}

fn timestamp_at(fields: &[Value], idx: usize) -> Result<DateTime<Utc>> {
    let millis = fields[idx]
        .as_i64()
        .ok_or_else(|| anyhow!("kline field {} is not an epoch-millis integer", idx))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("kline open time {} is out of range", millis))
}

// Binance serializes prices and volumes as JSON strings; numbers are accepted
// too for tolerance.
fn decimal_at(fields: &[Value], idx: usize) -> Result<Decimal> {
    match &fields[idx] {
        Value::String(s) => Ok(Decimal::from_str(s)?),
        Value::Number(n) => Ok(Decimal::from_str(&n.to_string())?),
        other => bail!("kline field {} has unexpected type: {}", idx, other),
    }
}
