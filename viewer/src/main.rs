use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{get_pool, Candle, CandleStore, Config, MySqlCandleStore, SymbolStats};
use std::io::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct CandleRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Open")]
    open: String,
    #[tabled(rename = "High")]
    high: String,
    #[tabled(rename = "Low")]
    low: String,
    #[tabled(rename = "Close")]
    close: String,
    #[tabled(rename = "Volume")]
    volume: String,
}

impl From<&Candle> for CandleRow {
    fn from(candle: &Candle) -> Self {
        Self {
            timestamp: candle.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            open: fmt_price(candle.open),
            high: fmt_price(candle.high),
            low: fmt_price(candle.low),
            close: fmt_price(candle.close),
            volume: fmt_price(candle.volume),
        }
    }
}

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Records")]
    records: i64,
    #[tabled(rename = "Earliest")]
    earliest: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Avg Volume")]
    avg_volume: String,
}

impl From<&SymbolStats> for StatsRow {
    fn from(stats: &SymbolStats) -> Self {
        Self {
            symbol: stats.symbol.clone(),
            records: stats.record_count,
            earliest: stats.earliest.format("%Y-%m-%d %H:%M:%S").to_string(),
            latest: stats.latest.format("%Y-%m-%d %H:%M:%S").to_string(),
            avg_volume: stats.avg_volume.map(fmt_price).unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let config = Config::from_env()?;
    let pool = get_pool(&config.database_url).await?;
    let store = MySqlCandleStore::new(pool);

    loop {
        println!("\nCrypto Market Data Viewer");
        println!("1. List available symbols");
        println!("2. View recent data for a symbol");
        println!("3. View date range for a symbol");
        println!("4. View data by date range");
        println!("5. View database statistics");
        println!("6. Exit");

        let choice = prompt("\nEnter your choice (1-6): ")?;
        let result = match choice.as_str() {
            "1" => list_symbols(&store).await,
            "2" => view_recent(&store).await,
            "3" => view_span(&store).await,
            "4" => view_range(&store).await,
            "5" => view_stats(&store).await,
            "6" => {
                println!("Goodbye!");
                return Ok(());
            }
            _ => {
                println!("Invalid choice. Please try again.");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("Error: {}", e);
        }

        prompt("\nPress Enter to continue...")?;
    }
}

async fn list_symbols(store: &MySqlCandleStore) -> Result<()> {
    let symbols = store.query_symbols().await?;
    println!("\nAvailable symbols:");
    for symbol in &symbols {
        println!("{}", symbol);
    }
    println!("\nTotal symbols: {}", symbols.len());
    Ok(())
}

async fn view_recent(store: &MySqlCandleStore) -> Result<()> {
    let symbol = prompt("Enter symbol (e.g., BTCUSDT): ")?.to_uppercase();
    let limit: u32 = prompt("Enter number of records to view: ")?.parse()?;

    let candles = store.query_recent(&symbol, limit).await?;
    println!("\nMost recent {} records for {}:", limit, symbol);
    print_candles(&candles);
    Ok(())
}

async fn view_span(store: &MySqlCandleStore) -> Result<()> {
    let symbol = prompt("Enter symbol (e.g., BTCUSDT): ")?.to_uppercase();
    let span = store.query_symbol_span(&symbol).await?;

    println!("\nData range for {}:", symbol);
    match (span.earliest, span.latest) {
        (Some(earliest), Some(latest)) => {
            println!("Earliest date: {}", earliest.format("%Y-%m-%d %H:%M:%S"));
            println!("Latest date: {}", latest.format("%Y-%m-%d %H:%M:%S"));
            println!("Total records: {}", span.record_count);
        }
        _ => println!("No data stored for {}", symbol),
    }
    Ok(())
}

async fn view_range(store: &MySqlCandleStore) -> Result<()> {
    let symbol = prompt("Enter symbol (e.g., BTCUSDT): ")?.to_uppercase();
    let start = prompt("Enter start date (YYYY-MM-DD): ")?;
    let end = prompt("Enter end date (YYYY-MM-DD): ")?;
    let (start_at, end_at) = parse_day_bounds(&start, &end)?;

    let candles = store.query_range(&symbol, start_at, end_at).await?;
    println!("\nData for {} from {} to {}:", symbol, start, end);
    print_candles(&candles);
    Ok(())
}

async fn view_stats(store: &MySqlCandleStore) -> Result<()> {
    let stats = store.query_aggregate_stats().await?;
    if stats.is_empty() {
        println!("No data stored yet.");
        return Ok(());
    }

    let rows: Vec<StatsRow> = stats.iter().map(StatsRow::from).collect();
    println!("\nDatabase Statistics:");
    println!("{}", Table::new(rows).with(Style::psql()));
    Ok(())
}

fn print_candles(candles: &[Candle]) {
    if candles.is_empty() {
        println!("No rows found.");
        return;
    }
    let rows: Vec<CandleRow> = candles.iter().map(CandleRow::from).collect();
    println!("{}", Table::new(rows).with(Style::psql()));
}

fn fmt_price(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

/// Expand `YYYY-MM-DD` inputs to an inclusive UTC range covering both whole days.
fn parse_day_bounds(start: &str, end: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_day = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    let end_day = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
    let start_at = start_day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid start date"))?
        .and_utc();
    let end_at = end_day
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| anyhow!("invalid end date"))?
        .and_utc();
    Ok((start_at, end_at))
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
