use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use shared::{get_pool, CandleStore, Config, MySqlCandleStore};
use std::io::Write;
use std::path::Path;

mod workbook;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let config = Config::from_env()?;
    let pool = get_pool(&config.database_url).await?;
    let store = MySqlCandleStore::new(pool);

    let export_dir = Path::new(&config.export_dir);
    std::fs::create_dir_all(export_dir)?;

    loop {
        println!("\nCrypto Data Excel Exporter");
        println!("1. Export single symbol");
        println!("2. Export all symbols");
        println!("3. Export single symbol with date range");
        println!("4. Export all symbols with date range");
        println!("5. List available symbols");
        println!("6. Exit");

        let choice = prompt("\nEnter your choice (1-6): ")?;
        let result = match choice.as_str() {
            "1" => export_single(&store, export_dir, None).await,
            "2" => export_all(&store, export_dir, None).await,
            "3" => {
                let range = prompt_date_range()?;
                export_single(&store, export_dir, Some(range)).await
            }
            "4" => {
                let range = prompt_date_range()?;
                export_all(&store, export_dir, Some(range)).await
            }
            "5" => list_symbols(&store).await,
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
    }
}

async fn export_single(
    store: &MySqlCandleStore,
    dir: &Path,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<()> {
    let symbol = prompt("Enter symbol (e.g., BTCUSDT): ")?.to_uppercase();

    let candles = match range {
        Some((start, end)) => store.query_range(&symbol, start, end).await?,
        None => store.query_symbol_history(&symbol).await?,
    };
    if candles.is_empty() {
        println!("No data stored for {}", symbol);
        return Ok(());
    }

    let path = workbook::export_single(dir, &symbol, &candles)?;
    println!("Data exported to {}", path.display());
    Ok(())
}

async fn export_all(
    store: &MySqlCandleStore,
    dir: &Path,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<()> {
    let symbols = store.query_symbols().await?;
    if symbols.is_empty() {
        println!("No data stored yet.");
        return Ok(());
    }

    let mut sheets = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let candles = match range {
            Some((start, end)) => store.query_range(&symbol, start, end).await?,
            None => store.query_symbol_history(&symbol).await?,
        };
        sheets.push((symbol, candles));
    }

    let path = workbook::export_workbook(dir, &sheets)?;
    println!("All data exported to {}", path.display());
    Ok(())
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

fn prompt_date_range() -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = prompt("Enter start date (YYYY-MM-DD): ")?;
    let end = prompt("Enter end date (YYYY-MM-DD): ")?;
    parse_day_bounds(&start, &end)
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
