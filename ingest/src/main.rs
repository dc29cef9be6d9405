use anyhow::{bail, Result};
use shared::{get_pool, BinanceClient, Config, MarketDataSource, MySqlCandleStore, SymbolOutcome};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting candle ingestion run...");

    let config = Config::from_env()?;
    let pool = get_pool(&config.database_url).await?;
    info!("Connected to database");

    let store = MySqlCandleStore::new(pool);
    let client = BinanceClient::new(&config.binance_base_url);

    let symbols = if config.ingest_all_usdt {
        info!("Discovering tradable USDT pairs from the exchange");
        client.list_tradable_symbols("USDT").await
    } else {
        config.symbols.clone()
    };
    if symbols.is_empty() {
        bail!("no symbols to ingest");
    }

    info!(
        "Ingesting {} symbols (interval {}, limit {})",
        symbols.len(),
        config.interval,
        config.fetch_limit
    );

    let report = shared::ingest::run(
        &client,
        &store,
        &symbols,
        &config.interval,
        config.fetch_limit,
        config.pace,
    )
    .await;

    for item in &report.reports {
        match &item.outcome {
            SymbolOutcome::Stored { rows } => info!("{}: stored {} rows", item.symbol, rows),
            SymbolOutcome::NoData => info!("{}: no data", item.symbol),
            SymbolOutcome::Failed { reason } => warn!("{}: failed ({})", item.symbol, reason),
        }
    }
    info!(
        "Run complete: {} stored, {} empty, {} failed, {} rows total",
        report.stored(),
        report.no_data(),
        report.failed().len(),
        report.total_rows()
    );

    Ok(())
}
