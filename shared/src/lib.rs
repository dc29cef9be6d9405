pub mod binance;
pub mod config;
pub mod database;
pub mod ingest;
pub mod models;
pub mod store;

pub use binance::{BinanceClient, MarketDataSource};
pub use config::Config;
pub use database::{get_pool, DbPool};
pub use ingest::{IngestReport, SymbolOutcome, SymbolReport};
pub use models::{Candle, SymbolSpan, SymbolStats};
pub use store::{CandleStore, MemoryCandleStore, MySqlCandleStore};
