use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Candles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Candles::Id).big_unsigned().auto_increment().primary_key())
                    .col(ColumnDef::new(Candles::Symbol).string_len(20).not_null())
                    .col(ColumnDef::new(Candles::Timestamp).timestamp().not_null())
                    .col(ColumnDef::new(Candles::Open).decimal_len(18, 8).not_null())
                    .col(ColumnDef::new(Candles::High).decimal_len(18, 8).not_null())
                    .col(ColumnDef::new(Candles::Low).decimal_len(18, 8).not_null())
                    .col(ColumnDef::new(Candles::Close).decimal_len(18, 8).not_null())
                    .col(ColumnDef::new(Candles::Volume).decimal_len(24, 8).not_null())
                    .col(ColumnDef::new(Candles::CreatedAt).timestamp().null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        // Re-ingestion of an existing (symbol, timestamp) must update, never duplicate.
        manager
            .create_index(
                Index::create()
                    .name("uq_candles_symbol_timestamp")
                    .table(Candles::Table)
                    .col(Candles::Symbol)
                    .col(Candles::Timestamp)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Per-symbol range scans.
        manager
            .create_index(
                Index::create()
                    .name("idx_candles_symbol_timestamp")
                    .table(Candles::Table)
                    .col(Candles::Symbol)
                    .col(Candles::Timestamp)
                    .to_owned(),
            )
            .await?;

        // Cross-symbol time-window scans.
        manager
            .create_index(
                Index::create()
                    .name("idx_candles_timestamp")
                    .table(Candles::Table)
                    .col(Candles::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Candles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Candles {
    Table,
    Id,
    Symbol,
    Timestamp,
    Open,
    High,
    Low,
    Close,
    Volume,
    CreatedAt,
}
