use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_stock_transactions_table::Migration),
            Box::new(m20240101_000003_create_stock_checkpoints_table::Migration),
            Box::new(m20240101_000004_create_daily_ledgers_table::Migration),
            Box::new(m20240101_000005_create_bom_lines_table::Migration),
        ]
    }
}

mod m20240101_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Code)
                                .string()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(ColumnDef::new(Products::Unit).string().null())
                        .col(
                            ColumnDef::new(Products::SafetyStock)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::LeadTimeDays)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CurrentStock)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_is_active")
                        .table(Products::Table)
                        .col(Products::IsActive)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Code,
        Name,
        Category,
        Unit,
        SafetyStock,
        LeadTimeDays,
        IsActive,
        CurrentStock,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_stock_transactions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TransactionType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::PreviousStock)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::NewStock)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::OccurredAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransactions::Reason).string().null())
                        .col(ColumnDef::new(StockTransactions::Memo).string().null())
                        .col(ColumnDef::new(StockTransactions::Location).string().null())
                        .col(
                            ColumnDef::new(StockTransactions::CreatedBy)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::AffectsCurrentStock)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CheckpointId)
                                .uuid()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transactions_product_occurred")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::ProductCode)
                        .col(StockTransactions::OccurredAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transactions_checkpoint_id")
                        .table(StockTransactions::Table)
                        .col(StockTransactions::CheckpointId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockTransactions {
        Table,
        Id,
        ProductCode,
        TransactionType,
        Quantity,
        PreviousStock,
        NewStock,
        OccurredAt,
        Reason,
        Memo,
        Location,
        CreatedBy,
        AffectsCurrentStock,
        CheckpointId,
        CreatedAt,
    }
}

mod m20240101_000003_create_stock_checkpoints_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_stock_checkpoints_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockCheckpoints::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockCheckpoints::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCheckpoints::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCheckpoints::CheckpointType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCheckpoints::ConfirmedStock)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockCheckpoints::ConfirmedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockCheckpoints::Reason).string().null())
                        .col(
                            ColumnDef::new(StockCheckpoints::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(StockCheckpoints::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_checkpoints_product_confirmed")
                        .table(StockCheckpoints::Table)
                        .col(StockCheckpoints::ProductCode)
                        .col(StockCheckpoints::ConfirmedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockCheckpoints::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockCheckpoints {
        Table,
        Id,
        ProductCode,
        CheckpointType,
        ConfirmedStock,
        ConfirmedAt,
        Reason,
        IsActive,
        CreatedAt,
    }
}

mod m20240101_000004_create_daily_ledgers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_daily_ledgers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DailyLedgers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DailyLedgers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DailyLedgers::LedgerDate).date().not_null())
                        .col(
                            ColumnDef::new(DailyLedgers::ProductCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DailyLedgers::BeginningStock)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DailyLedgers::TotalInbound)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyLedgers::TotalOutbound)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyLedgers::Adjustments)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(DailyLedgers::EndingStock)
                                .big_integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Uniqueness on (date, product) is the duplicate-ledger guard.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_daily_ledgers_date_product")
                        .table(DailyLedgers::Table)
                        .col(DailyLedgers::LedgerDate)
                        .col(DailyLedgers::ProductCode)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DailyLedgers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum DailyLedgers {
        Table,
        Id,
        LedgerDate,
        ProductCode,
        BeginningStock,
        TotalInbound,
        TotalOutbound,
        Adjustments,
        EndingStock,
    }
}

mod m20240101_000005_create_bom_lines_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_bom_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BomLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BomLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BomLines::ParentCode).string().not_null())
                        .col(ColumnDef::new(BomLines::ComponentCode).string().not_null())
                        .col(
                            ColumnDef::new(BomLines::QuantityPerSet)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BomLines::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_bom_lines_parent_component")
                        .table(BomLines::Table)
                        .col(BomLines::ParentCode)
                        .col(BomLines::ComponentCode)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BomLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum BomLines {
        Table,
        Id,
        ParentCode,
        ComponentCode,
        QuantityPerSet,
        CreatedAt,
    }
}
