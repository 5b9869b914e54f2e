use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_order_tables::Migration),
            Box::new(m20240301_000003_create_stock_ledger_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Catalog::Dealers,
                Catalog::Factories,
                Catalog::ProductModels,
                Catalog::Colors,
                Catalog::MaterialItems,
                Catalog::StockLocations,
            ] {
                manager.create_table(catalog_table(table)).await?;
            }
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Catalog::StockLocations,
                Catalog::MaterialItems,
                Catalog::Colors,
                Catalog::ProductModels,
                Catalog::Factories,
                Catalog::Dealers,
            ] {
                manager
                    .drop_table(Table::drop().table(table).if_exists().to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    /// `{id, code, name, created_at}` reference table with a unique code.
    fn catalog_table(table: Catalog) -> TableCreateStatement {
        Table::create()
            .table(table)
            .if_not_exists()
            .col(ColumnDef::new(Catalog::Id).uuid().primary_key().not_null())
            .col(
                ColumnDef::new(Catalog::Code)
                    .string_len(64)
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Catalog::Name).string().not_null())
            .col(
                ColumnDef::new(Catalog::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .to_owned()
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum Catalog {
        Dealers,
        Factories,
        ProductModels,
        Colors,
        MaterialItems,
        StockLocations,
        Id,
        Code,
        Name,
        CreatedAt,
    }
}

mod m20240301_000002_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::DealerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ModelId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ColorId).uuid().not_null())
                        .col(ColumnDef::new(Orders::FactoryId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::DeliveryAddress).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentProofUrl).string().null())
                        .col(ColumnDef::new(Orders::SerialNumber).string().null())
                        .col(ColumnDef::new(Orders::RequestedShipDate).date().null())
                        .col(ColumnDef::new(Orders::PriorityRank).integer().null())
                        .col(ColumnDef::new(Orders::HardwareOptions).json().not_null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_dealer_id")
                        .table(Orders::Table)
                        .col(Orders::DealerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderHistory::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderHistory::Status).string_len(32).not_null())
                        .col(ColumnDef::new(OrderHistory::Comment).string().not_null())
                        .col(ColumnDef::new(OrderHistory::ActorId).uuid().not_null())
                        .col(ColumnDef::new(OrderHistory::ActorRole).string_len(16).not_null())
                        .col(
                            ColumnDef::new(OrderHistory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_history_order_id")
                                .from(OrderHistory::Table, OrderHistory::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_history_order_created")
                        .table(OrderHistory::Table)
                        .col(OrderHistory::OrderId)
                        .col(OrderHistory::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderMedia::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderMedia::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderMedia::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderMedia::DocType).string_len(32).not_null())
                        .col(ColumnDef::new(OrderMedia::Url).string().not_null())
                        .col(ColumnDef::new(OrderMedia::FileName).string().null())
                        .col(
                            ColumnDef::new(OrderMedia::VisibleToDealer)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(OrderMedia::UploadedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(OrderMedia::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_media_order_id")
                                .from(OrderMedia::Table, OrderMedia::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_media_order_doc_type")
                        .table(OrderMedia::Table)
                        .col(OrderMedia::OrderId)
                        .col(OrderMedia::DocType)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderMedia::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        OrderNumber,
        DealerId,
        ModelId,
        ColorId,
        FactoryId,
        Status,
        DeliveryAddress,
        PaymentProofUrl,
        SerialNumber,
        RequestedShipDate,
        PriorityRank,
        HardwareOptions,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderHistory {
        Table,
        Id,
        OrderId,
        Status,
        Comment,
        ActorId,
        ActorRole,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderMedia {
        Table,
        Id,
        OrderId,
        DocType,
        Url,
        FileName,
        VisibleToDealer,
        UploadedBy,
        CreatedAt,
    }
}

mod m20240301_000003_create_stock_ledger_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_stock_ledger_tables"
        }
    }

    /// Columns shared by both txn tables.
    fn txn_table(table: Ledger, stock_table: Ledger, fk_name: &str) -> TableCreateStatement {
        Table::create()
            .table(table)
            .if_not_exists()
            .col(ColumnDef::new(Txn::Id).uuid().primary_key().not_null())
            .col(ColumnDef::new(Txn::StockId).uuid().not_null())
            .col(ColumnDef::new(Txn::Kind).string_len(16).not_null())
            .col(ColumnDef::new(Txn::Quantity).integer().not_null())
            .col(ColumnDef::new(Txn::LinkedOrderId).uuid().null())
            .col(ColumnDef::new(Txn::Notes).string().null())
            .col(ColumnDef::new(Txn::CreatedBy).uuid().not_null())
            .col(
                ColumnDef::new(Txn::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(fk_name)
                    .from(table, Txn::StockId)
                    .to(stock_table, Txn::Id)
                    .on_delete(ForeignKeyAction::Restrict),
            )
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Ledger::FinishedGoodsStock)
                        .if_not_exists()
                        .col(ColumnDef::new(Stock::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stock::FactoryId).uuid().not_null())
                        .col(ColumnDef::new(Stock::ModelId).uuid().not_null())
                        .col(ColumnDef::new(Stock::ColorId).uuid().not_null())
                        .col(ColumnDef::new(Stock::Condition).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Stock::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Stock::Quantity).gte(0)),
                        )
                        .col(ColumnDef::new(Stock::Eta).date().null())
                        .col(ColumnDef::new(Stock::Notes).string().null())
                        .col(
                            ColumnDef::new(Stock::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stock::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_finished_goods_stock_key")
                        .table(Ledger::FinishedGoodsStock)
                        .col(Stock::FactoryId)
                        .col(Stock::ModelId)
                        .col(Stock::ColorId)
                        .col(Stock::Condition)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(txn_table(
                    Ledger::FinishedGoodsTxns,
                    Ledger::FinishedGoodsStock,
                    "fk_finished_goods_txns_stock_id",
                ))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_finished_goods_txns_stock_created")
                        .table(Ledger::FinishedGoodsTxns)
                        .col(Txn::StockId)
                        .col(Txn::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Ledger::MaterialStock)
                        .if_not_exists()
                        .col(ColumnDef::new(Stock::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Stock::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Stock::LocationId).uuid().not_null())
                        .col(
                            ColumnDef::new(Stock::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Stock::Quantity).gte(0)),
                        )
                        .col(ColumnDef::new(Stock::Eta).date().null())
                        .col(ColumnDef::new(Stock::Notes).string().null())
                        .col(
                            ColumnDef::new(Stock::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Stock::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_material_stock_key")
                        .table(Ledger::MaterialStock)
                        .col(Stock::ItemId)
                        .col(Stock::LocationId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(txn_table(
                    Ledger::MaterialTxns,
                    Ledger::MaterialStock,
                    "fk_material_txns_stock_id",
                ))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_material_txns_stock_created")
                        .table(Ledger::MaterialTxns)
                        .col(Txn::StockId)
                        .col(Txn::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                Ledger::MaterialTxns,
                Ledger::MaterialStock,
                Ledger::FinishedGoodsTxns,
                Ledger::FinishedGoodsStock,
            ] {
                manager
                    .drop_table(Table::drop().table(table).to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    enum Ledger {
        FinishedGoodsStock,
        FinishedGoodsTxns,
        MaterialStock,
        MaterialTxns,
    }

    #[derive(DeriveIden)]
    enum Stock {
        Id,
        FactoryId,
        ModelId,
        ColorId,
        Condition,
        ItemId,
        LocationId,
        Quantity,
        Eta,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Txn {
        Id,
        StockId,
        Kind,
        Quantity,
        LinkedOrderId,
        Notes,
        CreatedBy,
        CreatedAt,
    }
}
