use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_menu_tables::Migration),
            Box::new(m20240601_000002_create_purchase_tables::Migration),
            Box::new(m20240601_000003_create_reservations_table::Migration),
            Box::new(m20240601_000004_create_settings_and_profiles::Migration),
            Box::new(m20240601_000005_seed_payment_settings::Migration),
        ]
    }
}

mod m20240601_000001_create_menu_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_menu_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Categories::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Categories::Name).string().not_null())
                        .col(ColumnDef::new(Categories::Description).string().null())
                        .col(
                            ColumnDef::new(Categories::SortOrder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Categories::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MenuItems::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(MenuItems::CategoryId).uuid().null())
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(ColumnDef::new(MenuItems::Description).string().null())
                        .col(ColumnDef::new(MenuItems::Price).big_integer().not_null())
                        .col(ColumnDef::new(MenuItems::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(MenuItems::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(MenuItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_menu_items_category")
                                .from(MenuItems::Table, MenuItems::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_menu_items_category_id")
                        .table(MenuItems::Table)
                        .col(MenuItems::CategoryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Categories {
        Table,
        Id,
        Name,
        Description,
        SortOrder,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum MenuItems {
        Table,
        Id,
        CategoryId,
        Name,
        Description,
        Price,
        ImageUrl,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000002_create_purchase_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_purchase_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Purchases::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Purchases::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Purchases::UserId).uuid().not_null())
                        .col(ColumnDef::new(Purchases::CustomerName).string().not_null())
                        .col(ColumnDef::new(Purchases::Phone).string().not_null())
                        .col(ColumnDef::new(Purchases::Address).string().null())
                        .col(ColumnDef::new(Purchases::Items).json().not_null())
                        .col(
                            ColumnDef::new(Purchases::TotalAmount)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::PaymentMethod)
                                .string_len(20)
                                .not_null()
                                .check(Expr::col(Purchases::PaymentMethod).is_in([
                                    "qris",
                                    "bank_transfer",
                                    "ewallet",
                                ])),
                        )
                        .col(ColumnDef::new(Purchases::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Purchases::PaymentStatus)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::PaymentDeadline)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Purchases::PaymentProofId).uuid().null())
                        .col(
                            ColumnDef::new(Purchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Purchases::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_purchases_user_id", Purchases::UserId),
                ("idx_purchases_status", Purchases::Status),
                ("idx_purchases_payment_status", Purchases::PaymentStatus),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Purchases::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(PaymentProofs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentProofs::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PaymentProofs::PurchaseId).uuid().not_null())
                        .col(ColumnDef::new(PaymentProofs::UserId).uuid().not_null())
                        .col(ColumnDef::new(PaymentProofs::ImageUrl).string().not_null())
                        .col(
                            ColumnDef::new(PaymentProofs::StoragePath)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentProofs::VerificationStatus)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(PaymentProofs::UploadedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PaymentProofs::VerifiedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(PaymentProofs::VerifiedBy).uuid().null())
                        .col(ColumnDef::new(PaymentProofs::Notes).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payment_proofs_purchase")
                                .from(PaymentProofs::Table, PaymentProofs::PurchaseId)
                                .to(Purchases::Table, Purchases::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payment_proofs_purchase_id")
                        .table(PaymentProofs::Table)
                        .col(PaymentProofs::PurchaseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PaymentProofs::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Purchases::Table).to_owned())
                .await
        }
    }

    #[derive(Iden, Clone, Copy)]
    pub enum Purchases {
        Table,
        Id,
        UserId,
        CustomerName,
        Phone,
        Address,
        Items,
        TotalAmount,
        PaymentMethod,
        Status,
        PaymentStatus,
        PaymentDeadline,
        PaymentProofId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum PaymentProofs {
        Table,
        Id,
        PurchaseId,
        UserId,
        ImageUrl,
        StoragePath,
        VerificationStatus,
        UploadedAt,
        VerifiedAt,
        VerifiedBy,
        Notes,
    }
}

mod m20240601_000003_create_reservations_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Reservations::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Reservations::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Reservations::CustomerName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::Phone).string().not_null())
                        .col(ColumnDef::new(Reservations::Email).string().null())
                        .col(
                            ColumnDef::new(Reservations::ReservationDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::ReservationTime)
                                .time()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::GuestCount).integer().not_null())
                        .col(ColumnDef::new(Reservations::Notes).string().null())
                        .col(
                            ColumnDef::new(Reservations::Status)
                                .string_len(20)
                                .not_null()
                                .default("Menunggu"),
                        )
                        .col(
                            ColumnDef::new(Reservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::UpdatedAt)
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
                        .name("idx_reservations_status")
                        .table(Reservations::Table)
                        .col(Reservations::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reservations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Reservations {
        Table,
        Id,
        UserId,
        CustomerName,
        Phone,
        Email,
        ReservationDate,
        ReservationTime,
        GuestCount,
        Notes,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000004_create_settings_and_profiles {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_settings_and_profiles"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AppSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AppSettings::Key)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AppSettings::Value).json().not_null())
                        .col(ColumnDef::new(AppSettings::Category).string().not_null())
                        .col(ColumnDef::new(AppSettings::Description).string().null())
                        .col(
                            ColumnDef::new(AppSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Profiles::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Profiles::FullName).string().not_null())
                        .col(ColumnDef::new(Profiles::Phone).string().null())
                        .col(
                            ColumnDef::new(Profiles::Role)
                                .string()
                                .not_null()
                                .default("customer"),
                        )
                        .col(
                            ColumnDef::new(Profiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Profiles::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(AppSettings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum AppSettings {
        Table,
        Key,
        Value,
        Category,
        Description,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Profiles {
        Table,
        Id,
        FullName,
        Phone,
        Role,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000005_seed_payment_settings {
    use super::m20240601_000004_create_settings_and_profiles::AppSettings;
    use sea_orm_migration::prelude::*;
    use serde_json::json;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000005_seed_payment_settings"
        }
    }

    const SEEDED_KEYS: [&str; 3] = ["payment.qris", "payment.bank_transfer", "payment.ewallets"];

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let now = chrono::Utc::now();
            let rows = [
                (
                    SEEDED_KEYS[0],
                    json!({ "enabled": false, "merchant_name": null, "image_url": null }),
                    "QRIS payment configuration",
                ),
                (
                    SEEDED_KEYS[1],
                    json!({ "enabled": false, "accounts": [] }),
                    "Bank transfer accounts",
                ),
                (
                    SEEDED_KEYS[2],
                    json!({ "enabled": false, "wallets": [] }),
                    "E-wallet accounts",
                ),
            ];

            let mut insert = Query::insert();
            insert.into_table(AppSettings::Table).columns([
                AppSettings::Key,
                AppSettings::Value,
                AppSettings::Category,
                AppSettings::Description,
                AppSettings::UpdatedAt,
            ]);
            for (key, value, description) in rows {
                let values: [SimpleExpr; 5] = [
                    key.into(),
                    value.into(),
                    "payment".into(),
                    description.into(),
                    now.into(),
                ];
                insert
                    .values(values)
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
            insert.on_conflict(OnConflict::column(AppSettings::Key).do_nothing().to_owned());

            manager.exec_stmt(insert).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let delete = Query::delete()
                .from_table(AppSettings::Table)
                .and_where(Expr::col(AppSettings::Key).is_in(SEEDED_KEYS))
                .to_owned();
            manager.exec_stmt(delete).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbBackend, Statement};

    #[tokio::test]
    async fn payment_method_check_constraint_rejects_unknown_values() {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let insert = |method: &str| {
            Statement::from_string(
                DbBackend::Sqlite,
                format!(
                    "INSERT INTO purchases (id, user_id, customer_name, phone, items, total_amount, \
                     payment_method, status, payment_status, payment_deadline, created_at, updated_at) \
                     VALUES ('{}', '{}', 'Budi', '081234567890', '[]', 0, '{}', 'Diproses', 'pending', \
                     '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
                    uuid::Uuid::new_v4(),
                    uuid::Uuid::new_v4(),
                    method
                ),
            )
        };

        assert!(db.execute(insert("qris")).await.is_ok());
        let err = db.execute(insert("cash")).await.unwrap_err();
        assert!(matches!(
            ServiceError::from_db(err),
            ServiceError::ConstraintViolation(_)
        ));
    }
}
