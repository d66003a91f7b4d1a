//! Storage tables for the database settings repository

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_settings::Migration),
            Box::new(m20250301_000002_create_settings_locks::Migration),
        ]
    }
}

mod m20250301_000001_create_settings {
    use super::*;

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Settings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Settings::Group).string().not_null())
                        .col(ColumnDef::new(Settings::Name).string().not_null())
                        .col(ColumnDef::new(Settings::Payload).json().not_null())
                        .col(
                            ColumnDef::new(Settings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .col(
                            ColumnDef::new(Settings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .primary_key(
                            Index::create()
                                .col(Settings::Group)
                                .col(Settings::Name),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_settings_group")
                        .table(Settings::Table)
                        .col(Settings::Group)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Settings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Settings {
        Table,
        Group,
        Name,
        Payload,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_settings_locks {
    use super::*;

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SettingsLocks::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SettingsLocks::Group).string().not_null())
                        .col(ColumnDef::new(SettingsLocks::Name).string().not_null())
                        .col(
                            ColumnDef::new(SettingsLocks::LockedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .primary_key(
                            Index::create()
                                .col(SettingsLocks::Group)
                                .col(SettingsLocks::Name),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SettingsLocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SettingsLocks {
        Table,
        Group,
        Name,
        LockedAt,
    }
}
