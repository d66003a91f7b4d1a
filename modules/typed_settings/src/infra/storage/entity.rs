//! SeaORM entities for database tables

use sea_orm::entity::prelude::*;

/// Settings property table entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Settings group (part of composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub group: String,

    /// Property name (part of composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    /// Raw payload as JSON
    pub payload: Json,

    /// Creation timestamp
    pub created_at: DateTimeUtc,

    /// Last update timestamp
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Locked property table
pub mod lock {
    use sea_orm::entity::prelude::*;

    /// One row per locked property
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "settings_locks")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub group: String,

        #[sea_orm(primary_key, auto_increment = false)]
        pub name: String,

        /// When the lock was taken
        pub locked_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
