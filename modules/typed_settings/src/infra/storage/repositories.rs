//! SeaORM repository implementation

use crate::contract::RepositoryError;
use crate::domain::repository::{RepositoryResult, SettingsRepository};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{entity, mapper};

pub struct SeaOrmSettingsRepository {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSettingsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn key(group: &str, name: &str) -> (String, String) {
        (group.to_string(), name.to_string())
    }
}

#[async_trait]
impl SettingsRepository for SeaOrmSettingsRepository {
    async fn get_properties_in_group(
        &self,
        group: &str,
    ) -> RepositoryResult<BTreeMap<String, Value>> {
        let results = entity::Entity::find()
            .filter(entity::Column::Group.eq(group))
            .order_by_asc(entity::Column::Name)
            .all(&*self.db)
            .await?;

        Ok(mapper::into_properties(results))
    }

    async fn check_if_property_exists(&self, group: &str, name: &str) -> RepositoryResult<bool> {
        let count = entity::Entity::find_by_id(Self::key(group, name))
            .count(&*self.db)
            .await?;

        Ok(count > 0)
    }

    async fn get_property_payload(&self, group: &str, name: &str) -> RepositoryResult<Value> {
        entity::Entity::find_by_id(Self::key(group, name))
            .one(&*self.db)
            .await?
            .map(|m| m.payload)
            .ok_or_else(|| RepositoryError::NotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }

    async fn create_property(
        &self,
        group: &str,
        name: &str,
        payload: Value,
    ) -> RepositoryResult<()> {
        let active = mapper::new_property(group, name, payload, chrono::Utc::now());
        entity::Entity::insert(active)
            .exec_without_returning(&*self.db)
            .await?;

        Ok(())
    }

    async fn update_properties_in_group(
        &self,
        group: &str,
        properties: BTreeMap<String, Value>,
    ) -> RepositoryResult<()> {
        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;

        for (name, payload) in properties {
            let existing = entity::Entity::find_by_id(Self::key(group, &name))
                .one(&txn)
                .await?;

            match existing {
                Some(existing) => {
                    mapper::updated_property(existing, payload, now)
                        .update(&txn)
                        .await?;
                }
                None => {
                    entity::Entity::insert(mapper::new_property(group, &name, payload, now))
                        .exec_without_returning(&txn)
                        .await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn delete_properties_in_group(
        &self,
        group: &str,
        names: &[String],
    ) -> RepositoryResult<()> {
        entity::Entity::delete_many()
            .filter(entity::Column::Group.eq(group))
            .filter(entity::Column::Name.is_in(names.iter().cloned()))
            .exec(&*self.db)
            .await?;

        Ok(())
    }

    async fn lock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;

        for name in names {
            let existing = entity::lock::Entity::find_by_id(Self::key(group, name))
                .one(&txn)
                .await?;
            if existing.is_none() {
                entity::lock::Entity::insert(mapper::new_lock(group, name, now))
                    .exec_without_returning(&txn)
                    .await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn unlock_properties(&self, group: &str, names: &[String]) -> RepositoryResult<()> {
        entity::lock::Entity::delete_many()
            .filter(entity::lock::Column::Group.eq(group))
            .filter(entity::lock::Column::Name.is_in(names.iter().cloned()))
            .exec(&*self.db)
            .await?;

        Ok(())
    }

    async fn get_locked_properties(&self, group: &str) -> RepositoryResult<BTreeSet<String>> {
        let results = entity::lock::Entity::find()
            .filter(entity::lock::Column::Group.eq(group))
            .all(&*self.db)
            .await?;

        Ok(mapper::into_names(results))
    }
}
