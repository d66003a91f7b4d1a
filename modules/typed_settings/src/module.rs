//! Module declaration and lifecycle

use crate::config::{Config, RepositoryConfig};
use crate::domain::{
    AesGcmEncrypter, CastRegistry, EventPublisher, NoOpEventPublisher, RepositoryFactory,
    SettingsRegistry, SettingsRepository,
};
use crate::infra::{InMemorySettingsRepository, SeaOrmSettingsRepository};
use anyhow::Result;
use parking_lot::RwLock;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;

/// Typed settings module
///
/// Turns a [`Config`] into a ready [`SettingsRegistry`]: connects the
/// configured repositories, runs storage migrations and derives the
/// encryption key.
pub struct SettingsModule {
    config: RwLock<Config>,
    casts: RwLock<CastRegistry>,
    events: RwLock<Arc<dyn EventPublisher>>,
    registry: RwLock<Option<Arc<SettingsRegistry>>>,
}

impl Default for SettingsModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            casts: RwLock::new(CastRegistry::new()),
            events: RwLock::new(Arc::new(NoOpEventPublisher)),
            registry: RwLock::new(None),
        }
    }
}

impl SettingsModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom casts made available to every settings type
    pub fn with_casts(self, casts: CastRegistry) -> Self {
        *self.casts.write() = casts;
        self
    }

    pub fn with_event_publisher(self, events: Arc<dyn EventPublisher>) -> Self {
        *self.events.write() = events;
        self
    }

    pub async fn init(&self, cfg: Config) -> Result<Arc<SettingsRegistry>> {
        let mut repositories = RepositoryFactory::new(cfg.default_repository.clone());
        for (name, repo_cfg) in &cfg.repositories {
            let repository: Arc<dyn SettingsRepository> = match repo_cfg {
                RepositoryConfig::Memory => Arc::new(InMemorySettingsRepository::new()),
                RepositoryConfig::Database {
                    url,
                    run_migrations,
                } => {
                    let conn = Database::connect(url.as_str()).await?;
                    if *run_migrations {
                        Self::migrate(&conn).await?;
                    }
                    Arc::new(SeaOrmSettingsRepository::new(Arc::new(conn)))
                }
            };
            tracing::debug!(repository = %name, "configured settings repository");
            repositories.register(name.clone(), repository);
        }
        // Fail early instead of on the first settings type without a selector
        repositories.resolve(None)?;

        let casts = std::mem::take(&mut *self.casts.write());
        let events = self.events.read().clone();
        let mut registry = SettingsRegistry::new(repositories)
            .with_casts(casts)
            .with_event_publisher(events)
            .with_eager_load(cfg.eager_load);
        if let Some(secret) = cfg.encryption_key.as_deref() {
            registry = registry.with_encrypter(Arc::new(AesGcmEncrypter::from_secret(secret)));
        }

        let registry = Arc::new(registry);
        *self.registry.write() = Some(registry.clone());

        tracing::info!(
            default_repository = %cfg.default_repository,
            repositories = cfg.repositories.len(),
            encryption = cfg.encryption_key.is_some(),
            "Typed settings module initialized"
        );
        *self.config.write() = cfg;
        Ok(registry)
    }

    /// Create the storage tables of the database repository
    pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
        use crate::infra::storage::migrations::Migrator;
        use sea_orm_migration::MigratorTrait;

        Migrator::up(db, None).await?;
        tracing::info!("Typed settings migrations completed");
        Ok(())
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn registry(&self) -> Result<Arc<SettingsRegistry>> {
        self.registry
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Typed settings module not initialized"))
    }
}
