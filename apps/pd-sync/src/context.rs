//! Wiring from configuration to the library components.

use std::sync::Arc;
use tracing::{info, warn};

use pagerduty_catalog::{
    build_pagerduty_client, AppConfig, CatalogClient, InMemoryMappingStore, MappingService,
    MappingStore, PgMappingStore, TokenResolver,
};

use crate::error::CliResult;

/// Everything a command needs.
pub struct AppContext {
    pub resolver: Arc<TokenResolver>,
    pub service: MappingService,
}

impl AppContext {
    /// Load `.env`, the YAML file and env overrides, then build the components.
    pub async fn load() -> CliResult<Self> {
        dotenvy::dotenv().ok();

        let path = AppConfig::config_path();
        let mut config = AppConfig::from_file(&path)?;
        config.apply_env_overrides();
        info!(
            config = %path,
            legacy = config.pager_duty.is_legacy(),
            "Loaded configuration"
        );

        Self::from_config(&config).await
    }

    pub async fn from_config(config: &AppConfig) -> CliResult<Self> {
        let (resolver, client) = build_pagerduty_client(config)?;
        let catalog = CatalogClient::new(&config.catalog, config.http.build_client()?)?;

        let store: Arc<dyn MappingStore> = match &config.database {
            Some(db) => {
                let store = PgMappingStore::connect(db).await?;
                store.migrate().await?;
                Arc::new(store)
            }
            None => {
                warn!("No database configured; mappings are kept in memory for this run only");
                Arc::new(InMemoryMappingStore::new())
            }
        };

        let service = MappingService::new(Arc::new(catalog), Arc::new(client), store);
        Ok(Self { resolver, service })
    }
}
