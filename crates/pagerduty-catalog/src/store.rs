//! Persistence for service mappings and settings.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::PagerDutyResult;
use crate::models::{MappingRecord, NewMapping};

/// Mapping table plus the settings key/value store.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn get_all_mappings(&self) -> PagerDutyResult<Vec<MappingRecord>>;

    /// The mapping whose entity ref equals `entity_ref` (case-insensitive).
    async fn find_mapping_by_entity_ref(
        &self,
        entity_ref: &str,
    ) -> PagerDutyResult<Option<MappingRecord>>;

    /// Insert or replace the row for `mapping.service_id`. Returns the row id.
    async fn upsert_mapping(&self, mapping: &NewMapping) -> PagerDutyResult<String>;

    async fn get_setting(&self, key: &str) -> PagerDutyResult<Option<String>>;

    async fn put_setting(&self, key: &str, value: &str) -> PagerDutyResult<()>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgMappingStore {
    pool: PgPool,
}

impl PgMappingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> PagerDutyResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded migrations.
    pub async fn migrate(&self) -> PagerDutyResult<()> {
        info!("Running mapping store migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn get_all_mappings(&self) -> PagerDutyResult<Vec<MappingRecord>> {
        let rows = sqlx::query_as::<_, MappingRecord>(
            r"
            SELECT id, entity_ref, service_id, integration_key, account, processed_date
            FROM pagerduty_service_mappings
            ORDER BY service_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_mapping_by_entity_ref(
        &self,
        entity_ref: &str,
    ) -> PagerDutyResult<Option<MappingRecord>> {
        let row = sqlx::query_as::<_, MappingRecord>(
            r"
            SELECT id, entity_ref, service_id, integration_key, account, processed_date
            FROM pagerduty_service_mappings
            WHERE entity_ref = LOWER($1)
            LIMIT 1
            ",
        )
        .bind(entity_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_mapping(&self, mapping: &NewMapping) -> PagerDutyResult<String> {
        let (id,): (String,) = sqlx::query_as(
            r"
            INSERT INTO pagerduty_service_mappings (
                id, service_id, entity_ref, integration_key, account, processed_date
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (service_id) DO UPDATE SET
                entity_ref = EXCLUDED.entity_ref,
                integration_key = EXCLUDED.integration_key,
                account = EXCLUDED.account,
                processed_date = EXCLUDED.processed_date
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&mapping.service_id)
        .bind(&mapping.entity_ref)
        .bind(&mapping.integration_key)
        .bind(&mapping.account)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(service_id = %mapping.service_id, id = %id, "Upserted service mapping");
        Ok(id)
    }

    async fn get_setting(&self, key: &str) -> PagerDutyResult<Option<String>> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM pagerduty_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.map(|(v,)| v))
    }

    async fn put_setting(&self, key: &str, value: &str) -> PagerDutyResult<()> {
        sqlx::query(
            r"
            INSERT INTO pagerduty_settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local store for tests and database-less runs.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    mappings: RwLock<Vec<MappingRecord>>,
    settings: RwLock<HashMap<String, String>>,
}

impl InMemoryMappingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn get_all_mappings(&self) -> PagerDutyResult<Vec<MappingRecord>> {
        let mut rows = self.mappings.read().await.clone();
        rows.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(rows)
    }

    async fn find_mapping_by_entity_ref(
        &self,
        entity_ref: &str,
    ) -> PagerDutyResult<Option<MappingRecord>> {
        let wanted = entity_ref.to_lowercase();
        Ok(self
            .mappings
            .read()
            .await
            .iter()
            .find(|m| m.entity_ref == wanted)
            .cloned())
    }

    async fn upsert_mapping(&self, mapping: &NewMapping) -> PagerDutyResult<String> {
        let mut rows = self.mappings.write().await;
        let now = Utc::now();

        if let Some(existing) = rows.iter_mut().find(|m| m.service_id == mapping.service_id) {
            existing.entity_ref.clone_from(&mapping.entity_ref);
            existing.integration_key.clone_from(&mapping.integration_key);
            existing.account.clone_from(&mapping.account);
            existing.processed_date = now;
            return Ok(existing.id.clone());
        }

        let id = Uuid::new_v4().to_string();
        rows.push(MappingRecord {
            id: id.clone(),
            entity_ref: mapping.entity_ref.clone(),
            service_id: mapping.service_id.clone(),
            integration_key: mapping.integration_key.clone(),
            account: mapping.account.clone(),
            processed_date: now,
        });
        Ok(id)
    }

    async fn get_setting(&self, key: &str) -> PagerDutyResult<Option<String>> {
        Ok(self.settings.read().await.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> PagerDutyResult<()> {
        self.settings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(service_id: &str, entity_ref: &str) -> NewMapping {
        NewMapping {
            service_id: service_id.to_string(),
            entity_ref: entity_ref.to_string(),
            integration_key: "key".to_string(),
            account: "us".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_service() {
        let store = InMemoryMappingStore::new();

        let first = store
            .upsert_mapping(&mapping("P1", "component:default/a"))
            .await
            .unwrap();
        let second = store
            .upsert_mapping(&mapping("P1", "component:default/b"))
            .await
            .unwrap();
        store
            .upsert_mapping(&mapping("P2", "component:default/c"))
            .await
            .unwrap();

        assert_eq!(first, second);
        let rows = store.get_all_mappings().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service_id, "P1");
        assert_eq!(rows[0].entity_ref, "component:default/b");
        assert!(Uuid::parse_str(&rows[0].id).is_ok());
    }

    #[tokio::test]
    async fn test_find_by_entity_ref_is_case_insensitive() {
        let store = InMemoryMappingStore::new();
        store
            .upsert_mapping(&mapping("P1", "component:default/checkout"))
            .await
            .unwrap();

        let found = store
            .find_mapping_by_entity_ref("Component:default/Checkout")
            .await
            .unwrap();
        assert_eq!(found.map(|m| m.service_id), Some("P1".to_string()));
        assert!(store
            .find_mapping_by_entity_ref("component:default/other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_settings_round_trip_and_overwrite() {
        let store = InMemoryMappingStore::new();
        assert_eq!(store.get_setting("missing").await.unwrap(), None);

        store.put_setting("theme", "dark").await.unwrap();
        store.put_setting("theme", "light").await.unwrap();
        assert_eq!(
            store.get_setting("theme").await.unwrap(),
            Some("light".to_string())
        );
    }
}
