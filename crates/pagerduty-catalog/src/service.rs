//! Mapping service consumed by the delivery layer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{CatalogApi, EntityFilter};
use crate::client::ServiceDirectory;
use crate::error::{PagerDutyError, PagerDutyResult};
use crate::indexer;
use crate::models::{MappingRecord, NewMapping, ReconciledMapping};
use crate::reconciler::reconcile;
use crate::store::MappingStore;

/// Composes the catalog, PagerDuty and the mapping store.
#[derive(Clone)]
pub struct MappingService {
    catalog: Arc<dyn CatalogApi>,
    directory: Arc<dyn ServiceDirectory>,
    store: Arc<dyn MappingStore>,
}

impl std::fmt::Debug for MappingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingService").finish_non_exhaustive()
    }
}

impl MappingService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        directory: Arc<dyn ServiceDirectory>,
        store: Arc<dyn MappingStore>,
    ) -> Self {
        Self {
            catalog,
            directory,
            store,
        }
    }

    /// One reconciled row per PagerDuty service across every account.
    pub async fn reconciled_mappings(&self) -> PagerDutyResult<Vec<ReconciledMapping>> {
        let entities = self
            .catalog
            .list_entities(&EntityFilter::pagerduty_annotated())
            .await?;
        let index = indexer::build(&entities, self.directory.as_ref()).await;
        let services = self.directory.list_all_services().await?;
        let persisted = self.store.get_all_mappings().await?;

        let rows = reconcile(&persisted, &index, &entities, &services);
        info!(
            entities = entities.len(),
            services = services.len(),
            persisted = persisted.len(),
            "Reconciled service mappings"
        );
        Ok(rows)
    }

    /// Persist a mapping and refresh the entities whose annotations it affects.
    ///
    /// The previously mapped entity, if any, is refreshed as well so it drops
    /// the stale association. Refresh failures are logged, not returned.
    pub async fn save_mapping(&self, mapping: NewMapping) -> PagerDutyResult<String> {
        if mapping.service_id.trim().is_empty() {
            return Err(PagerDutyError::InvalidArguments {
                status: 400,
                message: "serviceId is required".to_string(),
            });
        }

        let mapping = NewMapping {
            entity_ref: mapping.entity_ref.trim().to_lowercase(),
            ..mapping
        };

        let previous = self
            .store
            .get_all_mappings()
            .await?
            .into_iter()
            .find(|m| m.service_id == mapping.service_id)
            .map(|m| m.entity_ref)
            .filter(|r| !r.is_empty() && *r != mapping.entity_ref);

        let id = self.store.upsert_mapping(&mapping).await?;
        info!(
            service_id = %mapping.service_id,
            entity_ref = %mapping.entity_ref,
            "Saved service mapping"
        );

        if !mapping.entity_ref.is_empty() {
            self.refresh(&mapping.entity_ref).await;
        }
        if let Some(previous) = previous {
            self.refresh(&previous).await;
        }
        Ok(id)
    }

    /// The persisted mapping for an entity, if any.
    pub async fn mapping_for_entity(&self, entity_ref: &str) -> PagerDutyResult<Option<MappingRecord>> {
        self.store.find_mapping_by_entity_ref(entity_ref).await
    }

    pub async fn get_setting(&self, key: &str) -> PagerDutyResult<Option<String>> {
        self.store.get_setting(key).await
    }

    pub async fn put_setting(&self, key: &str, value: &str) -> PagerDutyResult<()> {
        self.store.put_setting(key, value).await
    }

    async fn refresh(&self, entity_ref: &str) {
        if let Err(e) = self.catalog.refresh_entity(entity_ref).await {
            warn!(entity_ref = %entity_ref, error = %e, "Catalog refresh failed");
        }
    }
}
