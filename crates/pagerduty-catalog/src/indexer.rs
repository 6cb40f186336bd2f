//! Catalog reference indexer.
//!
//! Maps PagerDuty service ids to the catalog entity that references them,
//! either directly through the service-id annotation or indirectly through
//! an integration key that has to be resolved against PagerDuty.

use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::ServiceDirectory;
use crate::models::{
    CatalogEntity, ACCOUNT_ANNOTATION, INTEGRATION_KEY_ANNOTATION, SERVICE_ID_ANNOTATION,
};

/// The catalog side of a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReference {
    /// Lowercase entity reference.
    pub entity_ref: String,
    pub entity_name: String,
}

/// `service_id -> CatalogReference`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReferenceIndex {
    entries: HashMap<String, CatalogReference>,
}

impl CatalogReferenceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the reference for a service.
    pub fn insert(&mut self, service_id: impl Into<String>, reference: CatalogReference) {
        self.entries.insert(service_id.into(), reference);
    }

    #[must_use]
    pub fn get(&self, service_id: &str) -> Option<&CatalogReference> {
        self.entries.get(service_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, CatalogReference)> for CatalogReferenceIndex {
    fn from_iter<I: IntoIterator<Item = (String, CatalogReference)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Build the index from annotated entities.
///
/// Entities are resolved concurrently. An entity whose integration key
/// cannot be resolved is skipped; it never fails the whole build. When two
/// entities point at the same service the later one in `entities` wins.
pub async fn build(
    entities: &[CatalogEntity],
    directory: &dyn ServiceDirectory,
) -> CatalogReferenceIndex {
    let resolved = join_all(
        entities
            .iter()
            .map(|entity| resolve_entity(entity, directory)),
    )
    .await;

    let index: CatalogReferenceIndex = resolved.into_iter().flatten().collect();
    debug!(
        entities = entities.len(),
        indexed = index.len(),
        "Built catalog reference index"
    );
    index
}

async fn resolve_entity(
    entity: &CatalogEntity,
    directory: &dyn ServiceDirectory,
) -> Option<(String, CatalogReference)> {
    let service_id = match entity.annotation(SERVICE_ID_ANNOTATION) {
        Some(id) => id.to_string(),
        None => {
            let key = entity.annotation(INTEGRATION_KEY_ANNOTATION)?;
            resolve_integration_key(key, entity.annotation(ACCOUNT_ANNOTATION), directory).await?
        }
    };

    Some((
        service_id,
        CatalogReference {
            entity_ref: entity.entity_ref(),
            entity_name: entity.metadata.name.clone(),
        },
    ))
}

/// Service id owning `integration_key`, or `None` on any failure.
pub async fn resolve_integration_key(
    integration_key: &str,
    account: Option<&str>,
    directory: &dyn ServiceDirectory,
) -> Option<String> {
    match directory
        .get_service_by_integration_key(integration_key, account)
        .await
    {
        Ok(service) => Some(service.id),
        Err(e) => {
            warn!(
                account = account.unwrap_or(""),
                error = %e,
                "Could not resolve integration key, skipping entity"
            );
            None
        }
    }
}
