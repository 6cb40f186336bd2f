//! Reconciliation engine for PagerDuty service mappings.
//!
//! Merges persisted mapping rows, the catalog reference index and the live
//! service list into one status-annotated row per service. Pure: no I/O, no
//! shared state, never fails.

use std::collections::HashMap;

use crate::indexer::CatalogReferenceIndex;
use crate::models::{CatalogEntity, MappingRecord, ReconciledMapping, RemoteService, SyncStatus};

/// Which side of the merge supplies the reported entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reported {
    Catalog,
    Persisted,
    Nothing,
}

/// Where the reported integration key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySource {
    Service,
    Persisted,
    Nothing,
}

/// One decision: status plus what to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Decision {
    status: SyncStatus,
    reported: Reported,
    key: KeySource,
}

/// Decision table over `(persisted row, its ref is set, catalog ref, refs equal)`.
fn decide(
    has_persisted: bool,
    persisted_ref_set: bool,
    has_catalog: bool,
    refs_equal: bool,
) -> Decision {
    let (status, reported, key) = match (has_persisted, persisted_ref_set, has_catalog, refs_equal) {
        (false, _, true, _) => (SyncStatus::InSync, Reported::Catalog, KeySource::Service),
        (false, _, false, _) => (SyncStatus::NotMapped, Reported::Nothing, KeySource::Nothing),
        (true, false, false, _) => (SyncStatus::NotMapped, Reported::Nothing, KeySource::Persisted),
        (true, true, false, _) => (SyncStatus::OutOfSync, Reported::Persisted, KeySource::Persisted),
        (true, _, true, false) => (SyncStatus::OutOfSync, Reported::Persisted, KeySource::Persisted),
        (true, _, true, true) => (SyncStatus::InSync, Reported::Catalog, KeySource::Persisted),
    };
    Decision {
        status,
        reported,
        key,
    }
}

/// Produce one row per service, sorted by service name.
#[must_use]
pub fn reconcile(
    persisted: &[MappingRecord],
    index: &CatalogReferenceIndex,
    entities: &[CatalogEntity],
    services: &[RemoteService],
) -> Vec<ReconciledMapping> {
    let by_service: HashMap<&str, &MappingRecord> = persisted
        .iter()
        .map(|m| (m.service_id.as_str(), m))
        .collect();
    let names: HashMap<String, &str> = entities
        .iter()
        .map(|e| (e.entity_ref(), e.metadata.name.as_str()))
        .collect();
    let entity_name = |entity_ref: &str| -> String {
        names
            .get(&entity_ref.to_lowercase())
            .map(|n| (*n).to_string())
            .unwrap_or_default()
    };

    let mut rows: Vec<ReconciledMapping> = services
        .iter()
        .map(|service| {
            let record = by_service.get(service.id.as_str()).copied();
            let catalog = index.get(&service.id);

            let persisted_ref = record.map(|m| m.entity_ref.as_str()).unwrap_or("");
            let catalog_ref = catalog.map(|c| c.entity_ref.as_str()).unwrap_or("");

            let decision = decide(
                record.is_some(),
                !persisted_ref.is_empty(),
                catalog.is_some(),
                persisted_ref == catalog_ref,
            );

            let (entity_ref, name) = match (decision.reported, catalog) {
                (Reported::Catalog, Some(c)) => (c.entity_ref.clone(), c.entity_name.clone()),
                (Reported::Persisted, _) => (persisted_ref.to_string(), entity_name(persisted_ref)),
                _ => (String::new(), String::new()),
            };

            let integration_key = match decision.key {
                KeySource::Service => service
                    .backstage_integration_key()
                    .unwrap_or_default()
                    .to_string(),
                KeySource::Persisted => record
                    .map(|m| m.integration_key.clone())
                    .unwrap_or_default(),
                KeySource::Nothing => String::new(),
            };

            ReconciledMapping {
                service_id: service.id.clone(),
                service_name: service.name.clone(),
                service_url: service.html_url.clone(),
                team: service.team_name.clone(),
                escalation_policy: service.escalation_policy_name.clone(),
                account: service.account.clone(),
                entity_ref,
                entity_name: name,
                integration_key,
                status: decision.status,
            }
        })
        .collect();

    rows.sort_by(|a, b| a.service_name.cmp(&b.service_name));
    rows
}
