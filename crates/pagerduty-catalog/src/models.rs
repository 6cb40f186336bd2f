//! Value types shared by the client, the store and the reconciler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Entity annotation carrying the PagerDuty service id.
pub const SERVICE_ID_ANNOTATION: &str = "pagerduty.com/service-id";

/// Entity annotation carrying a PagerDuty integration key.
pub const INTEGRATION_KEY_ANNOTATION: &str = "pagerduty.com/integration-key";

/// Entity annotation naming the PagerDuty account the entity belongs to.
pub const ACCOUNT_ANNOTATION: &str = "pagerduty.com/account";

/// Vendor id of the Backstage integration on a PagerDuty service.
pub const BACKSTAGE_VENDOR_ID: &str = "PRO19CT";

/// An inbound integration configured on a PagerDuty service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIntegration {
    pub id: String,
    pub integration_key: String,
    pub vendor_id: String,
}

/// A PagerDuty service as seen by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteService {
    pub id: String,
    pub name: String,
    pub escalation_policy_name: String,
    /// Name of the first team, or empty.
    pub team_name: String,
    pub html_url: String,
    pub integrations: Vec<ServiceIntegration>,
    /// Account the service was listed from.
    pub account: String,
}

impl RemoteService {
    /// Integration key of the Backstage integration, if the service has one.
    #[must_use]
    pub fn backstage_integration_key(&self) -> Option<&str> {
        self.integrations
            .iter()
            .find(|i| i.vendor_id == BACKSTAGE_VENDOR_ID)
            .map(|i| i.integration_key.as_str())
    }
}

/// A persisted entity-to-service mapping. At most one row per `service_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    pub id: String,
    pub entity_ref: String,
    pub service_id: String,
    pub integration_key: String,
    pub account: String,
    pub processed_date: DateTime<Utc>,
}

/// Input for creating or replacing a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapping {
    pub service_id: String,
    #[serde(default)]
    pub entity_ref: String,
    #[serde(default)]
    pub integration_key: String,
    #[serde(default)]
    pub account: String,
}

/// Reconciliation outcome for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    InSync,
    OutOfSync,
    NotMapped,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::InSync => "InSync",
            SyncStatus::OutOfSync => "OutOfSync",
            SyncStatus::NotMapped => "NotMapped",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the reconciled view. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledMapping {
    pub service_id: String,
    pub service_name: String,
    pub service_url: String,
    pub team: String,
    pub escalation_policy: String,
    pub account: String,
    pub entity_ref: String,
    pub entity_name: String,
    pub integration_key: String,
    pub status: SyncStatus,
}

/// Metadata block of a catalog entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// A catalog entity, reduced to the fields this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    pub kind: String,
    pub metadata: EntityMetadata,
}

impl CatalogEntity {
    /// Convenience constructor used by callers that build entities by hand.
    pub fn new(kind: impl Into<String>, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            metadata: EntityMetadata {
                name: name.into(),
                namespace: namespace.map(str::to_string),
                ..Default::default()
            },
        }
    }

    /// Add an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .annotations
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Canonical lowercase `kind:namespace/name` reference.
    #[must_use]
    pub fn entity_ref(&self) -> String {
        let namespace = self
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or("default");
        format!("{}:{}/{}", self.kind, namespace, self.metadata.name).to_lowercase()
    }

    /// Non-empty annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Parsed form of an entity reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EntityRef {
    /// Parse `kind:namespace/name`, `kind:name` (default namespace) or a bare
    /// name (`default_kind` applies). Result is lowercase.
    #[must_use]
    pub fn parse(value: &str, default_kind: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let (kind, rest) = match value.split_once(':') {
            Some((kind, rest)) => (kind, rest),
            None => (default_kind, value),
        };
        let (namespace, name) = match rest.split_once('/') {
            Some((namespace, name)) => (namespace, name),
            None => ("default", rest),
        };
        if kind.is_empty() || namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            kind: kind.to_lowercase(),
            namespace: namespace.to_lowercase(),
            name: name.to_lowercase(),
        })
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.namespace, self.name)
    }
}
