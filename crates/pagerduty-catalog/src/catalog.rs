//! Catalog capability and its REST client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::{PagerDutyError, PagerDutyResult};
use crate::models::{CatalogEntity, EntityRef, INTEGRATION_KEY_ANNOTATION, SERVICE_ID_ANNOTATION};

/// Entity filter, ORed across entries. Each entry is a `key` or `key=value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub conditions: Vec<String>,
}

impl EntityFilter {
    /// Entities carrying either PagerDuty annotation.
    #[must_use]
    pub fn pagerduty_annotated() -> Self {
        Self {
            conditions: vec![
                format!("metadata.annotations.{SERVICE_ID_ANNOTATION}"),
                format!("metadata.annotations.{INTEGRATION_KEY_ANNOTATION}"),
            ],
        }
    }
}

/// Read and refresh access to catalog entities.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_entities(&self, filter: &EntityFilter) -> PagerDutyResult<Vec<CatalogEntity>>;

    /// `Ok(None)` when the entity does not exist.
    async fn get_entity_by_ref(&self, entity_ref: &str) -> PagerDutyResult<Option<CatalogEntity>>;

    /// Ask the catalog to re-process an entity so annotation changes show up.
    async fn refresh_entity(&self, entity_ref: &str) -> PagerDutyResult<()>;
}

/// REST client for the catalog API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: url::Url,
    token: Option<String>,
    http_client: Client,
}

impl CatalogClient {
    /// Create a client from configuration.
    pub fn new(config: &CatalogConfig, http_client: Client) -> PagerDutyResult<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = url::Url::parse(&base).map_err(|e| {
            PagerDutyError::Configuration(format!("invalid catalog base URL '{}': {e}", config.base_url))
        })?;
        Ok(Self {
            base_url,
            token: config.token.clone().filter(|t| !t.is_empty()),
            http_client,
        })
    }

    fn url(&self, segments: &[&str]) -> PagerDutyResult<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PagerDutyError::Configuration("catalog base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_entities(&self, filter: &EntityFilter) -> PagerDutyResult<Vec<CatalogEntity>> {
        let url = self.url(&["entities"])?;
        let query: Vec<(&str, &str)> = filter
            .conditions
            .iter()
            .map(|c| ("filter", c.as_str()))
            .collect();
        debug!(url = %url, filters = query.len(), "Catalog list entities");

        let response = self
            .authorize(self.http_client.get(url).query(&query))
            .send()
            .await
            .map_err(|e| PagerDutyError::transport("catalog request failed", e))?;

        let body = check_status(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| PagerDutyError::parse(format!("failed to parse catalog entities: {e}")))
    }

    async fn get_entity_by_ref(&self, entity_ref: &str) -> PagerDutyResult<Option<CatalogEntity>> {
        let parsed = EntityRef::parse(entity_ref, "component").ok_or_else(|| {
            PagerDutyError::Configuration(format!("invalid entity reference '{entity_ref}'"))
        })?;
        let url = self.url(&[
            "entities",
            "by-name",
            &parsed.kind,
            &parsed.namespace,
            &parsed.name,
        ])?;
        debug!(url = %url, "Catalog get entity");

        let response = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| PagerDutyError::transport("catalog request failed", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = check_status(response).await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| PagerDutyError::parse(format!("failed to parse catalog entity: {e}")))
    }

    async fn refresh_entity(&self, entity_ref: &str) -> PagerDutyResult<()> {
        let url = self.url(&["refresh"])?;
        debug!(url = %url, entity_ref = %entity_ref, "Catalog refresh entity");

        let response = self
            .authorize(self.http_client.post(url))
            .json(&json!({ "entityRef": entity_ref }))
            .send()
            .await
            .map_err(|e| PagerDutyError::transport("catalog request failed", e))?;

        check_status(response).await.map(|_| ())
    }
}

/// Return the body of a successful response or a classified error.
async fn check_status(response: reqwest::Response) -> PagerDutyResult<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        return Ok(body);
    }

    let code = status.as_u16();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PagerDutyError::Auth {
            status: code,
            message: body,
        },
        StatusCode::NOT_FOUND => PagerDutyError::NotFound {
            status: code,
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => PagerDutyError::RateLimited {
            status: code,
            retry_after_secs: None,
        },
        _ => PagerDutyError::Api {
            status: code,
            message: body,
        },
    })
}
