//! PagerDuty REST API v2 client.
//!
//! Every request resolves its authorization value through the
//! [`TokenResolver`], so static and OAuth accounts look the same here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{PagerDutyError, PagerDutyResult};
use crate::models::{RemoteService, ServiceIntegration};
use crate::resolver::TokenResolver;

/// Page size for service listing.
const FETCH_PAGE_SIZE: usize = 50;

/// Upper bound on services fetched per account.
///
/// Listing stops once the cap is reached, so the reconciled view of a larger
/// account covers only the first `MAX_REMOTE_SERVICES` services.
pub const MAX_REMOTE_SERVICES: usize = 10_000;

const ACCEPT_HEADER: &str = "application/vnd.pagerduty+json;version=2";

const SERVICE_INCLUDES: [(&str, &str); 3] = [
    ("include[]", "integrations"),
    ("include[]", "escalation_policies"),
    ("include[]", "teams"),
];

/// Read access to PagerDuty services.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Every service of one account (`None` = default account).
    async fn list_services(&self, account: Option<&str>) -> PagerDutyResult<Vec<RemoteService>>;

    /// Every service of every configured account.
    async fn list_all_services(&self) -> PagerDutyResult<Vec<RemoteService>>;

    /// One service by id.
    async fn get_service(
        &self,
        service_id: &str,
        account: Option<&str>,
    ) -> PagerDutyResult<RemoteService>;

    /// The service owning an integration key.
    async fn get_service_by_integration_key(
        &self,
        integration_key: &str,
        account: Option<&str>,
    ) -> PagerDutyResult<RemoteService>;
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiReference {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

impl ApiReference {
    fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.summary.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ApiVendor {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiIntegration {
    id: String,
    #[serde(default)]
    integration_key: Option<String>,
    #[serde(default)]
    vendor: Option<ApiVendor>,
}

#[derive(Debug, Deserialize)]
struct ApiService {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    escalation_policy: Option<ApiReference>,
    #[serde(default)]
    teams: Vec<ApiReference>,
    #[serde(default)]
    integrations: Vec<ApiIntegration>,
}

impl ApiService {
    fn into_remote(self, account: &str) -> RemoteService {
        RemoteService {
            id: self.id,
            name: self.name,
            escalation_policy_name: self
                .escalation_policy
                .as_ref()
                .map(ApiReference::display_name)
                .unwrap_or_default(),
            team_name: self
                .teams
                .first()
                .map(ApiReference::display_name)
                .unwrap_or_default(),
            html_url: self.html_url,
            integrations: self
                .integrations
                .into_iter()
                .map(|i| ServiceIntegration {
                    id: i.id,
                    integration_key: i.integration_key.unwrap_or_default(),
                    vendor_id: i.vendor.map(|v| v.id).unwrap_or_default(),
                })
                .collect(),
            account: account.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceListResponse {
    #[serde(default)]
    services: Vec<ApiService>,
    #[serde(default)]
    more: bool,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    service: ApiService,
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client for the PagerDuty REST API.
#[derive(Debug, Clone)]
pub struct PagerDutyClient {
    http_client: Client,
    resolver: Arc<TokenResolver>,
    max_services: usize,
}

impl PagerDutyClient {
    /// Create a client. The HTTP client should carry a bounded timeout.
    #[must_use]
    pub fn new(http_client: Client, resolver: Arc<TokenResolver>) -> Self {
        Self {
            http_client,
            resolver,
            max_services: MAX_REMOTE_SERVICES,
        }
    }

    /// Override the per-account listing cap.
    #[must_use]
    pub fn with_max_services(mut self, max_services: usize) -> Self {
        self.max_services = max_services.max(1);
        self
    }

    /// Account label stamped on returned services.
    fn account_label(&self, account: Option<&str>) -> String {
        let config = self.resolver.config();
        match account.filter(|a| !a.is_empty()) {
            Some(a) if !config.is_legacy() => a.to_string(),
            _ => config.default_account_id().unwrap_or_default(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        account: Option<&str>,
        path: &str,
        query: &[(&str, String)],
    ) -> PagerDutyResult<T> {
        let token = self.resolver.resolve_token(account).await;
        if token.is_empty() {
            return Err(PagerDutyError::MissingCredential {
                account: self.account_label(account),
            });
        }

        let base_url = self.resolver.config().api_base_url(account);
        let url = format!("{base_url}{path}");
        debug!(url = %url, account = account.unwrap_or(""), "PagerDuty GET");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER)
            .query(&SERVICE_INCLUDES)
            .query(query)
            .send()
            .await
            .map_err(|e| PagerDutyError::transport("PagerDuty request failed", e))?;

        handle_response(response).await
    }
}

#[async_trait]
impl ServiceDirectory for PagerDutyClient {
    async fn list_services(&self, account: Option<&str>) -> PagerDutyResult<Vec<RemoteService>> {
        let label = self.account_label(account);
        let mut services = Vec::new();
        let mut offset = 0usize;

        loop {
            let page: ServiceListResponse = self
                .get_json(
                    account,
                    "/services",
                    &[
                        ("limit", FETCH_PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                        ("time_zone", "UTC".to_string()),
                    ],
                )
                .await?;

            let fetched = page.services.len();
            services.extend(page.services.into_iter().map(|s| s.into_remote(&label)));

            if services.len() >= self.max_services {
                services.truncate(self.max_services);
                warn!(
                    account = %label,
                    cap = self.max_services,
                    "Reached service listing cap, remaining services are not listed"
                );
                break;
            }
            if !page.more || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        debug!(account = %label, count = services.len(), "Fetched PagerDuty services");
        Ok(services)
    }

    async fn list_all_services(&self) -> PagerDutyResult<Vec<RemoteService>> {
        if self.resolver.config().is_legacy() {
            return self.list_services(None).await;
        }

        let mut all = Vec::new();
        for account in self.resolver.account_ids().await {
            all.extend(self.list_services(Some(&account)).await?);
        }
        Ok(all)
    }

    async fn get_service(
        &self,
        service_id: &str,
        account: Option<&str>,
    ) -> PagerDutyResult<RemoteService> {
        let label = self.account_label(account);
        let response: ServiceResponse = self
            .get_json(account, &format!("/services/{service_id}"), &[])
            .await?;
        Ok(response.service.into_remote(&label))
    }

    async fn get_service_by_integration_key(
        &self,
        integration_key: &str,
        account: Option<&str>,
    ) -> PagerDutyResult<RemoteService> {
        let label = self.account_label(account);
        let page: ServiceListResponse = self
            .get_json(
                account,
                "/services",
                &[
                    ("query", integration_key.to_string()),
                    ("time_zone", "UTC".to_string()),
                ],
            )
            .await?;

        if page.services.is_empty() {
            return Err(PagerDutyError::NotFound {
                status: 404,
                message: "no service found for integration key".to_string(),
            });
        }

        let mut services: Vec<RemoteService> = page
            .services
            .into_iter()
            .map(|s| s.into_remote(&label))
            .collect();

        // Prefer the service that actually owns the key; the query is a fuzzy match.
        let owner = services
            .iter()
            .position(|s| {
                s.integrations
                    .iter()
                    .any(|i| i.integration_key == integration_key)
            })
            .unwrap_or(0);
        Ok(services.swap_remove(owner))
    }
}

/// Map a PagerDuty response to a value or a classified error.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> PagerDutyResult<T> {
    let status = response.status();

    if status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| PagerDutyError::transport("failed to read response body", e))?;
        return serde_json::from_str(&body)
            .map_err(|e| PagerDutyError::parse(format!("failed to parse response: {e}")));
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());

    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PagerDutyError::Auth {
            status: code,
            message: body,
        }),
        StatusCode::NOT_FOUND => Err(PagerDutyError::NotFound {
            status: code,
            message: body,
        }),
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("PagerDuty rate limited, retry after {:?}s", retry_after);
            Err(PagerDutyError::RateLimited {
                status: code,
                retry_after_secs: retry_after,
            })
        }
        _ => {
            let message = if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body
            };
            Err(PagerDutyError::Api {
                status: code,
                message,
            })
        }
    }
}
