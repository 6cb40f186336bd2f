//! Mock PagerDuty, identity and catalog endpoints on one wiremock server.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pagerduty_catalog::config::{AccountConfig, CatalogConfig, OAuthConfig, PagerDutyConfig};
use pagerduty_catalog::{
    AccountRegistry, CatalogClient, OAuthTokenAcquirer, PagerDutyClient, TokenResolver,
};

pub const STATIC_TOKEN: &str = "static-token-123";

pub struct MockPagerDuty {
    server: MockServer,
}

impl MockPagerDuty {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.uri())
    }

    pub fn catalog_base_url(&self) -> String {
        format!("{}/api/catalog", self.uri())
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Legacy static-token configuration pointing at this server.
    pub fn static_config(&self) -> PagerDutyConfig {
        PagerDutyConfig {
            api_token: Some(STATIC_TOKEN.to_string()),
            api_base_url: Some(self.uri()),
            ..Default::default()
        }
    }

    /// Legacy OAuth configuration pointing at this server.
    pub fn oauth_config(&self, sub_domain: &str) -> PagerDutyConfig {
        PagerDutyConfig {
            oauth: Some(oauth(sub_domain)),
            api_base_url: Some(self.uri()),
            ..Default::default()
        }
    }

    /// Multi-account configuration from `(id, is_default, static token)`.
    pub fn multi_config(&self, accounts: &[(&str, bool, &str)]) -> PagerDutyConfig {
        PagerDutyConfig {
            accounts: Some(
                accounts
                    .iter()
                    .map(|(id, is_default, token)| AccountConfig {
                        id: (*id).to_string(),
                        is_default: *is_default,
                        api_token: Some((*token).to_string()),
                        oauth: None,
                        api_base_url: Some(self.uri()),
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    // =========================================================================
    // Clients
    // =========================================================================

    pub fn resolver(&self, config: PagerDutyConfig) -> Arc<TokenResolver> {
        Arc::new(TokenResolver::new(
            config,
            Arc::new(AccountRegistry::new()),
            Arc::new(self.acquirer()),
        ))
    }

    pub fn acquirer(&self) -> OAuthTokenAcquirer {
        OAuthTokenAcquirer::with_token_url(reqwest::Client::new(), self.token_url())
    }

    pub fn client(&self, config: PagerDutyConfig) -> PagerDutyClient {
        PagerDutyClient::new(reqwest::Client::new(), self.resolver(config))
    }

    pub fn catalog_client(&self, token: Option<&str>) -> CatalogClient {
        CatalogClient::new(
            &CatalogConfig {
                base_url: self.catalog_base_url(),
                token: token.map(str::to_string),
            },
            reqwest::Client::new(),
        )
        .unwrap()
    }

    // =========================================================================
    // Identity endpoint mocks
    // =========================================================================

    pub async fn mock_oauth_token(&self, access_token: &str, expires_in: i64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "bearer",
                "expires_in": expires_in,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_oauth_status(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "rejected"
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // Services endpoint mocks
    // =========================================================================

    /// One page of `/services` at `offset`.
    pub async fn mock_services_page(&self, offset: usize, services: Vec<Value>, more: bool) {
        Mock::given(method("GET"))
            .and(path("/services"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": services,
                "limit": 50,
                "offset": offset,
                "more": more,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_services_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/services"))
            .respond_with(ResponseTemplate::new(status).set_body_string("error"))
            .mount(&self.server)
            .await;
    }
}

/// HTTP client that gives up after 200ms.
pub fn short_timeout_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap()
}

pub fn oauth(sub_domain: &str) -> OAuthConfig {
    OAuthConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        sub_domain: sub_domain.to_string(),
        region: None,
    }
}

/// A service body as returned by the REST API with all includes.
pub fn service_json(id: &str, name: &str, backstage_key: Option<&str>) -> Value {
    let integrations: Vec<Value> = backstage_key
        .map(|key| {
            vec![json!({
                "id": format!("I-{id}"),
                "type": "generic_events_api_inbound_integration",
                "integration_key": key,
                "vendor": { "id": "PRO19CT", "type": "vendor_reference" }
            })]
        })
        .unwrap_or_default();

    json!({
        "id": id,
        "name": name,
        "html_url": format!("https://acme.pagerduty.com/service-directory/{id}"),
        "escalation_policy": { "id": "EP1", "type": "escalation_policy", "name": "Primary" },
        "teams": [ { "id": "T1", "type": "team", "name": "Platform" } ],
        "integrations": integrations,
    })
}

/// A catalog entity body.
pub fn entity_json(name: &str, annotations: Value) -> Value {
    json!({
        "apiVersion": "backstage.io/v1alpha1",
        "kind": "Component",
        "metadata": {
            "name": name,
            "namespace": "default",
            "annotations": annotations,
        },
        "spec": { "type": "service" }
    })
}
