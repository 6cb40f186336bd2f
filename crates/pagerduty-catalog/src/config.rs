//! Configuration loading and types.
//!
//! The PagerDuty block accepts two shapes: a single ("legacy") account with
//! `apiToken` or `oauth` at the top level, or an `accounts` list where each
//! entry carries the same credential fields plus an `id` and `isDefault`.

use serde::Deserialize;
use std::path::Path;

use crate::error::{PagerDutyError, PagerDutyResult};

/// Default REST API base for US accounts.
pub const DEFAULT_API_BASE_URL: &str = "https://api.pagerduty.com";

/// REST API base for EU accounts.
pub const EU_API_BASE_URL: &str = "https://api.eu.pagerduty.com";

/// Identity endpoint for the client-credentials exchange.
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.pagerduty.com/oauth/token";

/// Account id used for the single account of a legacy configuration.
pub const LEGACY_ACCOUNT_ID: &str = "default";

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(rename = "pagerDuty", default)]
    pub pager_duty: PagerDutyConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub http: HttpConfig,
}

/// PagerDuty credentials, legacy or multi-account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagerDutyConfig {
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Presence of this list switches the integration to multi-account mode.
    #[serde(default)]
    pub accounts: Option<Vec<AccountConfig>>,
}

/// One independently credentialed PagerDuty account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub id: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

/// Client-credentials parameters for a scoped OAuth app.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub sub_domain: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("sub_domain", &self.sub_domain)
            .field("region", &self.region)
            .finish()
    }
}

impl OAuthConfig {
    /// Region with the `us` default applied.
    #[must_use]
    pub fn region_or_default(&self) -> &str {
        match self.region.as_deref() {
            Some(region) if !region.is_empty() => region,
            _ => "us",
        }
    }
}

/// Credential source for one account, after static/OAuth precedence.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(String),
    OAuth(OAuthConfig),
    None,
}

impl CredentialSource {
    fn from_parts(api_token: Option<&String>, oauth: Option<&OAuthConfig>) -> Self {
        match (api_token.filter(|t| !t.is_empty()), oauth) {
            (Some(token), _) => Self::Static(token.clone()),
            (None, Some(oauth)) => Self::OAuth(oauth.clone()),
            (None, None) => Self::None,
        }
    }
}

impl PagerDutyConfig {
    /// Whether the legacy single-account shape is in use.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.accounts.is_none()
    }

    /// Credential source of the legacy account.
    #[must_use]
    pub fn legacy_credentials(&self) -> CredentialSource {
        CredentialSource::from_parts(self.api_token.as_ref(), self.oauth.as_ref())
    }

    /// Find a configured account by id.
    #[must_use]
    pub fn account(&self, id: &str) -> Option<&AccountConfig> {
        self.accounts
            .as_deref()
            .and_then(|accounts| accounts.iter().find(|a| a.id == id))
    }

    /// The account that acts as default, if one can be determined.
    ///
    /// A single configured account is default even without `isDefault`;
    /// otherwise the first flagged account wins.
    #[must_use]
    pub fn default_account_id(&self) -> Option<String> {
        match self.accounts.as_deref() {
            None => Some(LEGACY_ACCOUNT_ID.to_string()),
            Some([only]) => Some(only.id.clone()),
            Some(accounts) => accounts
                .iter()
                .find(|a| a.is_default)
                .map(|a| a.id.clone()),
        }
    }

    /// REST API base URL for the given account.
    #[must_use]
    pub fn api_base_url(&self, account_id: Option<&str>) -> String {
        let account_id = account_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_account_id());
        let (explicit, oauth) = match account_id.as_deref().and_then(|id| self.account(id)) {
            Some(account) => (account.api_base_url.as_ref(), account.oauth.as_ref()),
            None => (self.api_base_url.as_ref(), self.oauth.as_ref()),
        };
        if let Some(url) = explicit.filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        match oauth.map(OAuthConfig::region_or_default) {
            Some("eu") => EU_API_BASE_URL.to_string(),
            _ => DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl AccountConfig {
    /// Credential source with static-token precedence over OAuth.
    #[must_use]
    pub fn credentials(&self) -> CredentialSource {
        CredentialSource::from_parts(self.api_token.as_ref(), self.oauth.as_ref())
    }
}

/// Catalog API connection settings.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            token: None,
        }
    }
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn default_catalog_base_url() -> String {
    "http://localhost:7007/api/catalog".to_string()
}

/// Postgres settings for the mapping store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Outbound HTTP settings shared by every remote call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            identity_url: default_identity_url(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

impl HttpConfig {
    /// Build the shared HTTP client with the configured timeout.
    pub fn build_client(&self) -> PagerDutyResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .user_agent(concat!("pagerduty-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PagerDutyError::Configuration(format!("failed to build HTTP client: {e}")))
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PagerDutyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PagerDutyError::Configuration(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> PagerDutyResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| PagerDutyError::Configuration(format!("failed to parse config: {e}")))
    }

    /// Configuration file path from the environment, or the default.
    #[must_use]
    pub fn config_path() -> String {
        std::env::var("PD_SYNC_CONFIG").unwrap_or_else(|_| "./config/pd-sync.yaml".to_string())
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("PAGERDUTY_API_TOKEN") {
            if !token.is_empty() && self.pager_duty.is_legacy() {
                self.pager_duty.api_token = Some(token);
            }
        }
        if let Ok(url) = std::env::var("CATALOG_BASE_URL") {
            self.catalog.base_url = url;
        }
        if let Ok(token) = std::env::var("CATALOG_TOKEN") {
            self.catalog.token = Some(token);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            match self.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_YAML: &str = r"
pagerDuty:
  oauth:
    clientId: client
    clientSecret: secret
    subDomain: acme
    region: eu
catalog:
  baseUrl: http://catalog.internal/api/catalog
";

    const MULTI_YAML: &str = r"
pagerDuty:
  accounts:
    - id: us-ops
      apiToken: static-token
    - id: eu-ops
      isDefault: true
      apiBaseUrl: https://api.eu.pagerduty.com/
      oauth:
        clientId: client
        clientSecret: secret
        subDomain: acme-eu
http:
  timeoutSecs: 5
";

    #[test]
    fn test_parse_legacy_shape() {
        let config = AppConfig::from_yaml(LEGACY_YAML).unwrap();
        assert!(config.pager_duty.is_legacy());
        assert!(matches!(
            config.pager_duty.legacy_credentials(),
            CredentialSource::OAuth(_)
        ));
        assert_eq!(
            config.pager_duty.default_account_id().as_deref(),
            Some(LEGACY_ACCOUNT_ID)
        );
        assert_eq!(config.pager_duty.api_base_url(None), EU_API_BASE_URL);
        assert_eq!(config.catalog.base_url, "http://catalog.internal/api/catalog");
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_parse_multi_account_shape() {
        let config = AppConfig::from_yaml(MULTI_YAML).unwrap();
        let pd = &config.pager_duty;
        assert!(!pd.is_legacy());
        assert_eq!(pd.default_account_id().as_deref(), Some("eu-ops"));
        assert!(matches!(
            pd.account("us-ops").unwrap().credentials(),
            CredentialSource::Static(ref t) if t == "static-token"
        ));
        assert_eq!(pd.api_base_url(Some("eu-ops")), EU_API_BASE_URL);
        assert_eq!(pd.api_base_url(Some("us-ops")), DEFAULT_API_BASE_URL);
        // No account given: the default account's region applies.
        assert_eq!(pd.api_base_url(None), EU_API_BASE_URL);
        assert_eq!(config.http.timeout_secs, 5);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_single_account_is_implicit_default() {
        let pd = PagerDutyConfig {
            accounts: Some(vec![AccountConfig {
                id: "solo".to_string(),
                api_token: Some("t".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert_eq!(pd.default_account_id().as_deref(), Some("solo"));
    }

    #[test]
    fn test_first_flagged_default_wins() {
        let pd = PagerDutyConfig {
            accounts: Some(vec![
                AccountConfig {
                    id: "a".to_string(),
                    ..Default::default()
                },
                AccountConfig {
                    id: "b".to_string(),
                    is_default: true,
                    ..Default::default()
                },
                AccountConfig {
                    id: "c".to_string(),
                    is_default: true,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        assert_eq!(pd.default_account_id().as_deref(), Some("b"));
    }

    #[test]
    fn test_no_default_among_several_accounts() {
        let pd = PagerDutyConfig {
            accounts: Some(vec![
                AccountConfig {
                    id: "a".to_string(),
                    ..Default::default()
                },
                AccountConfig {
                    id: "b".to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        assert!(pd.default_account_id().is_none());
    }

    #[test]
    fn test_static_token_takes_precedence() {
        let account = AccountConfig {
            id: "a".to_string(),
            api_token: Some("tok".to_string()),
            oauth: Some(OAuthConfig::default()),
            ..Default::default()
        };
        assert!(matches!(account.credentials(), CredentialSource::Static(_)));

        let empty_token = AccountConfig {
            id: "a".to_string(),
            api_token: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(empty_token.credentials(), CredentialSource::None));
    }

    #[test]
    fn test_oauth_debug_redacts_secret() {
        let oauth = OAuthConfig {
            client_id: "id".to_string(),
            client_secret: "super-secret".to_string(),
            sub_domain: "acme".to_string(),
            region: None,
        };
        let rendered = format!("{oauth:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert_eq!(oauth.region_or_default(), "us");
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            AppConfig::from_yaml(include_str!("../../../config/pd-sync.example.yaml")).unwrap();
        assert_eq!(config.pager_duty.default_account_id().as_deref(), Some("us-ops"));
        assert_eq!(config.pager_duty.api_base_url(Some("eu-ops")), EU_API_BASE_URL);
        assert_eq!(config.database.map(|d| d.max_connections), Some(5));
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let err = AppConfig::from_yaml("pagerDuty: [").unwrap_err();
        assert!(err.is_configuration());
    }
}
