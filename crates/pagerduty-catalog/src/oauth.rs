//! OAuth client-credentials exchange against the PagerDuty identity endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::{OAuthConfig, DEFAULT_IDENTITY_URL};
use crate::error::{PagerDutyError, PagerDutyResult};

/// Scopes requested for every scoped OAuth app token.
pub const OAUTH_SCOPES: &[&str] = &[
    "abilities.read",
    "analytics.read",
    "change_events.read",
    "escalation_policies.read",
    "incidents.read",
    "oncalls.read",
    "schedules.read",
    "services.read",
    "services.write",
    "standards.read",
    "teams.read",
    "users.read",
    "vendors.read",
];

/// Token returned by a successful exchange.
#[derive(Clone)]
pub struct AcquiredToken {
    /// Bearer-formatted authorization value.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AcquiredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquiredToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can turn client credentials into an access token.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    async fn acquire(&self, oauth: &OAuthConfig) -> PagerDutyResult<AcquiredToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Reject incomplete parameters before touching the network.
pub fn validate(oauth: &OAuthConfig) -> PagerDutyResult<()> {
    let missing: Vec<&str> = [
        ("clientId", oauth.client_id.as_str()),
        ("clientSecret", oauth.client_secret.as_str()),
        ("subDomain", oauth.sub_domain.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PagerDutyError::Configuration(format!(
            "missing required OAuth parameters: {}",
            missing.join(", ")
        )))
    }
}

/// Scope string: account audience followed by the fixed scope list.
#[must_use]
pub fn scope_for(oauth: &OAuthConfig) -> String {
    let audience = format!(
        "as_account-{}.{}",
        oauth.region_or_default(),
        oauth.sub_domain
    );
    std::iter::once(audience.as_str())
        .chain(OAUTH_SCOPES.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`TokenAcquirer`] backed by the identity HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OAuthTokenAcquirer {
    http_client: reqwest::Client,
    token_url: String,
}

impl OAuthTokenAcquirer {
    /// Acquirer for the production identity endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_token_url(http_client, DEFAULT_IDENTITY_URL)
    }

    /// Acquirer for a specific token URL.
    #[must_use]
    pub fn with_token_url(http_client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
        }
    }
}

#[async_trait]
impl TokenAcquirer for OAuthTokenAcquirer {
    async fn acquire(&self, oauth: &OAuthConfig) -> PagerDutyResult<AcquiredToken> {
        validate(oauth)?;

        let scope = scope_for(oauth);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        debug!(
            token_url = %self.token_url,
            sub_domain = %oauth.sub_domain,
            region = oauth.region_or_default(),
            "Requesting OAuth token"
        );

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| PagerDutyError::token_acquisition(&e))?;

        let status = response.status();
        match status {
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                return Err(PagerDutyError::InvalidArguments {
                    status: status.as_u16(),
                    message: format!("identity endpoint rejected the request: {body}"),
                });
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                return Err(PagerDutyError::InvalidCredentials {
                    status: status.as_u16(),
                    message: format!("identity endpoint rejected the client credentials: {body}"),
                });
            }
            _ => {}
        }

        let body = response.text().await.map_err(|e| {
            PagerDutyError::TokenAcquisition(format!("failed to read token response: {e}"))
        })?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| PagerDutyError::parse(format!("invalid token response: {e}")))?;

        Ok(AcquiredToken {
            token: format!("Bearer {}", parsed.access_token),
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in.max(0)),
        })
    }
}
