//! Per-account credential cache.
//!
//! The [`AccountRegistry`] is owned by the hosting process and shared by
//! reference with the token resolver. Every write replaces one account's
//! whole [`AccountCredential`] under the registry lock, so a refresh either
//! lands completely or leaves the previous credential in place.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// How a credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Configured API token, never expires.
    Static,
    /// Client-credentials token with an expiry.
    OAuth,
}

/// Lifecycle state of a single account credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    Unset,
    StaticValid,
    OAuthValid,
    Expired,
}

/// Token state for one account.
///
/// The [`Debug`] impl redacts the token.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredential {
    /// Authorization header value; empty means unset.
    pub token: String,
    /// Expiry for OAuth tokens, `None` for static tokens.
    pub expires_at: Option<DateTime<Utc>>,
    pub kind: CredentialKind,
}

impl std::fmt::Debug for AccountCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredential")
            .field("token", &if self.token.is_empty() { "" } else { "[REDACTED]" })
            .field("expires_at", &self.expires_at)
            .field("kind", &self.kind)
            .finish()
    }
}

impl AccountCredential {
    /// A credential with no token.
    #[must_use]
    pub fn unset() -> Self {
        Self {
            token: String::new(),
            expires_at: None,
            kind: CredentialKind::Static,
        }
    }

    /// A non-expiring static API token.
    #[must_use]
    pub fn from_static(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
            kind: CredentialKind::Static,
        }
    }

    /// An OAuth token valid until `expires_at`.
    #[must_use]
    pub fn from_oauth(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
            kind: CredentialKind::OAuth,
        }
    }

    /// State of the credential at `now`.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if self.token.is_empty() {
            return CredentialState::Unset;
        }
        match self.kind {
            CredentialKind::Static => CredentialState::StaticValid,
            CredentialKind::OAuth => match self.expires_at {
                Some(exp) if now < exp => CredentialState::OAuthValid,
                _ => CredentialState::Expired,
            },
        }
    }

    /// Whether the token can be sent right now.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(
            self.state_at(Utc::now()),
            CredentialState::StaticValid | CredentialState::OAuthValid
        )
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    initialized: bool,
    legacy_mode: bool,
    default_account_id: Option<String>,
    accounts: HashMap<String, AccountCredential>,
}

/// Process-wide table of per-account credentials.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    state: RwLock<RegistryState>,
}

impl AccountRegistry {
    /// Create an empty, uninitialized registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a configuration load has completed at least once.
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Whether the registry holds a single legacy account.
    pub async fn is_legacy_mode(&self) -> bool {
        self.state.read().await.legacy_mode
    }

    /// Id of the default account, if one was resolved.
    pub async fn default_account_id(&self) -> Option<String> {
        self.state.read().await.default_account_id.clone()
    }

    /// Snapshot of one account's credential.
    pub async fn get(&self, account_id: &str) -> Option<AccountCredential> {
        self.state.read().await.accounts.get(account_id).cloned()
    }

    /// Ids of every known account, sorted.
    pub async fn account_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state.accounts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace one account's credential.
    pub async fn store(&self, account_id: &str, credential: AccountCredential) {
        let mut state = self.state.write().await;
        state.accounts.insert(account_id.to_string(), credential);
    }

    /// Register an account as unset unless it already has a credential.
    pub async fn ensure(&self, account_id: &str) {
        let mut state = self.state.write().await;
        state
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(AccountCredential::unset);
    }

    /// Record the outcome of a configuration load.
    ///
    /// Accounts that are no longer configured are dropped; credentials of the
    /// remaining accounts are kept until they are individually replaced.
    pub async fn apply_layout(
        &self,
        legacy_mode: bool,
        default_account_id: Option<String>,
        configured_ids: &[String],
    ) {
        let mut state = self.state.write().await;
        state.legacy_mode = legacy_mode;
        state.default_account_id = default_account_id;
        state
            .accounts
            .retain(|id, _| configured_ids.iter().any(|c| c == id));
        for id in configured_ids {
            state
                .accounts
                .entry(id.clone())
                .or_insert_with(AccountCredential::unset);
        }
    }

    /// Mark the registry as loaded.
    pub async fn mark_initialized(&self) {
        self.state.write().await.initialized = true;
    }
}
