//! Token resolution over the account registry.
//!
//! [`TokenResolver::load_configuration`] populates the registry from the
//! PagerDuty configuration block; [`TokenResolver::resolve_token`] hands out
//! a usable authorization value for an account, reloading every account when
//! it finds the requested credential missing or expired.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{CredentialSource, PagerDutyConfig, LEGACY_ACCOUNT_ID};
use crate::credentials::{AccountCredential, AccountRegistry};
use crate::error::PagerDutyResult;
use crate::oauth::TokenAcquirer;

/// Resolves per-account tokens, loading and refreshing them on demand.
#[derive(Clone)]
pub struct TokenResolver {
    config: Arc<PagerDutyConfig>,
    registry: Arc<AccountRegistry>,
    acquirer: Arc<dyn TokenAcquirer>,
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field("legacy", &self.config.is_legacy())
            .finish_non_exhaustive()
    }
}

impl TokenResolver {
    #[must_use]
    pub fn new(
        config: PagerDutyConfig,
        registry: Arc<AccountRegistry>,
        acquirer: Arc<dyn TokenAcquirer>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            acquirer,
        }
    }

    /// The configuration this resolver loads from.
    #[must_use]
    pub fn config(&self) -> &PagerDutyConfig {
        &self.config
    }

    /// The registry this resolver writes to.
    #[must_use]
    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    /// Ids of every configured account, loading the registry if needed.
    pub async fn account_ids(&self) -> Vec<String> {
        if !self.registry.is_initialized().await {
            self.load_configuration().await;
        }
        self.registry.account_ids().await
    }

    /// Resolve the authorization value for `account_id`.
    ///
    /// Returns an empty string when no usable credential exists; callers treat
    /// that as "no credential available". Finding the credential unusable
    /// triggers a full reload of every account before the second check.
    pub async fn resolve_token(&self, account_id: Option<&str>) -> String {
        if !self.registry.is_initialized().await {
            self.load_configuration().await;
        }

        let Some(effective) = self.effective_account_id(account_id).await else {
            warn!(
                requested = account_id.unwrap_or(""),
                "No account id given and no default account configured"
            );
            return String::new();
        };

        if let Some(token) = self.usable_token(&effective).await {
            return token;
        }

        debug!(account = %effective, "Credential missing or expired, reloading configuration");
        self.load_configuration().await;

        match self.usable_token(&effective).await {
            Some(token) => token,
            None => {
                warn!(account = %effective, "No usable credential after reload");
                String::new()
            }
        }
    }

    async fn effective_account_id(&self, requested: Option<&str>) -> Option<String> {
        if self.registry.is_legacy_mode().await {
            return Some(LEGACY_ACCOUNT_ID.to_string());
        }
        match requested.filter(|id| !id.is_empty()) {
            Some(id) => Some(id.to_string()),
            None => self.registry.default_account_id().await,
        }
    }

    async fn usable_token(&self, account_id: &str) -> Option<String> {
        self.registry
            .get(account_id)
            .await
            .filter(AccountCredential::is_usable)
            .map(|cred| cred.token)
    }

    /// Load (or reload) every configured account into the registry.
    ///
    /// Never fails: problems are logged and the affected account keeps its
    /// previous credential, or stays unset.
    pub async fn load_configuration(&self) {
        match self.config.accounts.as_deref() {
            None => self.load_legacy().await,
            Some(accounts) => {
                let ids: Vec<String> = accounts.iter().map(|a| a.id.clone()).collect();
                let default_id = self.config.default_account_id();
                if default_id.is_none() {
                    error!(
                        accounts = ids.len(),
                        "No default PagerDuty account configured; only accounts referenced by id are reachable"
                    );
                }
                self.registry
                    .apply_layout(false, default_id, &ids)
                    .await;

                let mut join_set = JoinSet::new();
                for account in accounts {
                    let id = account.id.clone();
                    let source = account.credentials();
                    let acquirer = Arc::clone(&self.acquirer);
                    join_set.spawn(async move {
                        let result = load_credential(acquirer.as_ref(), &source).await;
                        (id, result)
                    });
                }

                while let Some(joined) = join_set.join_next().await {
                    match joined {
                        Ok((id, result)) => self.apply_result(&id, result).await,
                        Err(e) => error!(error = %e, "Account credential task panicked"),
                    }
                }

                info!(accounts = ids.len(), "Loaded PagerDuty account configuration");
            }
        }

        self.registry.mark_initialized().await;
    }

    async fn load_legacy(&self) {
        self.registry
            .apply_layout(
                true,
                Some(LEGACY_ACCOUNT_ID.to_string()),
                &[LEGACY_ACCOUNT_ID.to_string()],
            )
            .await;

        let source = self.config.legacy_credentials();
        let result = load_credential(self.acquirer.as_ref(), &source).await;
        self.apply_result(LEGACY_ACCOUNT_ID, result).await;
        info!("Loaded legacy PagerDuty configuration");
    }

    async fn apply_result(&self, account_id: &str, result: PagerDutyResult<Option<AccountCredential>>) {
        match result {
            Ok(Some(credential)) => {
                debug!(account = %account_id, kind = ?credential.kind, "Stored credential");
                self.registry.store(account_id, credential).await;
            }
            Ok(None) => {
                warn!(
                    account = %account_id,
                    "No apiToken or oauth configuration; account has no credential"
                );
                self.registry.ensure(account_id).await;
            }
            Err(e) => {
                warn!(
                    account = %account_id,
                    error = %e,
                    "Failed to load credential; keeping previous state"
                );
                self.registry.ensure(account_id).await;
            }
        }
    }
}

/// Produce a credential from a source. `Ok(None)` means nothing is configured.
async fn load_credential(
    acquirer: &dyn TokenAcquirer,
    source: &CredentialSource,
) -> PagerDutyResult<Option<AccountCredential>> {
    match source {
        CredentialSource::Static(token) => {
            Ok(Some(AccountCredential::from_static(format!("Token token={token}"))))
        }
        CredentialSource::OAuth(oauth) => {
            let acquired = acquirer.acquire(oauth).await?;
            Ok(Some(AccountCredential::from_oauth(
                acquired.token,
                acquired.expires_at,
            )))
        }
        CredentialSource::None => Ok(None),
    }
}
