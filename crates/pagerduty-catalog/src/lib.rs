//! PagerDuty integration core for the service catalog.
//!
//! Two concerns live here:
//!
//! - **Credentials**: static API tokens and OAuth client-credentials tokens
//!   for one ("legacy") or many PagerDuty accounts, cached in an
//!   [`AccountRegistry`] and refreshed on expiry by the [`TokenResolver`].
//! - **Reconciliation**: for every PagerDuty service, whether the persisted
//!   mapping and the catalog annotations agree ([`reconciler::reconcile`]).
//!
//! [`MappingService`] ties both to the catalog and the mapping store.

pub mod catalog;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod indexer;
pub mod models;
pub mod oauth;
pub mod reconciler;
pub mod resolver;
pub mod service;
pub mod store;

pub use catalog::{CatalogApi, CatalogClient, EntityFilter};
pub use client::{PagerDutyClient, ServiceDirectory};
pub use config::AppConfig;
pub use credentials::{AccountCredential, AccountRegistry, CredentialState};
pub use error::{PagerDutyError, PagerDutyResult};
pub use indexer::{CatalogReference, CatalogReferenceIndex};
pub use models::{MappingRecord, NewMapping, ReconciledMapping, RemoteService, SyncStatus};
pub use oauth::{OAuthTokenAcquirer, TokenAcquirer};
pub use resolver::TokenResolver;
pub use service::MappingService;
pub use store::{InMemoryMappingStore, MappingStore, PgMappingStore};

use std::sync::Arc;

/// Build the resolver and PagerDuty client from application configuration.
///
/// Both share one HTTP client carrying the configured timeout. The registry
/// starts empty and is loaded on the first token resolution.
pub fn build_pagerduty_client(
    config: &AppConfig,
) -> PagerDutyResult<(Arc<TokenResolver>, PagerDutyClient)> {
    let http_client = config.http.build_client()?;
    let acquirer =
        OAuthTokenAcquirer::with_token_url(http_client.clone(), config.http.identity_url.clone());

    let resolver = Arc::new(TokenResolver::new(
        config.pager_duty.clone(),
        Arc::new(AccountRegistry::new()),
        Arc::new(acquirer),
    ));
    let client = PagerDutyClient::new(http_client, resolver.clone());
    Ok((resolver, client))
}
