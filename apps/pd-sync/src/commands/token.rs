//! Token command - Check that an account credential resolves
//!
//! The token itself is never printed.

use clap::Args;
use serde::Serialize;

use pagerduty_catalog::config::LEGACY_ACCOUNT_ID;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};

/// Arguments for the token command
#[derive(Args)]
pub struct TokenArgs {
    /// Account id (multi-account configurations only; defaults to the default account)
    #[arg(long)]
    pub account: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output for the token command
#[derive(Serialize)]
struct TokenStatus {
    account: String,
    kind: String,
    expires_at: Option<String>,
}

/// Execute the token command
pub async fn execute(args: TokenArgs) -> CliResult<()> {
    let ctx = AppContext::load().await?;
    let resolver = &ctx.resolver;

    let token = resolver.resolve_token(args.account.as_deref()).await;

    let account = if resolver.config().is_legacy() {
        LEGACY_ACCOUNT_ID.to_string()
    } else {
        args.account
            .clone()
            .filter(|a| !a.is_empty())
            .or_else(|| resolver.config().default_account_id())
            .unwrap_or_default()
    };

    if token.is_empty() {
        return Err(CliError::NoCredential(account));
    }

    let credential = resolver.registry().get(&account).await;
    let status = TokenStatus {
        kind: credential
            .as_ref()
            .map(|c| format!("{:?}", c.kind).to_lowercase())
            .unwrap_or_default(),
        expires_at: credential
            .and_then(|c| c.expires_at)
            .map(|t| t.to_rfc3339()),
        account,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Account:    {}", status.account);
        println!("Credential: {} (usable)", status.kind);
        if let Some(expires_at) = &status.expires_at {
            println!("Expires at: {expires_at}");
        }
    }
    Ok(())
}
