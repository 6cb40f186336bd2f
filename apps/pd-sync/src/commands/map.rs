//! Map command - Persist an entity to service mapping

use clap::Args;
use tracing::info;

use pagerduty_catalog::NewMapping;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};

/// Arguments for the map command
#[derive(Args)]
pub struct MapArgs {
    /// PagerDuty service id
    #[arg(long)]
    pub service_id: String,

    /// Catalog entity reference (kind:namespace/name); empty removes the mapping
    #[arg(long, default_value = "")]
    pub entity_ref: String,

    /// Integration key to record with the mapping
    #[arg(long, default_value = "")]
    pub integration_key: String,

    /// Account the service belongs to
    #[arg(long, default_value = "")]
    pub account: String,
}

/// Execute the map command
pub async fn execute(args: MapArgs) -> CliResult<()> {
    if args.service_id.trim().is_empty() {
        return Err(CliError::Validation("--service-id must not be empty".to_string()));
    }

    let ctx = AppContext::load().await?;
    let id = ctx
        .service
        .save_mapping(NewMapping {
            service_id: args.service_id.trim().to_string(),
            entity_ref: args.entity_ref,
            integration_key: args.integration_key,
            account: args.account,
        })
        .await?;

    info!(mapping_id = %id, "Mapping saved");
    println!("Saved mapping {id} for service {}", args.service_id.trim());
    Ok(())
}
