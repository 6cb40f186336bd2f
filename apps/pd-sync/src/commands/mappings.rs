//! Mappings command - Show the reconciled service mapping list

use clap::Args;

use crate::context::AppContext;
use crate::error::CliResult;

/// Arguments for the mappings command
#[derive(Args)]
pub struct MappingsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the mappings command
pub async fn execute(args: MappingsArgs) -> CliResult<()> {
    let ctx = AppContext::load().await?;
    let rows = ctx.service.reconciled_mappings().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No PagerDuty services found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<32} {:<40} {:<12} {}",
        "STATUS", "SERVICE", "ENTITY", "ACCOUNT", "TEAM"
    );
    for row in &rows {
        let entity = if row.entity_ref.is_empty() {
            "-"
        } else {
            row.entity_ref.as_str()
        };
        println!(
            "{:<10} {:<32} {:<40} {:<12} {}",
            row.status.as_str(),
            row.service_name,
            entity,
            row.account,
            row.team
        );
    }
    Ok(())
}
