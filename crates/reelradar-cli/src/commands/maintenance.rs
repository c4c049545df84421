use color_eyre::Result;
use std::path::Path;

use crate::commands::app_context;
use crate::output::{Output, OutputFormat};

pub async fn run_purge(days: i64, output: &Output) -> Result<()> {
    if days < 0 {
        return Err(color_eyre::eyre::eyre!(
            "Age cutoff must be non-negative, got {}",
            days
        ));
    }

    let ctx = app_context()?;
    let outcome = ctx.registry.purge_older_than(days).await?;

    if output.format() != OutputFormat::Human {
        output.json(&serde_json::json!({
            "content_removed": outcome.content_removed,
            "services_removed": outcome.services_removed,
        }));
        return Ok(());
    }

    output.success(format!(
        "Purged {} watch entries and {} stale discovered service(s) older than {} days",
        outcome.content_removed, outcome.services_removed, days
    ));
    Ok(())
}

pub async fn run_export(to: Option<&Path>, output: &Output) -> Result<()> {
    let ctx = app_context()?;
    let snapshot = ctx.registry.export_snapshot().await?;
    let json = serde_json::to_string_pretty(&snapshot)?;

    match to {
        Some(path) => {
            std::fs::write(path, &json).map_err(|e| {
                color_eyre::eyre::eyre!("Failed to write export to {}: {}", path.display(), e)
            })?;
            output.success(format!(
                "Exported {} service(s) and {} watch entries to {}",
                snapshot.services.total,
                snapshot.content.len(),
                path.display()
            ));
        }
        None => {
            // Raw JSON to stdout regardless of output format, so the
            // export can be piped
            println!("{}", json);
        }
    }
    Ok(())
}
