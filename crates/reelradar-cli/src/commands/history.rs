use color_eyre::Result;
use comfy_table::{Cell, Table};
use stream_detect_core::format_duration;

use crate::commands::app_context;
use crate::output::{Output, OutputFormat};

pub async fn run_history(limit: usize, output: &Output) -> Result<()> {
    let ctx = app_context()?;
    let entries = ctx.registry.recent_watches(limit).await?;

    if output.format() != OutputFormat::Human {
        output.json(&serde_json::to_value(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        output.info("No watch history yet");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Title").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Service").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Progress").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Watches").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Last watched").add_attribute(comfy_table::Attribute::Bold),
    ]);

    for entry in &entries {
        let progress = if entry.duration > 0.0 {
            format!(
                "{} / {}",
                format_duration(entry.current_time),
                format_duration(entry.duration)
            )
        } else {
            format_duration(entry.current_time)
        };
        table.add_row(vec![
            entry.title.clone(),
            entry.domain.clone(),
            progress,
            entry.watch_count.to_string(),
            entry.last_watched.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    output.println(table.to_string());
    Ok(())
}

pub async fn run_stats(output: &Output) -> Result<()> {
    let ctx = app_context()?;
    let stats = ctx.registry.usage_stats().await?;

    if output.format() != OutputFormat::Human {
        output.json(&serde_json::to_value(&stats)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Service").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Category").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Titles").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Watch time").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Last used").add_attribute(comfy_table::Attribute::Bold),
    ]);

    for usage in &stats {
        table.add_row(vec![
            usage.name.clone(),
            usage.category.to_string(),
            usage.content_count.to_string(),
            format_duration(usage.total_watch_time),
            usage
                .last_used
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    output.println(table.to_string());
    Ok(())
}
