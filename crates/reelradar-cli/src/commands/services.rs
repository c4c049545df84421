use color_eyre::Result;
use comfy_table::{Cell, Table};
use stream_detect_core::DomainResolver;
use stream_detect_models::{ServiceOrigin, ServiceRecord};

use crate::commands::app_context;
use crate::output::{Output, OutputFormat};

pub async fn run_services(discovered_only: bool, known_only: bool, output: &Output) -> Result<()> {
    let ctx = app_context()?;

    // init runs the one-time catalog seed, so a fresh install still
    // lists the built-in services
    let mut resolver = DomainResolver::new(ctx.registry.clone(), &ctx.config);
    resolver.init().await?;

    let list = ctx.registry.list_all_services().await?;

    if output.format() != OutputFormat::Human {
        let mut value = serde_json::to_value(&list)?;
        if discovered_only {
            value = serde_json::json!({ "discovered": list.discovered });
        } else if known_only {
            value = serde_json::json!({ "known": list.known });
        }
        output.json(&value);
        return Ok(());
    }

    if !discovered_only {
        print_service_table("Known services", &list.known, output);
    }
    if !known_only {
        if list.discovered.is_empty() {
            output.info("No discovered services yet");
        } else {
            print_service_table("Discovered services", &list.discovered, output);
        }
    }
    Ok(())
}

fn print_service_table(heading: &str, services: &[ServiceRecord], output: &Output) {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec![
        Cell::new("Domain").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Name").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Category").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Confidence").add_attribute(comfy_table::Attribute::Bold),
        Cell::new("Sightings").add_attribute(comfy_table::Attribute::Bold),
    ]);

    for service in services {
        let (confidence, sightings) = match &service.origin {
            ServiceOrigin::Known { .. } => ("-".to_string(), "-".to_string()),
            ServiceOrigin::Discovered {
                confidence,
                movie_count,
                ..
            } => (format!("{:.2}", confidence), movie_count.to_string()),
        };
        table.add_row(vec![
            service.domain.clone(),
            service.name.clone(),
            service.category.to_string(),
            confidence,
            sightings,
        ]);
    }

    output.println(heading);
    output.println(table.to_string());
}
