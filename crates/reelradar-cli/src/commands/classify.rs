use color_eyre::Result;
use std::path::Path;
use stream_detect_core::{
    format_duration, DiscoveryEngine, DiscoveryMetadata, DomainResolver, MediaState,
    PageClassifier, PageObservation,
};
use stream_detect_models::{ServiceCategory, ServiceOrigin};

use crate::commands::app_context;
use crate::output::{Output, OutputFormat};

pub async fn run_classify(
    page: &Path,
    url: &str,
    current_time: Option<f64>,
    duration: Option<f64>,
    output: &Output,
) -> Result<()> {
    let observation = load_observation(page, url, current_time, duration)?;

    let ctx = app_context()?;
    let mut resolver = DomainResolver::new(ctx.registry.clone(), &ctx.config);
    resolver.init().await?;

    let classifier = PageClassifier::new(&ctx.config);
    match classifier.detect(&mut resolver, &observation).await? {
        Some(context) => {
            if output.format() != OutputFormat::Human {
                output.json(&serde_json::to_value(&context)?);
                return Ok(());
            }
            output.success(format!(
                "Movie playback detected on {} (confidence {:.2})",
                context.service_name, context.confidence
            ));
            if let Some(title) = &context.title {
                output.println(format!("  Title:    {}", title));
            }
            output.println(format!(
                "  Progress: {} / {}",
                format_duration(context.current_time),
                format_duration(context.duration)
            ));
        }
        None => {
            if output.format() != OutputFormat::Human {
                output.json(&serde_json::json!({ "detected": false, "url": url }));
                return Ok(());
            }
            if resolver.is_streaming_site(url).await? {
                output.warn("Tracked streaming site, but the page does not look like movie playback");
            } else {
                output.info("Domain is not a tracked streaming service (try `reelradar learn`)");
            }
        }
    }
    Ok(())
}

pub async fn run_learn(
    page: &Path,
    url: &str,
    name: Option<String>,
    category: Option<String>,
    confidence: Option<f64>,
    output: &Output,
) -> Result<()> {
    let category = category.as_deref().map(parse_category).transpose()?;
    if let Some(c) = confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(color_eyre::eyre::eyre!(
                "Confidence must be between 0.0 and 1.0, got {}",
                c
            ));
        }
    }

    let observation = load_observation(page, url, None, None)?;

    let ctx = app_context()?;
    let engine = DiscoveryEngine::new(ctx.registry.clone(), &ctx.config);
    let hint = DiscoveryMetadata {
        name,
        category,
        confidence,
        ..Default::default()
    };

    match engine.learn_from_page(&observation, hint).await? {
        Some(record) => {
            if output.format() != OutputFormat::Human {
                output.json(&serde_json::to_value(&record)?);
                return Ok(());
            }
            match &record.origin {
                ServiceOrigin::Discovered {
                    confidence,
                    movie_count,
                    ..
                } => output.success(format!(
                    "Learned {} ({}) with confidence {:.2} after {} sighting(s)",
                    record.name, record.domain, confidence, movie_count
                )),
                ServiceOrigin::Known { .. } => output.success(format!(
                    "Domain {} is already in the built-in catalog",
                    record.domain
                )),
            }
            if !record.patterns.is_empty() {
                output.println(format!("  Patterns:  {}", record.patterns.join(", ")));
            }
            if let Some(title) = &record.selectors.title {
                output.println(format!("  Title via: {}", title));
            }
        }
        None => output.error(format!("Cannot learn from {}: no usable domain", url)),
    }
    Ok(())
}

pub(crate) fn load_observation(
    page: &Path,
    url: &str,
    current_time: Option<f64>,
    duration: Option<f64>,
) -> Result<PageObservation> {
    let html = std::fs::read_to_string(page).map_err(|e| {
        color_eyre::eyre::eyre!("Failed to read page snapshot {}: {}", page.display(), e)
    })?;

    let media = if current_time.is_some() || duration.is_some() {
        vec![MediaState::new(
            current_time.unwrap_or(0.0),
            duration.unwrap_or(0.0),
        )]
    } else {
        Vec::new()
    };
    Ok(PageObservation::new(url, html, media))
}

fn parse_category(value: &str) -> Result<ServiceCategory> {
    match value.to_lowercase().as_str() {
        "premium" => Ok(ServiceCategory::Premium),
        "free" => Ok(ServiceCategory::Free),
        "freemium" => Ok(ServiceCategory::Freemium),
        "anime" => Ok(ServiceCategory::Anime),
        "unknown" => Ok(ServiceCategory::Unknown),
        other => Err(color_eyre::eyre::eyre!(
            "Invalid category: {}. Use 'premium', 'free', 'freemium', or 'anime'",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("Premium").unwrap(), ServiceCategory::Premium);
        assert_eq!(parse_category("anime").unwrap(), ServiceCategory::Anime);
        assert!(parse_category("sports").is_err());
    }

    #[test]
    fn test_load_observation_media_only_when_given() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(&page, "<html></html>").unwrap();

        let plain = load_observation(&page, "https://example.com", None, None).unwrap();
        assert!(plain.media.is_empty());

        let playing =
            load_observation(&page, "https://example.com", Some(10.0), Some(3600.0)).unwrap();
        assert_eq!(playing.media.len(), 1);
        assert_eq!(playing.media[0].duration, 3600.0);
    }
}
