use chrono::Utc;
use stream_detect_models::{SelectorSet, ServiceCategory, ServiceOrigin, ServiceRecord};

/// Built-in catalog of well-known streaming services. Seeded into the
/// registry once, gated by the `hasSeededServices` preference; re-runs
/// upsert and are safe.
pub fn builtin_catalog() -> Vec<ServiceRecord> {
    vec![
        known(
            "netflix.com",
            "Netflix",
            ServiceCategory::Premium,
            &["/watch/", "/title/"],
            SelectorSet {
                title: Some("[data-uia=\"video-title\"], .video-title, h1".into()),
                duration: Some("[data-uia=\"video-duration\"]".into()),
                progress: Some(".progress-bar, .scrub-bar".into()),
                video: None,
            },
        ),
        known(
            "hulu.com",
            "Hulu",
            ServiceCategory::Premium,
            &["/watch/", "/series/"],
            SelectorSet {
                title: Some(".content-pack__title, h1".into()),
                duration: Some(".time-display__duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "amazon.com",
            "Prime Video",
            ServiceCategory::Premium,
            &["/gp/video/detail/", "/dp/"],
            SelectorSet {
                title: Some("[data-automation-id=\"title\"], h1".into()),
                duration: Some(".duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "primevideo.com",
            "Prime Video",
            ServiceCategory::Premium,
            &["/detail/", "/watch/"],
            SelectorSet {
                title: Some("[data-automation-id=\"title\"], h1".into()),
                duration: Some(".duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "disneyplus.com",
            "Disney+",
            ServiceCategory::Premium,
            &["/video/", "/movies/", "/series/"],
            SelectorSet {
                title: Some(".title-field, h1".into()),
                duration: Some(".time-duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "hbomax.com",
            "HBO Max",
            ServiceCategory::Premium,
            &["/feature/", "/series/", "/episode/"],
            SelectorSet {
                title: Some("[data-testid=\"title\"], h1".into()),
                duration: Some(".duration-label".into()),
                progress: Some(".scrubber-bar".into()),
                video: None,
            },
        ),
        known(
            "crunchyroll.com",
            "Crunchyroll",
            ServiceCategory::Anime,
            &["/watch/", "/series/"],
            SelectorSet {
                title: Some(".episode-title, .series-title, h1".into()),
                duration: Some(".time-total".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "funimation.com",
            "Funimation",
            ServiceCategory::Anime,
            &["/shows/", "/v/"],
            SelectorSet {
                title: Some(".show-headline, h1".into()),
                duration: Some(".duration".into()),
                progress: Some(".vjs-progress-holder".into()),
                video: None,
            },
        ),
        known(
            "youtube.com",
            "YouTube",
            ServiceCategory::Free,
            &["/watch?v="],
            SelectorSet {
                title: Some("h1.title, .watch-main-col h1".into()),
                duration: Some(".ytp-time-duration".into()),
                progress: Some(".ytp-progress-bar".into()),
                video: None,
            },
        ),
        known(
            "tubi.tv",
            "Tubi",
            ServiceCategory::Free,
            &["/movies/", "/tv-shows/", "/watch/"],
            SelectorSet {
                title: Some(".watch-page-title, h1".into()),
                duration: Some(".duration-text".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "pluto.tv",
            "Pluto TV",
            ServiceCategory::Free,
            &["/on-demand/", "/movies/", "/tv/"],
            SelectorSet {
                title: Some(".title, h1".into()),
                duration: Some(".duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "paramount.com",
            "Paramount+",
            ServiceCategory::Premium,
            &["/shows/", "/movies/", "/video/"],
            SelectorSet {
                title: Some(".video-player__title, h1".into()),
                duration: Some(".video-player__duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
        known(
            "peacocktv.com",
            "Peacock",
            ServiceCategory::Freemium,
            &["/watch/", "/movies/", "/tv/"],
            SelectorSet {
                title: Some(".title, h1".into()),
                duration: Some(".duration".into()),
                progress: Some(".progress-bar".into()),
                video: None,
            },
        ),
    ]
}

fn known(
    domain: &str,
    name: &str,
    category: ServiceCategory,
    patterns: &[&str],
    selectors: SelectorSet,
) -> ServiceRecord {
    ServiceRecord {
        domain: domain.to_string(),
        name: name.to_string(),
        category,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        selectors,
        origin: ServiceOrigin::Known {
            added_date: Utc::now(),
        },
    }
}
