use async_trait::async_trait;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use stream_detect_core::{
    format_duration, DetectionEvent, PageMonitor, PageObservation, SessionCoordinator,
    SnapshotSource,
};
use tokio::sync::mpsc;

use crate::commands::{app_context, classify};
use crate::output::Output;

/// Single page context per watch invocation.
const WATCH_CONTEXT: u64 = 0;

/// Re-reads the snapshot file on every poll. A capture tool (or the
/// user saving the page) keeps the file current.
struct FileSource {
    path: PathBuf,
    url: String,
}

#[async_trait(?Send)]
impl SnapshotSource for FileSource {
    async fn observe(&mut self) -> anyhow::Result<PageObservation> {
        let html = tokio::fs::read_to_string(&self.path).await?;
        Ok(PageObservation::new(self.url.clone(), html, Vec::new()))
    }
}

pub async fn run_watch(
    page: &Path,
    url: &str,
    interval: Option<u64>,
    learn: bool,
    output: &Output,
) -> Result<()> {
    // Fail fast on an unreadable snapshot before entering the loop
    classify::load_observation(page, url, None, None)?;

    let ctx = app_context()?;
    let mut config = ctx.config.clone();
    if let Some(ms) = interval {
        config.poll_interval_ms = ms;
    }

    let (events_tx, mut events_rx) = mpsc::channel(16);
    let (monitor, handle) = PageMonitor::new(ctx.registry.clone(), &config, events_tx);
    let monitor = monitor.with_auto_learn(learn);
    let mut coordinator = SessionCoordinator::new(ctx.registry.clone());

    let mut source = FileSource {
        path: page.to_path_buf(),
        url: url.to_string(),
    };

    output.info(format!(
        "Watching {} for playback on {} (Ctrl-C to stop)",
        page.display(),
        url
    ));

    let consumer = async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    handle.shutdown();
                    break;
                }
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    report(&event, output);
                    coordinator.handle_lossy(WATCH_CONTEXT, &event).await;
                }
            }
        }
        coordinator.end_context(WATCH_CONTEXT);
    };

    let (run_result, ()) = tokio::join!(monitor.run(&mut source), consumer);
    run_result.map_err(|e| color_eyre::eyre::eyre!("Monitor loop failed: {}", e))?;

    output.success("Stopped watching");
    Ok(())
}

fn report(event: &DetectionEvent, output: &Output) {
    match event {
        DetectionEvent::MovieDetected(context) => {
            output.success(format!(
                "{} on {} ({} / {})",
                context.title.as_deref().unwrap_or("Unknown title"),
                context.service_name,
                format_duration(context.current_time),
                format_duration(context.duration)
            ));
        }
        DetectionEvent::ProgressUpdate(context) => {
            output.println(format!(
                "  {} / {}",
                format_duration(context.current_time),
                format_duration(context.duration)
            ));
        }
        DetectionEvent::MovieLost { url } => {
            output.info(format!("Playback stopped on {}", url));
        }
    }
}
