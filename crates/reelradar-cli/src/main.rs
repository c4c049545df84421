use clap::{ArgAction, Parser, Subcommand};

mod commands;
mod logging;
mod output;

use commands::{classify, history, maintenance, services, watch};

#[derive(Parser)]
#[command(name = "reelradar")]
#[command(about = "ReelRadar - Track movie playback across streaming services")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked streaming services
    #[command(long_about = "List every streaming service in the registry: the built-in catalog plus services learned from browsing. Use --discovered or --known to filter.")]
    Services {
        /// Only show services learned from browsing
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "known")]
        discovered: bool,

        /// Only show the built-in catalog
        #[arg(long, action = ArgAction::SetTrue)]
        known: bool,
    },
    /// Show recent watch history
    History {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show per-service usage statistics
    Stats,
    /// Classify a saved page snapshot
    #[command(long_about = "Score a saved HTML page against the service registry and report whether it looks like movie playback. The page must be paired with the URL it was captured from; player state can be passed with --current-time and --duration.")]
    Classify {
        /// Path to the saved HTML file
        page: std::path::PathBuf,

        /// URL the page was captured from
        #[arg(long)]
        url: String,

        /// Player position in seconds, if known
        #[arg(long)]
        current_time: Option<f64>,

        /// Media duration in seconds, if known
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Learn a new streaming service from a saved page snapshot
    #[command(long_about = "Derive URL patterns and selectors from a saved HTML page and register its domain as a discovered service. Repeated learning of the same domain raises its confidence.")]
    Learn {
        /// Path to the saved HTML file
        page: std::path::PathBuf,

        /// URL the page was captured from
        #[arg(long)]
        url: String,

        /// Service display name (derived from the domain if omitted)
        #[arg(long)]
        name: Option<String>,

        /// Service category: premium, free, freemium, anime
        #[arg(long)]
        category: Option<String>,

        /// Initial confidence override (0.0 to 1.0)
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Monitor a page snapshot file for movie playback
    #[command(long_about = "Poll a snapshot file that a capture tool keeps overwriting, classify it on every change, and record watch history for detected playback. Runs until interrupted.")]
    Watch {
        /// Path to the HTML file being kept up to date by a capture tool
        page: std::path::PathBuf,

        /// URL the page is captured from
        #[arg(long)]
        url: String,

        /// Poll interval in milliseconds (overrides the configured value)
        #[arg(long)]
        interval: Option<u64>,

        /// Learn unregistered domains that show video content
        #[arg(long, action = ArgAction::SetTrue)]
        learn: bool,
    },
    /// Purge stale watch history and low-confidence discoveries
    Purge {
        /// Age cutoff in days
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
    /// Export the full registry as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        to: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // The watch loop shares stdout with event reporting, so its logs go
    // to the rotating file instead
    let log_file = match &cli.command {
        Commands::Watch { .. } => {
            let paths = stream_detect_config::PathManager::new()
                .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            Some(paths.log_file())
        }
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Services { discovered, known } => {
            services::run_services(discovered, known, &output).await
        }
        Commands::History { limit } => history::run_history(limit, &output).await,
        Commands::Stats => history::run_stats(&output).await,
        Commands::Classify {
            page,
            url,
            current_time,
            duration,
        } => classify::run_classify(&page, &url, current_time, duration, &output).await,
        Commands::Learn {
            page,
            url,
            name,
            category,
            confidence,
        } => classify::run_learn(&page, &url, name, category, confidence, &output).await,
        Commands::Watch {
            page,
            url,
            interval,
            learn,
        } => watch::run_watch(&page, &url, interval, learn, &output).await,
        Commands::Purge { days } => maintenance::run_purge(days, &output).await,
        Commands::Export { to } => maintenance::run_export(to.as_deref(), &output).await,
    }
}
