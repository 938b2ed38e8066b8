//! orbitwatch - live position and crew roster of the International Space Station.
//!
//! Polls the position and crew feeds through the core scheduler and prints
//! every pushed update to stdout. Logs go to stderr (and optionally a file).

mod render;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use orbitwatch_core::{
    Clock, CrewRecord, FeedClient, FeedConfig, FeedUpdate, HttpFeed, IgnoredSetting,
    MonotonicClock, PollScheduler, PositionRecord, TimedCache,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use render::{OutputFormat, PrintSink};

/// Rolling log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "orbitwatch.log";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard when a log directory is configured; it must
/// live until exit so buffered lines are flushed.
fn init_tracing(config: &FeedConfig) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Effective configuration plus the environment overrides that were skipped.
fn load_config() -> Result<(FeedConfig, Vec<IgnoredSetting>)> {
    let mut config = FeedConfig::load().context("Failed to load config")?;
    let ignored = config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok((config, ignored))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let has_flag = |flag: &str| args.iter().skip(1).any(|a| a == flag);

    if has_flag("--help") || has_flag("-h") {
        print_usage();
        return Ok(());
    }

    let (config, ignored) = load_config()?;

    if has_flag("--init-config") {
        config.save()?;
        eprintln!("Wrote {}", FeedConfig::config_path()?.display());
        return Ok(());
    }

    let _log_guard = init_tracing(&config);
    info!("orbitwatch starting");
    for setting in &ignored {
        warn!(
            key = setting.key,
            value = %setting.value,
            error = %setting.reason,
            "Ignoring invalid numeric setting"
        );
    }

    let format = if has_flag("--json") {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let client = FeedClient::new(config.request_timeout())?;
    let position_feed = HttpFeed::<PositionRecord>::new(client.clone(), &config.position_url);
    let crew_feed = HttpFeed::<CrewRecord>::new(client, &config.crew_url);
    info!(
        position_url = position_feed.url(),
        crew_url = crew_feed.url(),
        "Feeds configured"
    );

    let position = Arc::new(TimedCache::new(
        "position",
        Arc::new(position_feed),
        config.position_window(),
    ));
    let crew = Arc::new(TimedCache::new(
        "crew",
        Arc::new(crew_feed),
        config.crew_window(),
    ));

    // Entries are stamped and aged with the same clock
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    if has_flag("--once") {
        return print_once(&position, &crew, clock.as_ref(), format).await;
    }

    let sink = PrintSink::new(clock.clone(), format);
    let mut scheduler =
        PollScheduler::new(position, crew, config.schedule(), Arc::new(sink)).with_clock(clock);
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    scheduler.stop().await;
    info!("orbitwatch shutting down");
    Ok(())
}

/// Read both feeds once, print, and exit.
async fn print_once(
    position: &TimedCache<PositionRecord>,
    crew: &TimedCache<CrewRecord>,
    clock: &dyn Clock,
    format: OutputFormat,
) -> Result<()> {
    let now = clock.now();
    let (position, crew) = futures::future::join(position.get_fresh(now), crew.get_fresh(now)).await;

    let updates = [FeedUpdate::Position(position), FeedUpdate::Crew(crew)];
    for update in &updates {
        println!("{}", render::render(update, now, format));
    }

    if updates.iter().all(FeedUpdate::is_error) {
        anyhow::bail!("No feed is available");
    }
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: orbitwatch [--once] [--json] [--init-config]");
    eprintln!();
    eprintln!("  --once         Read both feeds once and exit");
    eprintln!("  --json         Print one JSON object per update");
    eprintln!("  --init-config  Write the effective configuration to the config file");
    eprintln!();
    eprintln!("Configuration: ~/.config/orbitwatch/config.json and ORBITWATCH_* environment variables.");
}
