//! # Charity Jam Feed
//!
//! Crawls itch.io for blog posts, board threads and game jams that look like
//! charity fundraisers, and publishes the ones not seen before as an RSS feed.
//!
//! ## Usage
//!
//! ```sh
//! charity_jam_feed -o ./feed.xml -s ./.seen.json
//! ```
//!
//! ## Architecture
//!
//! The run is a strictly sequential pipeline with a politeness delay between
//! fetches:
//! 1. **Crawling**: each configured source is fetched and handed to the
//!    scraper for its kind (blog index, board listing, jam listing, generic page)
//! 2. **Deduplication**: items are fingerprinted and checked against the
//!    seen-set persisted by earlier runs
//! 3. **Output**: the newest items go to the RSS feed and the merged seen-set
//!    is written back
//!
//! Individual fetch failures never fail the run; they are logged and skipped.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod relevance;
mod scrapers;
mod state;
mod utils;

use cli::Cli;
use config::Settings;
use fetch::HttpFetcher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("charity_jam_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let settings = match Settings::load(&args).await {
        Ok(settings) => settings,
        Err(e) => {
            error!(config = ?args.config, error = %e, "Could not load settings");
            return Err(e);
        }
    };
    info!(
        sources = settings.sources.len(),
        feed_path = %settings.feed_path.display(),
        state_path = %settings.state_path.display(),
        delay_ms = settings.delay_ms,
        "Loaded settings"
    );

    let fetcher = HttpFetcher::new(&settings.user_agent, settings.timeout())?;
    let report = pipeline::execute(&fetcher, &settings, Utc::now()).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        emitted = report.items.len(),
        new_items = report.new_items,
        candidates = report.candidates,
        sources_failed = report.sources_failed,
        "Execution complete"
    );

    Ok(())
}
