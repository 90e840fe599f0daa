//! Command-line interface definitions.
//!
//! Everything is optional: with no arguments the crawler uses the built-in
//! sources and writes `feed.xml` and `.seen.json` in the working directory.

use clap::Parser;

/// Command-line arguments for the charity feed crawler.
///
/// # Examples
///
/// ```sh
/// # Default sources and output paths
/// charity_jam_feed
///
/// # Custom settings file, feed written elsewhere
/// charity_jam_feed -c ./crawl.yaml -o ./public/feed.xml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "CHARITY_FEED_CONFIG")]
    pub config: Option<String>,

    /// Where to write the RSS feed
    #[arg(short = 'o', long)]
    pub feed_path: Option<String>,

    /// Where to keep the seen-set between runs
    #[arg(short, long)]
    pub state_path: Option<String>,

    /// Maximum number of items in the feed
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Politeness delay after each fetch, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
}
