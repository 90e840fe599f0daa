//! Output generation.
//!
//! # Submodules
//!
//! - [`rss`]: Renders the run's new items as an RSS 2.0 feed
//!
//! The seen-set written alongside the feed lives in [`crate::state`].

pub mod rss;
