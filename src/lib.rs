//! # episode-dl
//!
//! Concurrent fetch-and-archive pipeline for episodic image galleries.
//!
//! A locator names an artist, an album or a single episode. The pipeline walks
//! down to every episode below it, fetches each episode's pages with a fixed
//! pool of workers, and writes them into one zip container per episode at
//! `{output}/{artist}/{album}/{episode}.cbz`.
//!
//! ## Design
//!
//! - **Positional entries** - a page's entry name is fixed by its position on
//!   the episode page, so containers read in order whatever order pages arrive in
//! - **Single writer** - one task owns every open container; workers only fetch
//! - **Partial episodes are kept** - a page that fails is skipped and the
//!   container is still closed
//! - **Event-driven** - consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use episode_dl::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.output_dir = "comics".into();
//!     config.download.concurrency = 8;
//!
//!     let pipeline = Pipeline::start(config)?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     pipeline.download("Some-Artist/Some-Album").await?;
//!     pipeline.wait().await;
//!     pipeline.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Command-line interface
pub mod cli;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Link extraction from listing pages
pub mod extractor;
/// Locator parsing and remote addressing
pub mod locator;
/// Download pipeline (traversal, fetch pool, archive writer)
pub mod pipeline;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ExtractionConfig, SiteConfig};
pub use error::{
    AssetAddressError, Error, ExtractionError, FetchError, LocatorError, Result,
};
pub use extractor::{HtmlLinkExtractor, LinkExtractor};
pub use locator::Resolver;
pub use pipeline::{CompletionTracker, Pipeline};
pub use types::{EpisodeSummary, Event, JobId, Kind, Locator};
