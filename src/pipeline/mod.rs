//! Download pipeline split into focused submodules.
//!
//! A [`Pipeline`] owns every queue and task of one download run:
//! - [`traversal`] - Walks artist → album → episode, creating jobs and work items
//! - [`fetch_pool`] - Fixed set of workers fetching pages from the work queue
//! - [`archive_writer`] - Single consumer writing pages into episode containers
//! - [`job`] - Archive jobs and the messages passed between stages
//! - [`tracker`] - Outstanding-work counter used to detect drain
//!
//! Nothing here is process-wide, so several pipelines can run side by side.

mod archive_writer;
mod fetch_pool;
mod job;
mod tracker;
mod traversal;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use tracker::CompletionTracker;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extractor::{HtmlLinkExtractor, LinkExtractor};
use crate::locator::Resolver;
use crate::types::{Event, Kind, Locator};
use crate::utils::build_client;

use archive_writer::ArchiveWriter;
use fetch_pool::FetchPool;
use traversal::Traverser;

/// Result stream capacity. tokio has no zero-capacity channel, so one slot is
/// the closest to a rendezvous: a worker can be at most one page ahead of the writer.
const RESULT_CHANNEL_CAPACITY: usize = 1;

/// A running download pipeline: traversal feeding a fetch pool feeding one archive writer.
///
/// Must be created inside a tokio runtime, since construction spawns the
/// workers and the writer.
pub struct Pipeline {
    config: Arc<Config>,
    resolver: Arc<Resolver>,
    traverser: Traverser,
    tracker: CompletionTracker,
    event_tx: broadcast::Sender<Event>,
    pool: FetchPool,
    writer: JoinHandle<()>,
}

impl Pipeline {
    /// Validate `config` and start a pipeline that reads listing pages over HTTP.
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.site)?;
        let resolver = Arc::new(Resolver::new(&config.site)?);
        let extractor = HtmlLinkExtractor::new(
            client.clone(),
            Arc::clone(&resolver),
            &config.extraction,
            config.site.request_timeout,
        )?;

        Ok(Self::launch(config, client, resolver, Arc::new(extractor)))
    }

    /// Start a pipeline with a custom [`LinkExtractor`].
    ///
    /// Page fetches still go over HTTP; only listing pages come from `extractor`.
    pub fn start_with_extractor(config: Config, extractor: Arc<dyn LinkExtractor>) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.site)?;
        let resolver = Arc::new(Resolver::new(&config.site)?);

        Ok(Self::launch(config, client, resolver, extractor))
    }

    fn launch(
        config: Config,
        client: reqwest::Client,
        resolver: Arc<Resolver>,
        extractor: Arc<dyn LinkExtractor>,
    ) -> Self {
        let concurrency = config.download.concurrency;
        let (work_tx, work_rx) = mpsc::channel(concurrency);
        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(config.download.event_buffer.max(1));
        let tracker = CompletionTracker::new();
        let request_timeout = config.site.request_timeout;

        let writer =
            ArchiveWriter::new(tracker.clone(), event_tx.clone(), request_timeout).spawn(result_rx);
        let pool = FetchPool::start(concurrency, client, request_timeout, work_rx, result_tx.clone());

        let traverser = Traverser {
            resolver: Arc::clone(&resolver),
            extractor,
            work_tx,
            result_tx,
            tracker: tracker.clone(),
            event_tx: event_tx.clone(),
            next_job_id: Arc::new(AtomicU64::new(1)),
            archive_extension: Arc::from(config.download.archive_extension.as_str()),
        };

        tracing::info!(
            workers = pool.size(),
            base_url = %resolver.base(),
            "Download pipeline started"
        );

        Self {
            config: Arc::new(config),
            resolver,
            traverser,
            tracker,
            event_tx,
            pool,
            writer,
        }
    }

    /// Subscribe to pipeline events.
    ///
    /// Events are best-effort: a subscriber that falls behind by more than
    /// `event_buffer` events misses the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Resolver used for locators and page addresses
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Outstanding-work tracker of this pipeline
    pub fn tracker(&self) -> &CompletionTracker {
        &self.tracker
    }

    /// Configuration the pipeline was started with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Traverse `locator` as a resource of `kind`, writing episodes under `output_root`.
    ///
    /// Returns once every page below `locator` has been queued, not once they
    /// are written; use [`wait`](Self::wait) for that. A failing child branch
    /// does not stop its siblings, and the first such failure is returned.
    pub async fn traverse(&self, locator: Locator, output_root: &Path, kind: Kind) -> Result<()> {
        self.traverser.traverse(locator, output_root, kind).await
    }

    /// Resolve `raw` and traverse it into the configured output directory.
    pub async fn download(&self, raw: &str) -> Result<()> {
        let locator = self.resolver.resolve(raw)?;
        let kind = locator.kind();
        tracing::debug!(input = raw, locator = %locator, %kind, "Resolved locator");

        self.traverse(locator, self.config.output_dir(), kind).await
    }

    /// Download every input in order, continuing past failures.
    ///
    /// Returns the inputs that failed together with their errors. The whole
    /// batch counts as one unit of work, so the tracker drains once for it.
    pub async fn download_all<I, S>(&self, inputs: I) -> Vec<(String, Error)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tracker.add(1);
        let mut failures = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            if let Err(e) = self.download(input).await {
                tracing::error!(input = input, error = %e, "Download failed");
                failures.push((input.to_string(), e));
            }
        }
        self.tracker.done();
        failures
    }

    /// Wait until every queued page has been settled and every container closed.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Close the work queue and wait for the workers and the writer to exit.
    ///
    /// Containers still open at this point are closed by the writer.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            traverser,
            pool,
            writer,
            ..
        } = self;

        // dropping the last senders ends the work queue, then the result stream
        drop(traverser);
        pool.join().await;
        writer
            .await
            .map_err(|e| Error::Other(format!("archive writer task failed: {e}")))?;

        tracing::info!("Download pipeline shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.pool.size())
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
