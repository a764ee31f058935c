//! Traversal engine — walks artist → album → episode and queues page fetches.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, FetchError, LocatorError, Result};
use crate::extractor::LinkExtractor;
use crate::locator::Resolver;
use crate::types::{Event, JobId, Kind, Locator};
use crate::utils::{container_path, create_output_dir, entry_name};

use super::job::{ArchiveJob, FetchOutcome, FetchResult, WorkItem, WriterMessage};
use super::tracker::CompletionTracker;

/// Shared handles traversal needs to turn episodes into archive jobs and work items.
#[derive(Clone)]
pub(crate) struct Traverser {
    pub(crate) resolver: Arc<Resolver>,
    pub(crate) extractor: Arc<dyn LinkExtractor>,
    pub(crate) work_tx: mpsc::Sender<WorkItem>,
    pub(crate) result_tx: mpsc::Sender<WriterMessage>,
    pub(crate) tracker: CompletionTracker,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) next_job_id: Arc<AtomicU64>,
    pub(crate) archive_extension: Arc<str>,
}

impl Traverser {
    /// Traverse `locator` as a resource of the given `kind`.
    ///
    /// The call itself is a unit of tracked work, so the tracker cannot drain
    /// while traversal is still discovering pages.
    pub(crate) fn traverse<'a>(
        &'a self,
        locator: Locator,
        output_root: &'a Path,
        kind: Kind,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.tracker.add(1);
            let result = match kind.child() {
                Some(child_kind) => self.branch(&locator, output_root, kind, child_kind).await,
                None => self.episode(&locator, output_root).await,
            };
            self.tracker.done();
            result
        }
        .boxed()
    }

    /// Artist or album: recurse into every listed child.
    ///
    /// A failing child does not stop its siblings; the first failure is
    /// returned once all of them have run.
    async fn branch(
        &self,
        locator: &Locator,
        output_root: &Path,
        kind: Kind,
        child_kind: Kind,
    ) -> Result<()> {
        let address = self.resolver.address_of(locator)?;
        let children = self
            .extractor
            .child_locators(&address)
            .await
            .map_err(|e| Error::from(e).in_branch(kind, locator.to_string()))?;

        tracing::debug!(%kind, locator = %locator, children = children.len(), "Traversing children");

        let mut first_error = None;
        for child in children {
            let child_name = child.to_string();
            if let Err(e) = self.traverse(child, output_root, child_kind).await {
                tracing::warn!(%kind, locator = %locator, child = %child_name, error = %e, "Branch failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.in_branch(kind, locator.to_string())),
            None => Ok(()),
        }
    }

    /// Episode: open its container and queue one work item per page.
    async fn episode(&self, locator: &Locator, output_root: &Path) -> Result<()> {
        let (directory, path) = container_path(output_root, locator, &self.archive_extension)
            .ok_or_else(|| LocatorError::WrongDepth {
                expected: Kind::Episode,
                locator: locator.to_string(),
            })?;
        let name: Arc<str> = Arc::from(locator.name());

        create_output_dir(&directory)?;
        let address = self.resolver.address_of(locator)?;
        let assets = self
            .extractor
            .asset_addresses(&address)
            .await
            .map_err(|e| Error::from(e).in_branch(Kind::Episode, locator.to_string()))?;

        let id = JobId(self.next_job_id.fetch_add(1, Ordering::SeqCst));
        let job = ArchiveJob::create(id, Arc::clone(&name), path, assets.len())?;
        tracing::info!(
            name = %name,
            destination = %directory.display(),
            pages = assets.len(),
            "Downloading episode"
        );

        // the job itself is a unit until the writer closes its container
        self.tracker.add(1);
        if self.result_tx.send(WriterMessage::Open(job)).await.is_err() {
            self.tracker.done();
            return Err(Error::ShutDown);
        }
        self.event_tx
            .send(Event::EpisodeQueued {
                id,
                name: name.to_string(),
                pieces: assets.len(),
            })
            .ok();

        for (ordinal, raw) in assets.into_iter().enumerate() {
            self.tracker.add(1);

            let source = match self.resolver.asset_address(&raw) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(episode = %name, ordinal, error = %e, "Skipping malformed page address");
                    let entry = entry_name(ordinal, &raw);
                    let failed = FetchResult::failed(
                        id,
                        Arc::clone(&name),
                        ordinal,
                        entry,
                        raw,
                        FetchError::Address(e.to_string()),
                    );
                    self.send_to_writer(failed).await?;
                    continue;
                }
            };

            let item = WorkItem {
                job: id,
                episode: Arc::clone(&name),
                ordinal,
                entry: entry_name(ordinal, source.as_str()),
                source,
            };
            if let Err(mpsc::error::SendError(item)) = self.work_tx.send(item).await {
                // the pool is gone; settle the page so the container still closes
                let url = item.source.to_string();
                let failed = item.complete(FetchOutcome::Failed(FetchError::Transport {
                    url,
                    message: "fetch pool is not running".to_string(),
                }));
                self.send_to_writer(failed).await?;
            }
        }
        Ok(())
    }

    async fn send_to_writer(&self, result: FetchResult) -> Result<()> {
        if self.result_tx.send(WriterMessage::Page(result)).await.is_err() {
            self.tracker.done();
            return Err(Error::ShutDown);
        }
        Ok(())
    }
}
