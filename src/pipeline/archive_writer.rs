//! Archive writer — the single consumer that owns every open episode container.
//!
//! Pages arrive in completion order, which is not page order. Each page already
//! carries its entry name, so the writer only has to put it in the right
//! container and count it off. Because this task is the only one that touches
//! containers and their counters, none of that state is locked. Running more
//! than one writer would need a lock per job and an atomic remaining count.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::types::{Event, JobId};

use super::job::{ArchiveJob, FetchOutcome, FetchResult, WriterMessage};
use super::tracker::CompletionTracker;

pub(crate) struct ArchiveWriter {
    jobs: HashMap<JobId, ArchiveJob>,
    tracker: CompletionTracker,
    event_tx: broadcast::Sender<Event>,
    /// Longest wait for one page body
    read_timeout: Duration,
}

impl ArchiveWriter {
    pub(crate) fn new(
        tracker: CompletionTracker,
        event_tx: broadcast::Sender<Event>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            jobs: HashMap::new(),
            tracker,
            event_tx,
            read_timeout,
        }
    }

    /// Run the writer on its own task until every sender of `results` is gone.
    pub(crate) fn spawn(self, results: mpsc::Receiver<WriterMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(results))
    }

    pub(crate) async fn run(mut self, mut results: mpsc::Receiver<WriterMessage>) {
        while let Some(message) = results.recv().await {
            match message {
                WriterMessage::Open(job) => self.open(job),
                WriterMessage::Page(result) => self.settle(result).await,
            }
        }

        if !self.jobs.is_empty() {
            tracing::warn!(
                open_jobs = self.jobs.len(),
                "Result stream closed with containers still open, closing them"
            );
            let jobs: Vec<ArchiveJob> = self.jobs.drain().map(|(_, job)| job).collect();
            for job in jobs {
                self.finalize(job);
            }
        }
        tracing::debug!("Archive writer finished");
    }

    fn open(&mut self, job: ArchiveJob) {
        tracing::debug!(job_id = %job.id, episode = %job.name, "Archive writer took container");
        if job.is_complete() {
            // nothing will ever arrive for an episode without pages
            self.finalize(job);
        } else {
            self.jobs.insert(job.id, job);
        }
    }

    async fn settle(&mut self, result: FetchResult) {
        let FetchResult {
            job: id,
            episode,
            ordinal,
            entry,
            source,
            outcome,
        } = result;

        let read_timeout = self.read_timeout;
        let Some(job) = self.jobs.get_mut(&id) else {
            tracing::error!(job_id = %id, entry = %entry, "Page arrived for a container that is not open");
            self.tracker.done();
            return;
        };

        let failure = match outcome {
            FetchOutcome::Fetched(body) => match job.write_entry(&entry, body, read_timeout).await {
                Ok(bytes) => {
                    job.record_written();
                    tracing::debug!(entry = %entry, episode = %episode, ordinal, bytes, "Archived page");
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        artifact = %entry,
                        archive = %job.path.display(),
                        error = %e,
                        "Failed writing artifact to archive"
                    );
                    Some(e.to_string())
                }
            },
            FetchOutcome::Failed(e) => {
                tracing::debug!(entry = %entry, ordinal, source = %source, "Skipping page that failed to fetch");
                Some(e.to_string())
            }
        };

        let event = match failure {
            None => Event::PageArchived {
                id,
                entry: entry.clone(),
            },
            Some(error) => {
                job.record_failed();
                Event::PageFailed {
                    id,
                    entry: entry.clone(),
                    error,
                }
            }
        };
        self.event_tx.send(event).ok();

        if job.settle_piece()
            && let Some(job) = self.jobs.remove(&id)
        {
            self.finalize(job);
        }
        self.tracker.done();
    }

    /// Close a container and release its job unit.
    fn finalize(&mut self, job: ArchiveJob) {
        let id = job.id;
        let name = job.name.clone();
        let path = job.path.clone();

        match job.finish() {
            Ok(summary) => {
                tracing::info!(
                    episode = %summary.name,
                    archive = %summary.path.display(),
                    pages = summary.written,
                    failed = summary.failed,
                    "Episode archived"
                );
                self.event_tx.send(Event::EpisodeArchived(summary)).ok();
            }
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    episode = %name,
                    archive = %path.display(),
                    error = %e,
                    "Failed closing episode archive"
                );
            }
        }
        self.tracker.done();
    }
}
