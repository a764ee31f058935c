//! Archive jobs and the messages that flow between traversal, workers and the writer.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::error::{Error, FetchError, Result};
use crate::types::{EpisodeSummary, JobId};

/// One episode's output container and its outstanding page count.
///
/// Created by traversal, then handed to the archive writer, which is the only
/// task that ever writes to or closes it.
pub(crate) struct ArchiveJob {
    pub(crate) id: JobId,
    pub(crate) name: Arc<str>,
    pub(crate) path: PathBuf,
    writer: ZipWriter<File>,
    pieces: usize,
    remaining: usize,
    written: usize,
    failed: usize,
}

impl ArchiveJob {
    /// Create the container file and an archive job expecting `pieces` pages.
    pub(crate) fn create(
        id: JobId,
        name: Arc<str>,
        path: PathBuf,
        pieces: usize,
    ) -> Result<Self> {
        let file = File::create(&path).map_err(|source| Error::CreateOutput {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            id,
            name,
            path,
            writer: ZipWriter::new(file),
            pieces,
            remaining: pieces,
            written: 0,
            failed: 0,
        })
    }

    /// Whether every page has been settled
    pub(crate) fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Read a fetched page in full, then add it to the container under `entry`.
    ///
    /// The entry is only opened once the whole body has arrived, so a body that
    /// breaks off or stalls past `read_timeout` leaves nothing in the container.
    /// Returns the number of bytes written.
    pub(crate) async fn write_entry(
        &mut self,
        entry: &str,
        body: reqwest::Response,
        read_timeout: Duration,
    ) -> std::result::Result<u64, FetchError> {
        let url = body.url().to_string();
        let body_error = |message: String| FetchError::Body {
            url: url.clone(),
            message,
        };

        let bytes = match tokio::time::timeout(read_timeout, body.bytes()).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(body_error(e.to_string())),
            Err(_) => return Err(body_error(format!("body not received within {read_timeout:?}"))),
        };

        self.writer
            .start_file(entry, FileOptions::default())
            .map_err(|e| body_error(format!("failed creating artifact in archive: {e}")))?;
        self.writer
            .write_all(&bytes)
            .map_err(|e| body_error(format!("failed writing to artifact in archive: {e}")))?;

        Ok(bytes.len() as u64)
    }

    /// Account for a page that was written.
    pub(crate) fn record_written(&mut self) {
        self.written += 1;
    }

    /// Account for a page that could not be fetched or written.
    pub(crate) fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Settle one page; returns `true` when it was the last one.
    pub(crate) fn settle_piece(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    /// Write the archive directory and close the container.
    pub(crate) fn finish(mut self) -> Result<EpisodeSummary> {
        let file = self.writer.finish()?;
        file.sync_all()?;
        drop(file);

        Ok(EpisodeSummary {
            id: self.id,
            name: self.name.to_string(),
            path: self.path,
            pieces: self.pieces,
            written: self.written,
            failed: self.failed,
        })
    }
}

impl std::fmt::Debug for ArchiveJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveJob")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path)
            .field("pieces", &self.pieces)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

/// A single page fetch, queued for the worker pool.
#[derive(Debug)]
pub(crate) struct WorkItem {
    /// Job whose container receives the page
    pub(crate) job: JobId,
    /// Episode name, for logging
    pub(crate) episode: Arc<str>,
    /// Position of the page on the episode page
    pub(crate) ordinal: usize,
    /// Entry name inside the container
    pub(crate) entry: String,
    /// Address to fetch
    pub(crate) source: Url,
}

impl WorkItem {
    /// Attach the fetch outcome, producing the message for the archive writer.
    pub(crate) fn complete(self, outcome: FetchOutcome) -> FetchResult {
        FetchResult {
            job: self.job,
            episode: self.episode,
            ordinal: self.ordinal,
            entry: self.entry,
            source: self.source.to_string(),
            outcome,
        }
    }
}

/// Outcome of fetching one page
#[derive(Debug)]
pub(crate) enum FetchOutcome {
    /// The page responded with 200; the writer reads the body
    Fetched(reqwest::Response),
    /// The page could not be fetched
    Failed(FetchError),
}

/// A work item together with its outcome, consumed once by the archive writer.
#[derive(Debug)]
pub(crate) struct FetchResult {
    pub(crate) job: JobId,
    pub(crate) episode: Arc<str>,
    pub(crate) ordinal: usize,
    pub(crate) entry: String,
    pub(crate) source: String,
    pub(crate) outcome: FetchOutcome,
}

impl FetchResult {
    /// A page that failed before reaching the worker pool.
    pub(crate) fn failed(
        job: JobId,
        episode: Arc<str>,
        ordinal: usize,
        entry: String,
        source: String,
        error: FetchError,
    ) -> Self {
        Self {
            job,
            episode,
            ordinal,
            entry,
            source,
            outcome: FetchOutcome::Failed(error),
        }
    }
}

/// Messages consumed by the archive writer, in arrival order.
#[derive(Debug)]
pub(crate) enum WriterMessage {
    /// Take ownership of a freshly created container
    Open(ArchiveJob),
    /// Settle one page of an open container
    Page(FetchResult),
}
