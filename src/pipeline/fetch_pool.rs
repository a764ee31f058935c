//! Fetch pool — fixed set of workers draining the shared work queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::FetchError;

use super::job::{FetchOutcome, WorkItem, WriterMessage};

/// Handles to the running workers of one pipeline.
pub(crate) struct FetchPool {
    workers: Vec<JoinHandle<()>>,
}

impl FetchPool {
    /// Launch `size` workers sharing `queue`, forwarding every outcome to `results`.
    ///
    /// Each request gets `request_timeout` to produce a response. Workers stop
    /// once the queue is closed and drained.
    pub(crate) fn start(
        size: usize,
        client: reqwest::Client,
        request_timeout: Duration,
        queue: mpsc::Receiver<WorkItem>,
        results: mpsc::Sender<WriterMessage>,
    ) -> Self {
        let queue = Arc::new(Mutex::new(queue));
        let workers = (0..size)
            .map(|worker_id| {
                let client = client.clone();
                let queue = Arc::clone(&queue);
                let results = results.clone();
                tokio::spawn(run_worker(worker_id, client, request_timeout, queue, results))
            })
            .collect();

        tracing::debug!(workers = size, "Started fetch pool");
        Self { workers }
    }

    /// Number of workers launched
    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker to exit.
    pub(crate) async fn join(self) {
        for (worker_id, handle) in self.workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::error!(worker = worker_id, error = %e, "Fetch worker panicked");
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    client: reqwest::Client,
    request_timeout: Duration,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    results: mpsc::Sender<WriterMessage>,
) {
    loop {
        let item = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };
        let Some(item) = item else {
            break;
        };

        let outcome = match fetch_page(&client, &item.source, request_timeout).await {
            Ok(response) => {
                tracing::debug!(
                    worker = worker_id,
                    page = %item.entry,
                    episode = %item.episode,
                    "Fetched page"
                );
                FetchOutcome::Fetched(response)
            }
            Err(e) => {
                tracing::warn!(
                    page = %item.entry,
                    episode = %item.episode,
                    error = %e,
                    "Failed fetching page for episode"
                );
                FetchOutcome::Failed(e)
            }
        };

        if results
            .send(WriterMessage::Page(item.complete(outcome)))
            .await
            .is_err()
        {
            tracing::error!(worker = worker_id, "Archive writer stopped, fetch worker exiting");
            break;
        }
    }

    tracing::debug!(worker = worker_id, "Fetch worker finished");
}

/// GET `source`, accepting only a 200 response.
///
/// `timeout` bounds the wait for the response head only; the body is read
/// later by the archive writer.
pub(crate) async fn fetch_page(
    client: &reqwest::Client,
    source: &Url,
    timeout: Duration,
) -> std::result::Result<reqwest::Response, FetchError> {
    let transport_error = |message: String| FetchError::Transport {
        url: source.to_string(),
        message,
    };

    let response = match tokio::time::timeout(timeout, client.get(source.clone()).send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(transport_error(e.to_string())),
        Err(_) => return Err(transport_error(format!("no response within {timeout:?}"))),
    };

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(FetchError::Status {
            url: source.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn item(server: &MockServer, ordinal: usize, page: &str) -> WorkItem {
        WorkItem {
            job: JobId(1),
            episode: Arc::from("ep"),
            ordinal,
            entry: crate::utils::entry_name(ordinal, page),
            source: Url::parse(&format!("{}{}", server.uri(), page)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_rejects_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/moved.jpg"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        let url = Url::parse(&format!("{}/moved.jpg", server.uri())).unwrap();

        let err = fetch_page(&reqwest::Client::new(), &url, TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 204, .. }));
    }

    #[tokio::test]
    async fn test_fetch_page_reports_transport_errors() {
        // nothing listens on port 9 of the discard address
        let url = Url::parse("http://127.0.0.1:9/x.jpg").unwrap();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let err = fetch_page(&client, &url, TIMEOUT).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_every_item_produces_exactly_one_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (work_tx, work_rx) = mpsc::channel(2);
        let (result_tx, mut result_rx) = mpsc::channel(1);
        let pool = FetchPool::start(2, reqwest::Client::new(), TIMEOUT, work_rx, result_tx);
        assert_eq!(pool.size(), 2);

        let producer = {
            let items: Vec<WorkItem> = (0..6)
                .map(|i| item(&server, i, if i % 3 == 0 { "/missing.jpg" } else { "/ok.jpg" }))
                .collect();
            tokio::spawn(async move {
                for item in items {
                    work_tx.send(item).await.unwrap();
                }
            })
        };

        let mut fetched = Vec::new();
        let mut failed = Vec::new();
        while let Some(message) = result_rx.recv().await {
            let WriterMessage::Page(result) = message else {
                panic!("workers only send pages");
            };
            match result.outcome {
                FetchOutcome::Fetched(_) => fetched.push(result.ordinal),
                FetchOutcome::Failed(_) => failed.push(result.ordinal),
            }
        }
        producer.await.unwrap();
        pool.join().await;

        fetched.sort_unstable();
        failed.sort_unstable();
        assert_eq!(fetched, vec![1, 2, 4, 5]);
        assert_eq!(failed, vec![0, 3]);
    }

    #[tokio::test]
    async fn test_fetch_page_times_out_waiting_for_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.jpg"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        let url = Url::parse(&format!("{}/slow.jpg", server.uri())).unwrap();

        let err = fetch_page(&reqwest::Client::new(), &url, Duration::from_millis(200))
            .await
            .unwrap_err();

        match err {
            FetchError::Transport { message, .. } => assert!(message.contains("within"), "got {message}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_waiting_on_slow_writer_stays_readable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;
        let site = crate::config::SiteConfig {
            request_timeout: Duration::from_millis(300),
            ..crate::config::SiteConfig::default()
        };
        let client = crate::utils::build_client(&site).unwrap();

        let (work_tx, work_rx) = mpsc::channel(3);
        let (result_tx, mut result_rx) = mpsc::channel(1);
        let pool = FetchPool::start(3, client, site.request_timeout, work_rx, result_tx);
        for i in 0..3 {
            work_tx.send(item(&server, i, "/ok.jpg")).await.unwrap();
        }
        drop(work_tx);

        let mut bodies = Vec::new();
        loop {
            // hold every result well past the request timeout before reading it
            tokio::time::sleep(Duration::from_millis(600)).await;
            let Some(WriterMessage::Page(result)) = result_rx.recv().await else {
                break;
            };
            match result.outcome {
                FetchOutcome::Fetched(response) => bodies.push(response.bytes().await.unwrap()),
                FetchOutcome::Failed(e) => panic!("page failed: {e}"),
            }
        }
        pool.join().await;

        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|body| body.as_ref() == b"ok"));
    }
}
