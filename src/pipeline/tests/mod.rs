use crate::config::Config;
use crate::error::ExtractionError;
use crate::extractor::LinkExtractor;
use crate::pipeline::Pipeline;
use crate::types::{EpisodeSummary, Event, Locator};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;
use wiremock::MockServer;


// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// In-memory listing pages keyed by their full address
#[derive(Default)]
struct FakeSite {
    base: String,
    children: HashMap<String, Vec<Locator>>,
    assets: HashMap<String, Vec<String>>,
    broken: HashSet<String>,
}

impl FakeSite {
    fn new(server: &MockServer) -> Self {
        Self {
            base: server.uri(),
            ..Self::default()
        }
    }

    fn address(&self, segments: &str) -> String {
        format!("{}/comics/album/{}", self.base, segments)
    }

    /// List `children` (each "a/b" style) on the page of `segments`
    fn with_children(mut self, segments: &str, children: &[&str]) -> Self {
        let locators = children
            .iter()
            .map(|child| Locator::new(child.split('/')).unwrap())
            .collect();
        self.children.insert(self.address(segments), locators);
        self
    }

    /// List raw page addresses on the episode page of `segments`
    fn with_assets(mut self, segments: &str, assets: &[&str]) -> Self {
        let assets = assets.iter().map(|a| a.to_string()).collect();
        self.assets.insert(self.address(segments), assets);
        self
    }

    /// Make the page of `segments` fail to load
    fn with_broken(mut self, segments: &str) -> Self {
        self.broken.insert(self.address(segments));
        self
    }

    fn lookup<T: Clone>(
        &self,
        pages: &HashMap<String, Vec<T>>,
        address: &Url,
    ) -> Result<Vec<T>, ExtractionError> {
        if self.broken.contains(address.as_str()) {
            return Err(ExtractionError::Status {
                url: address.to_string(),
                status: 500,
            });
        }
        pages
            .get(address.as_str())
            .cloned()
            .ok_or_else(|| ExtractionError::Status {
                url: address.to_string(),
                status: 404,
            })
    }
}

#[async_trait::async_trait]
impl LinkExtractor for FakeSite {
    async fn child_locators(&self, address: &Url) -> Result<Vec<Locator>, ExtractionError> {
        self.lookup(&self.children, address)
    }

    async fn asset_addresses(&self, address: &Url) -> Result<Vec<String>, ExtractionError> {
        self.lookup(&self.assets, address)
    }
}

fn test_config(server: &MockServer, output: &Path, concurrency: usize) -> Config {
    let mut config = Config::default();
    config.site.base_url = server.uri();
    config.site.request_timeout = Duration::from_secs(5);
    config.download.output_dir = output.to_path_buf();
    config.download.concurrency = concurrency;
    config
}

fn start_pipeline(server: &MockServer, output: &Path, concurrency: usize, site: FakeSite) -> Pipeline {
    Pipeline::start_with_extractor(test_config(server, output, concurrency), Arc::new(site))
        .unwrap()
}

/// Entry names in the order they were written, with their contents
fn read_entries(path: &Path) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = String::new();
            std::io::Read::read_to_string(&mut file, &mut contents).unwrap();
            (file.name().to_string(), contents)
        })
        .collect()
}

fn sorted_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = read_entries(path).into_iter().map(|(name, _)| name).collect();
    names.sort();
    names
}

/// Drain every event received so far, keeping the closed-container summaries
fn archived(events: &mut broadcast::Receiver<Event>) -> Vec<EpisodeSummary> {
    let mut summaries = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::EpisodeArchived(summary) = event {
            summaries.push(summary);
        }
    }
    summaries
}

/// Wait for the pipeline to drain, failing the test instead of hanging
async fn drain(pipeline: &Pipeline) {
    tokio::time::timeout(Duration::from_secs(20), pipeline.wait())
        .await
        .expect("pipeline did not drain");
}

/// Serve a single page that promises 100 bytes but only sends 40.
///
/// With `hang_up` the connection is closed after the 40 bytes; otherwise it is
/// held open so the body stalls.
pub(super) async fn serve_partial_body(hang_up: bool) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n")
            .await
            .unwrap();
        socket.write_all(&[0xAB; 40]).await.unwrap();
        socket.flush().await.unwrap();
        if !hang_up {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });
    format!("http://{address}/image/fl/cut.jpg")
}
