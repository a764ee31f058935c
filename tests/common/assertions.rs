//! Container inspection and event helpers for E2E tests

use episode_dl::{EpisodeSummary, Event, Pipeline};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Entry names of a closed container, sorted
pub fn entry_names(container: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(container).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Contents of one entry of a closed container
pub fn read_entry(container: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(container).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut contents = Vec::new();
    entry.read_to_end(&mut contents).unwrap();
    contents
}

/// Wait for the pipeline to drain, failing instead of hanging
pub async fn wait_drained(pipeline: &Pipeline, timeout: Duration) {
    tokio::time::timeout(timeout, pipeline.wait())
        .await
        .expect("pipeline did not drain in time");
}

/// Every event received so far
pub fn collect_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Closed-container summaries among `events`
pub fn summaries(events: &[Event]) -> Vec<EpisodeSummary> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::EpisodeArchived(summary) => Some(summary.clone()),
            _ => None,
        })
        .collect()
}
