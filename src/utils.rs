//! Utility functions for entry naming, output paths and the shared HTTP client

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use crate::types::Locator;
use std::path::{Path, PathBuf};

/// Width of the zero-padded ordinal in entry names
const ENTRY_ORDINAL_WIDTH: usize = 5;

/// Name of a page inside its episode container.
///
/// Entries are numbered from one by their position on the episode page, so a
/// page that fails to download leaves a gap instead of shifting later pages.
///
/// # Examples
///
/// ```
/// use episode_dl::utils::entry_name;
///
/// assert_eq!(entry_name(0, "https://example.com/image/fl/abc.jpg"), "00001.jpg");
/// assert_eq!(entry_name(41, "https://example.com/image/fl/abc"), "00042");
/// ```
pub fn entry_name(ordinal: usize, source: &str) -> String {
    format!(
        "{:0width$}{}",
        ordinal + 1,
        extension_of(source),
        width = ENTRY_ORDINAL_WIDTH
    )
}

/// Extension (with leading dot) of the last path fragment of an address, or `""`.
///
/// Query strings and fragments are ignored.
pub fn extension_of(source: &str) -> String {
    let path = match url::Url::parse(source) {
        Ok(url) => url.path().to_string(),
        Err(_) => source
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let last = path.rsplit('/').next().unwrap_or_default();
    Path::new(last)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Directory and file an episode container is written to:
/// `{output_root}/{artist}/{album}/{episode}.{extension}`.
///
/// Only the last three segments of the locator are used.
pub fn container_path(
    output_root: &Path,
    locator: &Locator,
    extension: &str,
) -> Option<(PathBuf, PathBuf)> {
    let segments = locator.segments();
    if segments.len() < 3 {
        return None;
    }
    let tail = &segments[segments.len() - 3..];

    let directory = output_root.join(&tail[0]).join(&tail[1]);
    let file = directory.join(format!("{}.{}", tail[2], extension.trim_start_matches('.')));
    Some((directory, file))
}

/// Create `directory` and its parents, owner-only on Unix.
pub fn create_output_dir(directory: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    builder
        .create(directory)
        .map_err(|source| Error::CreateOutput {
            path: directory.to_path_buf(),
            source,
        })
}

/// Build the HTTP client shared by link extraction and page fetching.
///
/// Only connecting is bounded here. Callers bound each request themselves, so
/// a response waiting on the archive writer never runs out of time.
pub fn build_client(site: &SiteConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(site.user_agent.clone())
        .connect_timeout(site.request_timeout)
        .build()?;
    Ok(client)
}
