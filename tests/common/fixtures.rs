//! Mock gallery site and configuration fixtures

use episode_dl::Config;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path prefix of every listing page
pub const ALBUM_PATH: &str = "/comics/album";

/// Configuration pointing at `server` and writing under `output`
pub fn test_config(server: &MockServer, output: &Path, concurrency: usize) -> Config {
    let mut config = Config::default();
    config.site.base_url = server.uri();
    config.site.request_timeout = Duration::from_secs(5);
    config.download.output_dir = output.to_path_buf();
    config.download.concurrency = concurrency;
    config
}

/// Artist or album page listing `children` (each an `artist/album[/episode]` path)
///
/// Carries a navigation link outside the gallery that must never be followed.
pub fn listing_html(children: &[&str]) -> String {
    let links: String = children
        .iter()
        .map(|child| format!(r#"<a href="{ALBUM_PATH}/{child}"><img src="/thumb.jpg"></a>"#))
        .collect();
    format!(
        r#"<html><body>
        <nav><a href="{ALBUM_PATH}/not-followed">Home</a></nav>
        <div class="gallery">{links}</div>
        </body></html>"#
    )
}

/// Episode page listing page images by their thumbnail addresses
pub fn episode_html(pages: &[&str]) -> String {
    let images: String = pages
        .iter()
        .map(|page| format!(r#"<div class="image"><img data-src="/image/th/{page}"></div>"#))
        .collect();
    format!(r#"<html><body><div class="gallery">{images}</div></body></html>"#)
}

/// Serve a listing page for `segments`
pub async fn mount_listing(server: &MockServer, segments: &str, children: &[&str]) {
    mount_html(server, segments, listing_html(children)).await;
}

/// Serve an episode page for `segments`
pub async fn mount_episode(server: &MockServer, segments: &str, pages: &[&str]) {
    mount_html(server, segments, episode_html(pages)).await;
}

async fn mount_html(server: &MockServer, segments: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("{ALBUM_PATH}/{segments}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Serve the full-size image of `page`
pub async fn mount_page(server: &MockServer, page: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/image/fl/{page}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Answer requests for `route` with `status` and no body
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
