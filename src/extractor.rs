//! Link extraction from remote listing pages.
//!
//! Artist and album pages list their children as links; episode pages list their
//! pages as images. Both live inside a single container element, and only that
//! container is searched so navigation links elsewhere on the page are ignored.

use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError, Result};
use crate::locator::Resolver;
use crate::types::Locator;

/// Abstraction over child-link and asset-address discovery, enabling testability.
#[async_trait::async_trait]
pub trait LinkExtractor: Send + Sync {
    /// Locators of the resources listed on the page at `address`, in document order.
    async fn child_locators(&self, address: &Url) -> std::result::Result<Vec<Locator>, ExtractionError>;

    /// Raw page asset addresses listed on the episode page at `address`, in document order.
    async fn asset_addresses(&self, address: &Url) -> std::result::Result<Vec<String>, ExtractionError>;
}

/// Compiled selectors for one site layout
#[derive(Debug, Clone)]
struct Selectors {
    container: Selector,
    child: Selector,
    child_attribute: String,
    asset: Selector,
    asset_attribute: String,
}

impl Selectors {
    fn compile(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            container: compile_selector(&config.container_selector, "container_selector")?,
            child: compile_selector(&config.child_selector, "child_selector")?,
            child_attribute: config.child_attribute.clone(),
            asset: compile_selector(&config.asset_selector, "asset_selector")?,
            asset_attribute: config.asset_attribute.clone(),
        })
    }
}

fn compile_selector(selector: &str, key: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| Error::Config {
        message: format!("invalid CSS selector {:?}: {}", selector, e),
        key: Some(key.to_string()),
    })
}

/// Production [`LinkExtractor`] that fetches pages over HTTP and parses their markup.
pub struct HtmlLinkExtractor {
    client: reqwest::Client,
    resolver: Arc<Resolver>,
    selectors: Selectors,
    request_timeout: Duration,
}

impl HtmlLinkExtractor {
    /// Create an extractor sharing `client` with the rest of the pipeline.
    ///
    /// Each document must arrive in full within `request_timeout`.
    pub fn new(
        client: reqwest::Client,
        resolver: Arc<Resolver>,
        config: &ExtractionConfig,
        request_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client,
            resolver,
            selectors: Selectors::compile(config)?,
            request_timeout,
        })
    }

    async fn fetch_document(&self, address: &Url) -> std::result::Result<String, ExtractionError> {
        tokio::time::timeout(self.request_timeout, self.read_document(address))
            .await
            .map_err(|_| ExtractionError::Timeout {
                url: address.to_string(),
                timeout: self.request_timeout,
            })?
    }

    async fn read_document(&self, address: &Url) -> std::result::Result<String, ExtractionError> {
        let request_error = |source| ExtractionError::Request {
            url: address.to_string(),
            source,
        };

        let response = self
            .client
            .get(address.clone())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ExtractionError::Status {
                url: address.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(request_error)
    }
}

#[async_trait::async_trait]
impl LinkExtractor for HtmlLinkExtractor {
    async fn child_locators(&self, address: &Url) -> std::result::Result<Vec<Locator>, ExtractionError> {
        let body = self.fetch_document(address).await?;
        let links = select_links(
            &body,
            &self.selectors.container,
            &self.selectors.child,
            &self.selectors.child_attribute,
        );

        let mut locators = Vec::with_capacity(links.len());
        for link in links {
            match self.resolver.resolve(&link) {
                Ok(locator) => locators.push(locator),
                Err(e) => {
                    tracing::warn!(url = %address, link = %link, error = %e, "Skipping unrecognised child link");
                }
            }
        }

        tracing::debug!(url = %address, children = locators.len(), "Extracted child locators");
        Ok(locators)
    }

    async fn asset_addresses(&self, address: &Url) -> std::result::Result<Vec<String>, ExtractionError> {
        let body = self.fetch_document(address).await?;
        let assets = select_links(
            &body,
            &self.selectors.container,
            &self.selectors.asset,
            &self.selectors.asset_attribute,
        );

        tracing::debug!(url = %address, assets = assets.len(), "Extracted asset addresses");
        Ok(assets)
    }
}

/// Collect `attribute` of every `item` element inside the first `container` element.
///
/// A document without a container yields no links.
pub(crate) fn select_links(
    html: &str,
    container: &Selector,
    item: &Selector,
    attribute: &str,
) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(root) = document.select(container).next() else {
        return Vec::new();
    };

    root.select(item)
        .filter_map(|element| element.value().attr(attribute))
        .map(str::to_string)
        .collect()
}
