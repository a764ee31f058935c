//! Locator resolution: raw input ⇄ [`Locator`] ⇄ remote address.

use regex::Regex;
use url::Url;

use crate::config::SiteConfig;
use crate::error::{AssetAddressError, Error, LocatorError, Result};
use crate::types::Locator;

/// Optional scheme and host, optional `comics/` and `album/`|`picture/` prefixes,
/// then up to three identifier segments.
const LOCATOR_PATTERN: &str = r"^/?(?:[A-Za-z][A-Za-z0-9+.\-]*://[^/]+/?)?(?:[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)+(?::\d+)?/)?(?:comics/)?(?:(?:picture|album)/)?(?P<artist>[A-Za-z0-9\-]+)/?(?:(?P<album>[A-Za-z0-9\-]+)/?)?(?:(?P<episode>[A-Za-z0-9\-]+)/?)?";

/// Resolves user input and discovered links against one remote site.
#[derive(Clone, Debug)]
pub struct Resolver {
    base: Url,
    album_path: Vec<String>,
    asset_size_segment: String,
    pattern: Regex,
}

impl Resolver {
    /// Build a resolver for the site described by `site`.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let base = Url::parse(&site.base_url)?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("{} cannot be used as a base address", site.base_url),
                key: Some("base_url".to_string()),
            });
        }
        let pattern = Regex::new(LOCATOR_PATTERN)
            .map_err(|e| Error::Other(format!("locator pattern failed to compile: {e}")))?;

        Ok(Self {
            base,
            album_path: split_fragments(&site.album_path),
            asset_size_segment: site.asset_size_segment.clone(),
            pattern,
        })
    }

    /// Parse a complete or partial address into a locator.
    ///
    /// ```
    /// use episode_dl::{config::SiteConfig, locator::Resolver, Kind};
    ///
    /// let resolver = Resolver::new(&SiteConfig::default()).unwrap();
    /// let locator = resolver
    ///     .resolve("https://comics.8muses.com/comics/album/artist/album/episode-1")
    ///     .unwrap();
    /// assert_eq!(locator.kind(), Kind::Episode);
    /// ```
    pub fn resolve(&self, raw: &str) -> std::result::Result<Locator, LocatorError> {
        let no_match = || LocatorError::NoMatch {
            input: raw.to_string(),
        };

        let captures = self.pattern.captures(raw.trim()).ok_or_else(no_match)?;
        let segments: Vec<&str> = ["artist", "album", "episode"]
            .into_iter()
            .filter_map(|group| captures.name(group).map(|m| m.as_str()))
            .collect();

        if segments.is_empty() {
            return Err(no_match());
        }
        Locator::new(segments)
    }

    /// Canonical remote address of the resource a locator names.
    pub fn address_of(&self, locator: &Locator) -> Result<Url> {
        let fragments = self
            .album_path
            .iter()
            .map(String::as_str)
            .chain(locator.segments().iter().map(String::as_str));
        self.join(fragments)
    }

    /// Fetch address for an asset address found on an episode page.
    ///
    /// The last three path fragments are kept and the middle one (the size
    /// variant) is replaced, so thumbnails resolve to their full-size image.
    pub fn asset_address(&self, raw: &str) -> std::result::Result<Url, AssetAddressError> {
        let path = match Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => raw.to_string(),
        };
        let fragments = split_fragments(&path);
        if fragments.len() < 3 {
            return Err(AssetAddressError::TooFewFragments {
                address: raw.to_string(),
                found: fragments.len(),
            });
        }

        let mut tail: Vec<&str> = fragments[fragments.len() - 3..]
            .iter()
            .map(String::as_str)
            .collect();
        tail[1] = self.asset_size_segment.as_str();

        self.join(tail.into_iter())
            .map_err(|e| AssetAddressError::Join {
                address: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Base address of the site
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn join<'a>(&self, fragments: impl Iterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Other(format!("{} cannot be a base address", self.base)))?;
            path.pop_if_empty();
            path.extend(fragments);
        }
        Ok(url)
    }
}

fn split_fragments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
