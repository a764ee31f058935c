//! Error types for episode-dl
//!
//! Errors fall into two groups:
//! - **Top-level** failures ([`LocatorError`], [`ExtractionError`]) abort the
//!   call chain that produced them and are returned from resolution and traversal.
//! - **Per-asset** failures ([`AssetAddressError`], [`FetchError`]) are logged and
//!   recovered inside the pipeline; they still flow through archive bookkeeping.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Kind;

/// Result type alias for episode-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for episode-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// A user-supplied locator could not be parsed
    #[error("invalid locator: {0}")]
    Locator(#[from] LocatorError),

    /// Child links or asset addresses could not be extracted from a remote document
    #[error("link extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// A discovered asset address could not be turned into a fetch address
    #[error("invalid asset address: {0}")]
    AssetAddress(#[from] AssetAddressError),

    /// Fetching a single asset failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A branch of the hierarchy failed during traversal
    #[error("while traversing {kind} {locator}: {source}")]
    Traversal {
        /// Level of the branch that failed
        kind: Kind,
        /// Display form of the branch locator
        locator: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Archive container could not be created or written
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Output directory or container could not be created
    #[error("failed to create {path}: {source}")]
    CreateOutput {
        /// Path that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The pipeline has been shut down and no longer accepts work
    #[error("pipeline is shut down")]
    ShutDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the pipeline recovers from this error locally.
    ///
    /// Recoverable errors concern a single asset: they are logged, the asset is left
    /// out of its archive, and the rest of the episode proceeds. Everything else
    /// terminates the call chain that produced it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::AssetAddress(_) | Error::Fetch(_) => true,
            Error::Traversal { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Wrap this error with the branch it occurred in.
    pub(crate) fn in_branch(self, kind: Kind, locator: impl Into<String>) -> Self {
        Error::Traversal {
            kind,
            locator: locator.into(),
            source: Box::new(self),
        }
    }
}

/// Locator parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    /// No artist/album/episode segments could be found in the input
    #[error("no artist, album or episode found in {input:?}")]
    NoMatch {
        /// The raw input that was rejected
        input: String,
    },

    /// A locator was built from an empty segment list
    #[error("a locator needs at least one segment")]
    Empty,

    /// A locator was built from more than three segments
    #[error("a locator has at most three segments, found {found}")]
    TooManySegments {
        /// Number of segments supplied
        found: usize,
    },

    /// A locator does not have the depth its expected level requires
    #[error("{locator} does not name an {expected}")]
    WrongDepth {
        /// Level the locator was expected to name
        expected: Kind,
        /// Display form of the locator
        locator: String,
    },

    /// A segment contains characters outside `[A-Za-z0-9-]`
    #[error("invalid locator segment {segment:?}")]
    InvalidSegment {
        /// The offending segment
        segment: String,
    },
}

/// Link extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document responded with a non-200 status
    #[error("status code error: {status} for url: {url}")]
    Status {
        /// Document address
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The document could not be requested or read
    #[error("request for {url} failed: {source}")]
    Request {
        /// Document address
        url: String,
        /// The transport error
        #[source]
        source: reqwest::Error,
    },

    /// The document did not arrive in time
    #[error("no document from {url} within {timeout:?}")]
    Timeout {
        /// Document address
        url: String,
        /// Time allowed for the document
        timeout: std::time::Duration,
    },
}

/// Asset address errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetAddressError {
    /// The asset address has too few path fragments to rewrite
    #[error("expected asset location {address:?} to have at least 3 fragments: found {found}")]
    TooFewFragments {
        /// The raw asset address
        address: String,
        /// Number of non-empty fragments found
        found: usize,
    },

    /// The rewritten fragments could not be joined onto the base address
    #[error("could not join {address:?} onto the base address: {reason}")]
    Join {
        /// The raw asset address
        address: String,
        /// The URL error
        reason: String,
    },
}

/// Asset fetch errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The asset responded with a non-200 status
    #[error("status code error: {status} for url: {url}")]
    Status {
        /// Asset address
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The request could not be sent or no response arrived
    #[error("request for {url} failed: {message}")]
    Transport {
        /// Asset address
        url: String,
        /// Transport error text
        message: String,
    },

    /// The response body broke off or stalled before it could be archived
    #[error("reading body of {url} failed: {message}")]
    Body {
        /// Asset address
        url: String,
        /// Read error text
        message: String,
    },

    /// The asset address was malformed and never fetched
    #[error("{0}")]
    Address(String),
}
