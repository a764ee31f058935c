//! Core types for episode-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::LocatorError;

/// Unique identifier for an archive job within one pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level of a locator in the artist → album → episode hierarchy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A single episode; the only level that produces pages
    Episode,
    /// An album of episodes
    Album,
    /// An artist with one or more albums
    Artist,
}

impl Kind {
    /// Kind implied by the number of locator segments
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(Kind::Artist),
            2 => Some(Kind::Album),
            3 => Some(Kind::Episode),
            _ => None,
        }
    }

    /// The level one step down the hierarchy, `None` for episodes
    pub fn child(&self) -> Option<Self> {
        match self {
            Kind::Artist => Some(Kind::Album),
            Kind::Album => Some(Kind::Episode),
            Kind::Episode => None,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Kind::Episode => "episode",
            Kind::Album => "album",
            Kind::Artist => "artist",
        };
        f.write_str(name)
    }
}

/// Ordered identifier path naming an artist, album or episode.
///
/// Always holds one to three segments; the segment count determines the [`Kind`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Locator(Vec<String>);

impl Locator {
    /// Build a locator from its segments.
    ///
    /// Segments are trimmed of surrounding slashes and must be non-empty
    /// `[A-Za-z0-9-]` words.
    pub fn new<I, S>(segments: I) -> std::result::Result<Self, LocatorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = Vec::new();
        for segment in segments {
            let segment = segment.as_ref().trim_matches('/');
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(LocatorError::InvalidSegment {
                    segment: segment.to_string(),
                });
            }
            parts.push(segment.to_string());
        }

        match parts.len() {
            0 => Err(LocatorError::Empty),
            1..=3 => Ok(Self(parts)),
            found => Err(LocatorError::TooManySegments { found }),
        }
    }

    /// Level of this locator in the hierarchy
    pub fn kind(&self) -> Kind {
        // construction keeps the depth within 1..=3
        Kind::from_depth(self.0.len()).unwrap_or(Kind::Episode)
    }

    /// The identifier segments, artist first
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The last segment (the name of the resource itself)
    pub fn name(&self) -> &str {
        // never empty by construction
        self.0.last().map(String::as_str).unwrap_or_default()
    }
}

impl TryFrom<Vec<String>> for Locator {
    type Error = LocatorError;

    fn try_from(segments: Vec<String>) -> std::result::Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<Locator> for Vec<String> {
    fn from(locator: Locator) -> Self {
        locator.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Final state of one episode container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Job the container belonged to
    pub id: JobId,
    /// Episode display name
    pub name: String,
    /// Path of the closed container
    pub path: PathBuf,
    /// Number of pages the episode listed
    pub pieces: usize,
    /// Entries written into the container
    pub written: usize,
    /// Pages that could not be fetched or written
    pub failed: usize,
}

/// Event emitted while the pipeline runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An episode container was opened and its pages queued
    EpisodeQueued {
        /// Job ID
        id: JobId,
        /// Episode name
        name: String,
        /// Number of pages discovered
        pieces: usize,
    },

    /// A page was written into its episode container
    PageArchived {
        /// Job ID
        id: JobId,
        /// Entry name inside the container
        entry: String,
    },

    /// A page was skipped because it could not be fetched or written
    PageFailed {
        /// Job ID
        id: JobId,
        /// Entry name the page would have had
        entry: String,
        /// Error message
        error: String,
    },

    /// An episode container was closed
    EpisodeArchived(EpisodeSummary),
}
