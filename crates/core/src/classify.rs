//! Request classification.
//!
//! Every intercepted request falls into exactly one [`Category`]:
//! tile provider URLs first, then read-only requests outside the excluded
//! backend paths, then everything else.

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::AppConfig;
use crate::request::InterceptedRequest;

/// Routing category of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Tile,
    StaticCacheable,
    Passthrough,
}

/// Pure function from request to [`Category`].
#[derive(Debug, Clone)]
pub struct Classifier {
    tile_patterns: RegexSet,
    excluded_markers: Vec<String>,
}

impl Classifier {
    /// Build a classifier from tile URL regexes and passthrough substrings.
    pub fn new<I, S>(tile_patterns: I, excluded_markers: Vec<String>) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tile_patterns = RegexSet::new(tile_patterns).map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self { tile_patterns, excluded_markers })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(&config.tile_patterns, config.excluded_markers.clone())
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Category {
        let url = request.url().as_str();

        if self.tile_patterns.is_match(url) {
            return Category::Tile;
        }

        if request.is_get() && !self.excluded_markers.iter().any(|m| url.contains(m.as_str())) {
            return Category::StaticCacheable;
        }

        Category::Passthrough
    }
}
