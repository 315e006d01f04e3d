//! Collection names and records

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// A single domain record. Shapes vary per collection, so records stay
/// free-form JSON.
pub type Record = serde_json::Value;

pub const SITES: &str = "sites";
pub const PROGRESS: &str = "progress";
pub const EQUIPMENT: &str = "equipment";
pub const ISSUES: &str = "issues";
pub const PHOTOS: &str = "photos";
pub const UPDATES: &str = "updates";

/// Collections refreshed by a full dashboard refresh unless configured otherwise.
pub const DEFAULT_COLLECTIONS: [&str; 6] = [SITES, PROGRESS, EQUIPMENT, ISSUES, PHOTOS, UPDATES];

const MAX_NAME_LEN: usize = 64;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("Invalid regex"));

/// Name of a remote collection (one spreadsheet sheet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    /// Validate and wrap a collection name.
    ///
    /// Valid names match `[A-Za-z][A-Za-z0-9_-]*` and are at most 64 characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }
        if name.len() > MAX_NAME_LEN || !NAME_PATTERN.is_match(&name) {
            return Err(Error::Validation(format!(
                "Invalid collection name '{name}'"
            )));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn progress() -> Self {
        Self(PROGRESS.to_string())
    }

    #[must_use]
    pub fn issues() -> Self {
        Self(ISSUES.to_string())
    }

    #[must_use]
    pub fn photos() -> Self {
        Self(PHOTOS.to_string())
    }

    /// The built-in dashboard collections.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        DEFAULT_COLLECTIONS
            .iter()
            .map(|name| Self((*name).to_string()))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for CollectionName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0
    }
}
