//! Invalidation paths and batches.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// The path that invalidates every object of a distribution.
pub const FULL_SITE_PATH: &str = "/*";

/// Default threshold above which a batch collapses to [`FULL_SITE_PATH`].
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// A normalized invalidation path.
///
/// Always starts with `/` and may end with the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvalidationPath(String);

impl InvalidationPath {
    /// Validate an already normalized path.
    ///
    /// # Errors
    /// Returns an error if the path does not start with `/` or contains
    /// control characters.
    pub fn new(path: impl Into<String>) -> CoreResult<Self> {
        let path = path.into();
        if !path.starts_with('/') || path.chars().any(char::is_control) {
            return Err(CoreError::InvalidPath(path));
        }
        Ok(Self(path))
    }

    /// The full-site wildcard path.
    #[must_use]
    pub fn full_site() -> Self {
        Self(FULL_SITE_PATH.to_owned())
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the path ends with the `*` wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with('*')
    }
}

impl TryFrom<String> for InvalidationPath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InvalidationPath> for String {
    fn from(path: InvalidationPath) -> Self {
        path.0
    }
}

impl fmt::Display for InvalidationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A set of paths submitted as one invalidation.
///
/// Items keep their first-insertion order for display. Equality ignores that
/// order, the caller reference and the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationBatch {
    items: Vec<InvalidationPath>,
    caller_reference: String,
    #[serde(default = "default_max_items")]
    max_items: usize,
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

impl Default for InvalidationBatch {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl PartialEq for InvalidationBatch {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&InvalidationPath> = self.items.iter().collect();
        let theirs: HashSet<&InvalidationPath> = other.items.iter().collect();
        ours == theirs
    }
}

impl Eq for InvalidationBatch {}

impl InvalidationBatch {
    /// An empty batch with a fresh caller reference.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            caller_reference: new_caller_reference(),
            max_items,
        }
    }

    /// A batch holding only [`FULL_SITE_PATH`].
    #[must_use]
    pub fn full_site(max_items: usize) -> Self {
        let mut batch = Self::new(max_items);
        batch.insert(InvalidationPath::full_site());
        batch
    }

    /// Add a path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: InvalidationPath) -> bool {
        if self.items.contains(&path) {
            return false;
        }
        self.items.push(path);
        true
    }

    /// Merge another batch into this one and issue a new caller reference.
    pub fn merge(&mut self, other: &Self) {
        for path in &other.items {
            self.insert(path.clone());
        }
        self.caller_reference = new_caller_reference();
    }

    /// The stored paths, in first-insertion order.
    #[must_use]
    pub fn items(&self) -> &[InvalidationPath] {
        &self.items
    }

    /// Number of distinct stored paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no paths are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Threshold above which the batch collapses to [`FULL_SITE_PATH`].
    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// The paths to send.
    ///
    /// `["/*"]` when the batch is empty or holds more than `max_items` paths,
    /// otherwise the stored paths in insertion order.
    #[must_use]
    pub fn effective_items(&self) -> Vec<String> {
        if self.items.is_empty() || self.items.len() > self.max_items {
            return vec![FULL_SITE_PATH.to_owned()];
        }
        self.items.iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Whether the paths to send are exactly the full-site wildcard.
    #[must_use]
    pub fn is_full_site(&self) -> bool {
        let effective = self.effective_items();
        effective.len() == 1 && effective[0] == FULL_SITE_PATH
    }

    /// Unique token identifying this submission.
    #[must_use]
    pub fn caller_reference(&self) -> &str {
        &self.caller_reference
    }

    /// Replace the caller reference.
    #[must_use]
    pub fn with_caller_reference(mut self, caller_reference: impl Into<String>) -> Self {
        self.caller_reference = caller_reference.into();
        self
    }
}

fn new_caller_reference() -> String {
    format!("edgepurge-{}", Uuid::new_v4())
}
