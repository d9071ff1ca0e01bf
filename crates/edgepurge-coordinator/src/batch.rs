//! Accumulating invalidation paths into a batch.
//!
//! [`BatchBuilder::put`] accepts anything a host might hand over: absolute
//! URLs, protocol-relative URLs, absolute paths or bare relative paths. Each
//! is reduced to its path component, resolved against `/` and deduplicated.
//! Inputs that cannot be reduced to an HTTP path are dropped.

use edgepurge_core::{DEFAULT_MAX_ITEMS, InvalidationBatch, InvalidationPath};
use tracing::debug;
use url::{ParseError, Url};

use crate::policy::{FilterContext, PathFilter};

/// Builds an [`InvalidationBatch`] from raw paths and URLs.
///
/// # Examples
///
/// ```
/// use edgepurge_coordinator::BatchBuilder;
///
/// let mut builder = BatchBuilder::default();
/// builder.put("http://example.org/a/b?x=1");
/// builder.put("/a/b");
/// assert_eq!(builder.get_items(), vec!["/a/b"]);
/// ```
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    batch: InvalidationBatch,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl BatchBuilder {
    /// Create an empty builder with the given overflow threshold.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            batch: InvalidationBatch::new(max_items),
        }
    }

    /// Add a path or URL. Returns `true` if a new path was stored.
    pub fn put(&mut self, raw: &str) -> bool {
        match normalize_path(raw) {
            Some(path) => self.batch.insert(path),
            None => {
                debug!(input = raw, "dropping path that cannot be normalized");
                false
            }
        }
    }

    /// Let an external filter rewrite the current path set.
    pub fn apply_external_filter(&mut self, filter: &dyn PathFilter, context: &FilterContext) {
        let items = self.batch.items().to_vec();
        let mut filtered = InvalidationBatch::new(self.batch.max_items());
        for path in filter.filter(items, context) {
            filtered.insert(path);
        }
        self.batch = filtered;
    }

    /// Number of distinct stored paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// The paths that would be sent; `["/*"]` when empty or above the threshold.
    #[must_use]
    pub fn get_items(&self) -> Vec<String> {
        self.batch.effective_items()
    }

    /// Finish the batch.
    #[must_use]
    pub fn build(self) -> InvalidationBatch {
        self.batch
    }
}

/// Reduce a URL or path to a normalized invalidation path.
///
/// # Examples
///
/// ```
/// use edgepurge_coordinator::normalize_path;
///
/// assert_eq!(normalize_path("https://example.org/").unwrap().as_str(), "/");
/// assert_eq!(normalize_path("hello-world/*").unwrap().as_str(), "/hello-world/*");
/// assert!(normalize_path("mailto:someone@example.org").is_none());
/// ```
#[must_use]
pub fn normalize_path(raw: &str) -> Option<InvalidationPath> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return None;
    }

    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) if trimmed.starts_with("//") => {
            Url::parse(&format!("http:{trimmed}")).ok()?
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://localhost/").ok()?;
            base.join(&format!("/{}", trimmed.trim_start_matches('/')))
                .ok()?
        }
        Err(_) => return None,
    };

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return None;
    }

    InvalidationPath::new(url.path()).ok()
}
