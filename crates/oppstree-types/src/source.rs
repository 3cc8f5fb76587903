//! Normalized input documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::CategoryRegistry;
use crate::error::{ConfigError, Result};

/// Marker appended to content that was cut at the per-source budget when
/// the source was built.
pub const CONTENT_TRUNCATED_MARKER: &str = "\n\n[... content truncated ...]";

/// One normalized input document.
///
/// The id is derived from the category and the document's ordinal index
/// within that category (`customer_calls_000`), and the weight from the
/// category's configured weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Unique id, e.g. "customer_calls_001".
    pub id: String,

    /// Display filename.
    pub filename: String,

    /// Category key from the [`CategoryRegistry`].
    pub category: String,

    /// Extracted text content.
    pub content: String,

    /// Scoring weight inherited from the category.
    pub weight: f64,
}

impl Source {
    /// Build a source for the `index`-th document of `category`.
    ///
    /// Content longer than `max_chars` characters is cut and
    /// [`CONTENT_TRUNCATED_MARKER`] appended.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCategory`] if `category` is not in
    /// the registry.
    pub fn new(
        registry: &CategoryRegistry,
        category: &str,
        index: usize,
        filename: impl Into<String>,
        content: impl Into<String>,
        max_chars: usize,
    ) -> Result<Self> {
        let weight = registry
            .weight(category)
            .ok_or_else(|| ConfigError::UnknownCategory {
                category: category.to_string(),
            })?;

        let content = content.into();
        let content = match truncate_chars(&content, max_chars) {
            Some(head) => format!("{head}{CONTENT_TRUNCATED_MARKER}"),
            None => content,
        };

        Ok(Self {
            id: Self::make_id(category, index),
            filename: filename.into(),
            category: category.to_string(),
            content,
            weight,
        })
    }

    /// The id for the `index`-th document of `category`.
    pub fn make_id(category: &str, index: usize) -> String {
        format!("{category}_{index:03}")
    }
}

/// Return the first `max_chars` characters of `text` if it is longer than
/// that, `None` if it already fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> Option<&str> {
    text.char_indices()
        .nth(max_chars)
        .map(|(byte_idx, _)| &text[..byte_idx])
}

/// Count sources per category key.
pub fn count_by_category(sources: &[Source]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for s in sources {
        *counts.entry(s.category.clone()).or_insert(0) += 1;
    }
    counts
}
