//! Source categories and their synthesis weights.
//!
//! A [`CategoryRegistry`] is the ordered set of categories a run accepts.
//! Each category carries a weight: a multiplier reflecting how much a
//! source of that kind counts when patterns and opportunities are scored.
//! The registry is supplied through configuration before a run starts; the
//! pipeline never computes it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Category key → source count. Ordered by key so serialized output is
/// stable.
pub type CategoryBreakdown = BTreeMap<String, u32>;

/// Display metadata and weight for one source category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryInfo {
    /// Stable key used in source ids and breakdowns (e.g. "customer_calls").
    pub key: String,

    /// Human-readable label (e.g. "Customer-Facing Calls").
    pub label: String,

    /// Short description of what belongs in this category.
    #[serde(default)]
    pub description: String,

    /// Scoring multiplier for sources of this category.
    pub weight: f64,
}

impl CategoryInfo {
    /// Create a category entry.
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            description: description.into(),
            weight,
        }
    }
}

/// The ordered set of configured source categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CategoryRegistry {
    categories: Vec<CategoryInfo>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryRegistry {
    /// Build a registry from an explicit list. Call [`validate`](Self::validate)
    /// before using it for a run.
    pub fn new(categories: Vec<CategoryInfo>) -> Self {
        Self { categories }
    }

    /// The five built-in categories.
    pub fn builtin() -> Self {
        Self::new(vec![
            CategoryInfo::new(
                "customer_calls",
                "Customer-Facing Calls",
                "Sales calls, discovery calls, CS calls; direct customer voice",
                3.0,
            ),
            CategoryInfo::new(
                "internal_meetings",
                "Internal Meetings",
                "Planning, retros, standups, strategy sessions",
                2.0,
            ),
            CategoryInfo::new(
                "support_tickets",
                "Support Tickets",
                "CS tickets, bug reports, feature requests",
                1.5,
            ),
            CategoryInfo::new(
                "other_sources",
                "Other Sources",
                "Slack threads, emails, documents",
                1.0,
            ),
            CategoryInfo::new(
                "miscellaneous",
                "Miscellaneous",
                "Catch-all for anything else",
                1.0,
            ),
        ])
    }

    /// Iterate categories in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryInfo> {
        self.categories.iter()
    }

    /// Category keys in configured order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }

    /// Number of configured categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether no category is configured.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Look up a category by key.
    pub fn get(&self, key: &str) -> Option<&CategoryInfo> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Whether `key` names a configured category.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Weight for `key`, if configured.
    pub fn weight(&self, key: &str) -> Option<f64> {
        self.get(key).map(|c| c.weight)
    }

    /// Label for `key`, falling back to the key itself.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map_or(key, |c| c.label.as_str())
    }

    /// A breakdown with a zero entry for every configured category.
    pub fn empty_breakdown(&self) -> CategoryBreakdown {
        self.keys().map(|k| (k.to_string(), 0)).collect()
    }

    /// Check the registry is usable: non-empty, unique non-blank keys,
    /// finite non-negative weights.
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(ConfigError::invalid("at least one category is required"));
        }
        let mut seen = HashSet::new();
        for cat in &self.categories {
            if cat.key.trim().is_empty() {
                return Err(ConfigError::invalid("category key must not be empty"));
            }
            if !seen.insert(cat.key.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate category key: {}",
                    cat.key
                )));
            }
            if !cat.weight.is_finite() || cat.weight < 0.0 {
                return Err(ConfigError::invalid(format!(
                    "category {} has invalid weight {}",
                    cat.key, cat.weight
                )));
            }
        }
        Ok(())
    }
}
