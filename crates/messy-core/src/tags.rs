//! Category alias table used when filtering notes by tag.
//!
//! The browse screen offers short category names ("Events") while the
//! server labels notes with longer tags ("Events/Posters"). The table is
//! configuration: filtering only asks it which label a category means.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::defaults::ALL_FILTER;
use crate::error::{Error, Result};

/// Built-in category aliases.
static DEFAULT_ALIASES: Lazy<Vec<(&'static str, &'static str)>> =
    Lazy::new(|| vec![("Events", "Events/Posters")]);

/// Environment variable overriding the alias table.
/// Format: `Category=Label` pairs separated by `;`.
pub const TAG_ALIASES_ENV: &str = "MESSY_TAG_ALIASES";

/// Mapping from filter category to the tag label it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAliases {
    aliases: HashMap<String, String>,
}

impl Default for TagAliases {
    fn default() -> Self {
        Self {
            aliases: DEFAULT_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl TagAliases {
    /// Empty table: every filter maps to itself.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Add or replace one alias.
    pub fn with_alias(mut self, category: impl Into<String>, label: impl Into<String>) -> Self {
        self.aliases.insert(category.into(), label.into());
        self
    }

    /// Parse `Category=Label;Category=Label`.
    pub fn parse(table_str: &str) -> Result<Self> {
        let mut table = Self::empty();
        for pair in table_str.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (category, label) = pair.split_once('=').ok_or_else(|| {
                Error::Config(format!("tag alias '{}' is not Category=Label", pair))
            })?;
            let (category, label) = (category.trim(), label.trim());
            if category.is_empty() || label.is_empty() {
                return Err(Error::Config(format!("tag alias '{}' has an empty side", pair)));
            }
            table.aliases.insert(category.to_string(), label.to_string());
        }
        Ok(table)
    }

    /// Load from `MESSY_TAG_ALIASES`, falling back to the defaults.
    pub fn from_env() -> Self {
        match std::env::var(TAG_ALIASES_ENV) {
            Ok(value) => Self::parse(&value).unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring malformed {}, using defaults", TAG_ALIASES_ENV);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Tag label selected by `filter`.
    pub fn resolve<'a>(&'a self, filter: &'a str) -> &'a str {
        self.aliases.get(filter).map(String::as_str).unwrap_or(filter)
    }

    /// Whether `filter` is the select-everything sentinel.
    pub fn is_all(filter: &str) -> bool {
        filter == ALL_FILTER
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
