//! Category label → OSM tag table.
//!
//! The built-in table is embedded at compile time from `categories.toml`.
//! A deployment may replace it with its own TOML file of the same shape
//! (see [`CategoryTable::from_file`]). The table is built once at startup
//! and handed to the parameter builder; nothing here is global.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geosearch_search_models::OsmTagSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_TOML: &str = include_str!("../categories.toml");

/// An OSM `key=value` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsmTag {
    /// Tag key (e.g. `"amenity"`).
    pub key: String,
    /// Tag value (e.g. `"cafe"`).
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    category: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    label: String,
    key: String,
    value: String,
}

/// Errors from loading a category table.
#[derive(Debug, Error)]
pub enum CategoryTableError {
    /// The file could not be read.
    #[error("Failed to read category table {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML is malformed.
    #[error("Failed to parse category table: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two entries normalize to the same label.
    #[error("Duplicate category label '{label}'")]
    DuplicateLabel {
        /// The repeated label.
        label: String,
    },

    /// An entry has a blank label, key or value, or a key containing `:`.
    #[error("Invalid category entry '{label}': {message}")]
    InvalidEntry {
        /// The entry's label as written.
        label: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Immutable mapping from normalized category label to OSM tag.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    tags: BTreeMap<String, OsmTag>,
}

impl CategoryTable {
    /// Returns the table compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `categories.toml` is malformed.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse built-in category table: {e}"))
    }

    /// Parses a table from TOML of the form
    /// `category = [{ label = "cafe", key = "amenity", value = "cafe" }]`.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryTableError`] if the TOML is malformed, an entry is
    /// blank, or two labels collide after normalization.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, CategoryTableError> {
        let file: CategoryFile = toml::from_str(toml_str)?;
        let mut tags = BTreeMap::new();

        for entry in file.category {
            let label = normalize_label(&entry.label);
            let key = entry.key.trim();
            let value = entry.value.trim();

            if label.is_empty() || key.is_empty() || value.is_empty() {
                return Err(CategoryTableError::InvalidEntry {
                    label: entry.label,
                    message: "label, key and value must be non-blank".to_string(),
                });
            }
            if key.contains(':') {
                return Err(CategoryTableError::InvalidEntry {
                    label: entry.label,
                    message: format!("key '{key}' must not contain ':'"),
                });
            }

            let tag = OsmTag {
                key: key.to_string(),
                value: value.to_string(),
            };
            if tags.insert(label.clone(), tag).is_some() {
                return Err(CategoryTableError::DuplicateLabel { label });
            }
        }

        Ok(Self { tags })
    }

    /// Reads and parses a table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryTableError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, CategoryTableError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CategoryTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Looks up a label, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&OsmTag> {
        self.tags.get(&normalize_label(label))
    }

    /// Maps category labels to a tag set, silently dropping unknown labels.
    ///
    /// Returns `None` when no label resolves.
    #[must_use]
    pub fn resolve(&self, labels: &[String]) -> Option<OsmTagSet> {
        let mut set = OsmTagSet::new();
        for tag in labels.iter().filter_map(|label| self.get(label)) {
            set.insert(&tag.key, &tag.value);
        }
        (!set.is_empty()).then_some(set)
    }

    /// Iterates `(label, tag)` in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsmTag)> {
        self.tags.iter().map(|(label, tag)| (label.as_str(), tag))
    }

    /// Number of labels in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the table has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}
