//! Class catalog: display label and reward points per detector class.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::ScanError;

/// Human-readable class names supplied by a detector model.
pub type ClassNames = HashMap<u32, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub label: String,
    pub points: u32,
}

/// Immutable index -> (label, points) table, built once at startup and
/// passed by reference into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    entries: BTreeMap<u32, ClassEntry>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(rename = "class", default)]
    classes: Vec<CatalogRow>,
}

#[derive(Deserialize)]
struct CatalogRow {
    index: u32,
    label: String,
    points: u32,
}

impl ClassCatalog {
    /// The battery catalog: AAA, AA, C, D and 9V.
    pub fn batteries() -> Self {
        Self::from_entries([(0, "AAA", 5), (1, "AA", 10), (2, "C", 20), (3, "D", 20), (4, "9V", 50)])
    }

    pub fn from_entries<'a>(rows: impl IntoIterator<Item = (u32, &'a str, u32)>) -> Self {
        let entries = rows
            .into_iter()
            .map(|(index, label, points)| {
                (index, ClassEntry { label: label.to_string(), points })
            })
            .collect();
        Self { entries }
    }

    /// Parse a TOML catalog made of `[[class]]` tables with `index`, `label`
    /// and `points` keys. Later rows with a repeated index win.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        let file: CatalogFile = toml::from_str(source)?;
        let entries = file
            .classes
            .into_iter()
            .map(|row| (row.index, ClassEntry { label: row.label, points: row.points }))
            .collect();
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let catalog_error = |message: String| ScanError::Catalog {
            path: path.to_path_buf(),
            message,
        };
        let source = std::fs::read_to_string(path).map_err(|e| catalog_error(e.to_string()))?;
        let catalog = Self::from_toml_str(&source).map_err(|e| catalog_error(e.to_string()))?;
        if catalog.is_empty() {
            return Err(catalog_error("no [[class]] entries".to_string()));
        }
        Ok(catalog)
    }

    pub fn get(&self, index: u32) -> Option<&ClassEntry> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the display label for a class.
    ///
    /// A name from the detector's own table takes precedence, then the
    /// catalog label, then the stringified index.
    pub fn label_for(&self, index: u32, names: Option<&ClassNames>) -> String {
        names
            .and_then(|names| names.get(&index))
            .or_else(|| self.get(index).map(|entry| &entry.label))
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    /// Reward points for a class; unknown classes earn nothing.
    pub fn points_for(&self, index: u32) -> u32 {
        self.get(index).map_or(0, |entry| entry.points)
    }
}
