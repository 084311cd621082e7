// THEORY:
// The manifest is the side channel that travels with the images: one entry per
// variant, naming the file it was saved under and carrying its metadata. The
// entries are sorted by that generated name so the document reads in the same
// order as a directory listing.

use crate::error::Result;
use crate::pipeline::{VariantMetadata, VariantResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "metadata.json";

/// `variant_001.png` for index 0.
pub fn variant_file_name(index: usize) -> String {
    format!("variant_{:03}.png", index + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(flatten)]
    pub metadata: VariantMetadata,
}

/// All entries of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variant's metadata under its generated file name.
    pub fn push(&mut self, metadata: VariantMetadata) -> &ManifestEntry {
        let name = variant_file_name(metadata.index);
        self.entries.push(ManifestEntry { name, metadata });
        &self.entries[self.entries.len() - 1]
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> Vec<&ManifestEntry> {
        let mut sorted: Vec<&ManifestEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON array, sorted by name.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries())?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl FromIterator<VariantMetadata> for Manifest {
    fn from_iter<I: IntoIterator<Item = VariantMetadata>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for metadata in iter {
            manifest.push(metadata);
        }
        manifest
    }
}

/// Writes one variant as PNG into `dir` and returns the file's path.
pub fn save_variant(dir: impl AsRef<Path>, result: &VariantResult) -> Result<PathBuf> {
    let path = dir.as_ref().join(variant_file_name(result.index));
    std::fs::write(&path, result.image.to_png()?)?;
    Ok(path)
}
