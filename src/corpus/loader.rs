//! @ai:module:intent Load extraction suites from TOML or JSON files
//! @ai:module:layer infrastructure
//! @ai:module:public_api SuiteLoader, SuiteLoaderTrait
//! @ai:module:stateless true

use crate::corpus::suite::{Suite, SuiteFile};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// @ai:intent Trait for loading test suites
pub trait SuiteLoaderTrait: Send + Sync {
    /// @ai:intent Load one suite file
    fn load_file(&self, path: &Path) -> Result<Suite>;

    /// @ai:intent Load a suite file, or every suite below a directory
    fn load(&self, path: &Path) -> Result<Vec<Suite>>;
}

/// @ai:intent Reads suites from `*.toml` and `*.json` files
pub struct SuiteLoader;

impl SuiteLoader {
    /// @ai:intent Create a new suite loader
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Parse a suite file by extension
    /// @ai:effects fs:read
    fn parse_suite_file(path: &Path) -> Result<SuiteFile> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse suite file: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse suite file: {}", path.display()))
        }
    }

    /// @ai:intent Find suite files below a directory, in path order
    /// @ai:effects fs:read
    fn find_suite_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "toml" || ext == "json")
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        files
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|ext| ext == "json").unwrap_or(false)
}

impl Default for SuiteLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteLoaderTrait for SuiteLoader {
    /// @ai:effects fs:read
    fn load_file(&self, path: &Path) -> Result<Suite> {
        let file = Self::parse_suite_file(path)?;
        Suite::from_file(file, path)
    }

    /// @ai:intent Files load strictly; in a directory, unreadable suites are skipped with a warning
    /// @ai:effects fs:read
    fn load(&self, path: &Path) -> Result<Vec<Suite>> {
        if !path.is_dir() {
            return Ok(vec![self.load_file(path)?]);
        }

        let mut suites = Vec::new();
        for file in Self::find_suite_files(path) {
            match self.load_file(&file) {
                Ok(suite) => suites.push(suite),
                Err(e) => {
                    tracing::warn!("Skipping invalid suite file {}: {:#}", file.display(), e);
                }
            }
        }

        if suites.is_empty() {
            anyhow::bail!("No suite files found in {}", path.display());
        }

        Ok(suites)
    }
}
