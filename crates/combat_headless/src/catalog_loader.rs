//! Unit catalog loading.
//!
//! The catalog is a RON file of unit and upgrade data. The CLI takes an
//! explicit path, otherwise the location is resolved from the environment
//! and a few standard relative paths.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use combat_core::data::UnitCatalog;

/// Environment variable naming the catalog file.
pub const CATALOG_PATH_ENV: &str = "COMBAT_CATALOG_PATH";

/// Errors that can occur during catalog loading.
#[derive(Debug, Clone)]
pub enum CatalogLoadError {
    /// Failed to read file.
    IoError(String, String),
    /// Failed to parse or validate the catalog.
    ParseError(String, String),
    /// No catalog at any known location.
    NotFound(String),
}

impl std::fmt::Display for CatalogLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(path, msg) => write!(f, "IO error reading '{}': {}", path, msg),
            Self::ParseError(path, msg) => write!(f, "Invalid catalog '{}': {}", path, msg),
            Self::NotFound(what) => write!(f, "Catalog not found: {}", what),
        }
    }
}

impl std::error::Error for CatalogLoadError {}

/// Resolve the default catalog file.
///
/// Looks in order at:
/// 1. Environment variable `COMBAT_CATALOG_PATH`
/// 2. `./assets/data/catalog.ron` (repo root)
/// 3. `../../assets/data/catalog.ron` (running from a crate directory)
pub fn default_catalog_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CATALOG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "{} does not name a file", CATALOG_PATH_ENV);
    }

    let candidates = ["assets/data/catalog.ron", "../../assets/data/catalog.ron"];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Load and validate a catalog file.
pub fn load_catalog_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Arc<UnitCatalog>, CatalogLoadError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| CatalogLoadError::IoError(path.display().to_string(), e.to_string()))?;
    let catalog = UnitCatalog::from_ron_str(&content)
        .map_err(|e| CatalogLoadError::ParseError(path.display().to_string(), e.to_string()))?;
    tracing::debug!(path = %path.display(), units = catalog.len(), "Loaded catalog");
    Ok(Arc::new(catalog))
}

/// Load the catalog at `explicit`, or at the default location.
pub fn load_catalog(explicit: Option<&Path>) -> Result<Arc<UnitCatalog>, CatalogLoadError> {
    match explicit {
        Some(path) => load_catalog_from_path(path),
        None => {
            let path = default_catalog_path().ok_or_else(|| {
                CatalogLoadError::NotFound(format!(
                    "pass --catalog or set {}",
                    CATALOG_PATH_ENV
                ))
            })?;
            load_catalog_from_path(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/data/catalog.ron")
    }

    #[test]
    fn test_load_bundled_catalog() {
        let catalog = load_catalog(Some(&bundled())).unwrap();
        assert!(catalog.lookup("Marine").is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_catalog_from_path("does/not/exist.ron").unwrap_err();
        assert!(matches!(err, CatalogLoadError::IoError(..)));
        assert!(err.to_string().contains("does/not/exist.ron"));
    }

    #[test]
    fn test_bad_catalog_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        std::fs::write(&path, "CatalogData(units: [").unwrap();
        let err = load_catalog_from_path(&path).unwrap_err();
        assert!(matches!(err, CatalogLoadError::ParseError(..)));
    }

    #[test]
    fn test_default_path_resolution() {
        // Depends on the working directory; only check it names a file.
        if let Some(path) = default_catalog_path() {
            assert!(path.is_file());
        }
    }
}
