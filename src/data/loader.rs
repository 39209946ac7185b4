//! RON data loader
//!
//! Loads the crafting catalog and engine settings from external RON files,
//! with fallback to hardcoded defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::catalog::default_catalog;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::DataError;

pub const CATALOG_FILE: &str = "catalog.ron";
pub const ENGINE_FILE: &str = "engine.ron";

/// Where the loaded data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    File,
    Defaults,
}

/// Manages all external crafting data
#[derive(Debug, Clone)]
pub struct DataManager {
    /// Currencies, bases, modifiers and actions
    pub catalog: Catalog,
    /// Engine settings
    pub engine: EngineConfig,
    pub catalog_source: DataSource,
    pub engine_source: DataSource,
}

impl DataManager {
    /// Load from the default data directory, falling back to defaults
    pub fn new() -> Self {
        Self::load_from(&default_data_dir())
    }

    /// Load from `base_path`; missing or broken files fall back to defaults
    pub fn load_from(base_path: &Path) -> Self {
        let (catalog, catalog_source) = Self::load_or(base_path.join(CATALOG_FILE), default_catalog);
        let (engine, engine_source) = Self::load_or(base_path.join(ENGINE_FILE), EngineConfig::default);
        log::info!(
            "Loaded data from {} (catalog: {:?}, engine: {:?})",
            base_path.display(),
            catalog_source,
            engine_source
        );
        Self {
            catalog,
            engine,
            catalog_source,
            engine_source,
        }
    }

    fn load_or<T: DeserializeOwned>(path: PathBuf, fallback: fn() -> T) -> (T, DataSource) {
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return (fallback(), DataSource::Defaults);
        }
        match read_ron(&path) {
            Ok(value) => (value, DataSource::File),
            Err(e) => {
                log::warn!("{}. Using defaults.", e);
                (fallback(), DataSource::Defaults)
            }
        }
    }
}

impl Default for DataManager {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            engine: EngineConfig::default(),
            catalog_source: DataSource::Defaults,
            engine_source: DataSource::Defaults,
        }
    }
}

/// Read and parse one RON file
pub fn read_ron<T: DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ron::from_str(&content).map_err(|e| DataError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn write_ron<T: Serialize>(path: &Path, what: &str, value: &T) -> Result<(), DataError> {
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default()).map_err(|e| {
        DataError::Serialize {
            what: what.to_string(),
            message: e.to_string(),
        }
    })?;
    fs::write(path, text).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// `assets/data` when present, else the per-user data directory
pub fn default_data_dir() -> PathBuf {
    use directories::ProjectDirs;

    let local = PathBuf::from("assets/data");
    if local.exists() {
        return local;
    }
    if let Some(proj_dirs) = ProjectDirs::from("com", "craftplan", "Craftplan") {
        let mut path = proj_dirs.data_local_dir().to_path_buf();
        path.push("data");
        path
    } else {
        local
    }
}

/// Export default data to RON files (for editing)
pub fn export_default_data(dir: &Path) -> Result<(), DataError> {
    fs::create_dir_all(dir).map_err(|source| DataError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    write_ron(&dir.join(CATALOG_FILE), "catalog", &default_catalog())?;
    write_ron(&dir.join(ENGINE_FILE), "engine config", &EngineConfig::default())?;
    log::info!("Exported default data to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("craftplan-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_export_default_data() {
        let dir = scratch_dir("export");
        export_default_data(&dir).unwrap();

        let data = DataManager::load_from(&dir);
        assert_eq!(data.catalog_source, DataSource::File);
        assert_eq!(data.engine_source, DataSource::File);
        let defaults = default_catalog();
        assert_eq!(data.catalog.actions, defaults.actions);
        assert_eq!(data.catalog.modifiers.len(), defaults.modifiers.len());
        assert_eq!(data.engine, EngineConfig::default());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_dir_uses_defaults() {
        let data = DataManager::load_from(&scratch_dir("missing"));
        assert_eq!(data.catalog_source, DataSource::Defaults);
        assert_eq!(data.catalog.bases.len(), default_catalog().bases.len());
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = scratch_dir("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENGINE_FILE), "(league: ").unwrap();

        let data = DataManager::load_from(&dir);
        assert_eq!(data.engine_source, DataSource::Defaults);
        assert!(matches!(
            read_ron::<EngineConfig>(&dir.join(ENGINE_FILE)),
            Err(DataError::Parse { .. })
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
