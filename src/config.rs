use std::env;
use std::path::PathBuf;

use crate::backend::Backend;

/// Configuration for a jsonstore folder
///
/// A store is bound to one folder; every collection persisted through it
/// becomes one file in that folder. The folder must already exist when a
/// store is opened.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Folder holding the backing files (default: `.jsonstore/` in the
    /// current directory)
    pub data_dir: PathBuf,

    /// Persistence format: plain JSON file or single-entry zip archive
    pub backend: Backend,
}

impl StoreConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        let data_dir = env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".jsonstore");

        StoreConfig {
            data_dir,
            backend: Backend::Json,
        }
    }

    /// Create config with a custom data directory
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        StoreConfig {
            data_dir,
            ..StoreConfig::new()
        }
    }

    /// Get the data directory path
    pub fn get_data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Set data directory
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        self.data_dir = dir;
    }

    /// Get the persistence backend
    pub fn get_backend(&self) -> Backend {
        self.backend
    }

    /// Set the persistence backend
    pub fn set_backend(&mut self, backend: Backend) {
        self.backend = backend;
    }

    /// Get the backing file path for a named collection
    ///
    /// `tasks` becomes `<data_dir>/tasks.json` for the plain backend and
    /// `<data_dir>/tasks.json.zip` for the zip backend.
    pub fn get_collection_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, self.backend.extension()))
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `JSONSTORE_DATA_DIR`: override data directory
    /// - `JSONSTORE_BACKEND`: "json" or "zip"
    pub fn from_env() -> Self {
        let mut config = StoreConfig::new();

        if let Ok(dir) = env::var("JSONSTORE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(backend) = env::var("JSONSTORE_BACKEND") {
            if backend.eq_ignore_ascii_case("zip") {
                config.backend = Backend::Zip;
            }
        }

        config
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::new()
    }
}
