//! File-backed configuration store.
//!
//! `.json` files are read and written as pretty JSON for hand editing;
//! any other path holds a compact postcard blob.  A missing file loads as
//! defaults.  Loaded and saved configs are always validated.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::BmsConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Blob,
}

/// [`ConfigPort`] over a single file.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
    format: Format,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Blob,
        };
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self, bytes: &[u8]) -> Result<BmsConfig> {
        match self.format {
            Format::Json => serde_json::from_slice(bytes)
                .map_err(|_| Error::Storage("config file is not valid JSON")),
            Format::Blob => BmsConfig::from_blob(bytes),
        }
    }

    fn encode(&self, config: &BmsConfig) -> Result<Vec<u8>> {
        match self.format {
            Format::Json => serde_json::to_vec_pretty(config)
                .map_err(|_| Error::Storage("config JSON encode failed")),
            Format::Blob => config.to_blob(),
        }
    }
}

impl ConfigPort for FileConfigStore {
    fn load(&self) -> Result<BmsConfig> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("ConfigStore: {} not found, using defaults", self.path.display());
                return Ok(BmsConfig::default());
            }
            Err(e) => {
                warn!("ConfigStore: read {} failed: {e}", self.path.display());
                return Err(Error::Storage("config file unreadable"));
            }
        };
        let config = self.decode(&bytes)?;
        config.validate()?;
        info!("ConfigStore: loaded {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &BmsConfig) -> Result<()> {
        config.validate()?;
        let bytes = self.encode(config)?;
        fs::write(&self.path, bytes).map_err(|e| {
            warn!("ConfigStore: write {} failed: {e}", self.path.display());
            Error::Storage("config file not writable")
        })?;
        info!("ConfigStore: saved {}", self.path.display());
        Ok(())
    }
}
