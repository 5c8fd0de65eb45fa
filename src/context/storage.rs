//! Durable storage for the context catalogue
//!
//! The whole catalogue is read and written at once; there are no partial
//! updates.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::Context;
use crate::error::{Error, Result};

/// On-disk shape of the catalogue:
/// `{ "current": <name-or-null>, "cat": { <name>: <Context> } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogueData {
    pub current: Option<String>,
    pub cat: BTreeMap<String, Context>,
}

/// Storage backend for the catalogue.
pub trait Storage: Send {
    /// `Err(Error::EmptyStorage)` when nothing has been stored yet.
    fn ensure_exists(&self) -> Result<()>;

    /// Create the backing store with `data`, replacing anything present.
    fn init_storage(&mut self, data: &CatalogueData) -> Result<()>;

    fn save(&mut self, data: &CatalogueData) -> Result<()>;

    /// Fails with `InvalidFileLayout` when the stored content is not a catalogue.
    fn load(&self) -> Result<CatalogueData>;

    /// Reset to an empty catalogue.
    fn clear(&mut self) -> Result<()>;
}

/// JSON file in the per-user config directory.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, data: &CatalogueData) -> Result<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let content = serde_json::to_string_pretty(data).map_err(|e| Error::InvalidFileLayout {
            location: self.path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Uniquely named sibling, renamed over the target: concurrent writers
        // never share a temp file and a crash leaves the old catalogue intact.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;

        // Restrict permissions (contains tokens and API keys)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        tracing::debug!("Contexts saved to {}", self.path.display());
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn ensure_exists(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(Error::EmptyStorage(self.path.clone()))
        }
    }

    fn init_storage(&mut self, data: &CatalogueData) -> Result<()> {
        tracing::info!("Initializing context storage at {}", self.path.display());
        self.write(data)
    }

    fn save(&mut self, data: &CatalogueData) -> Result<()> {
        self.write(data)
    }

    fn load(&self) -> Result<CatalogueData> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::EmptyStorage(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| Error::InvalidFileLayout {
            location: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn clear(&mut self) -> Result<()> {
        self.write(&CatalogueData::default())
    }
}

/// Process-local storage with no filesystem side effects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Option<CatalogueData>,
    saves: usize,
}

impl MemoryStorage {
    /// Storage that already holds `data`.
    pub fn with_data(data: CatalogueData) -> Self {
        Self {
            data: Some(data),
            saves: 0,
        }
    }

    /// Number of `save` calls so far.
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn data(&self) -> Option<&CatalogueData> {
        self.data.as_ref()
    }
}

impl Storage for MemoryStorage {
    fn ensure_exists(&self) -> Result<()> {
        match self.data {
            Some(_) => Ok(()),
            None => Err(Error::EmptyStorage(PathBuf::from(":memory:"))),
        }
    }

    fn init_storage(&mut self, data: &CatalogueData) -> Result<()> {
        self.data = Some(data.clone());
        Ok(())
    }

    fn save(&mut self, data: &CatalogueData) -> Result<()> {
        self.data = Some(data.clone());
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<CatalogueData> {
        self.data
            .clone()
            .ok_or_else(|| Error::EmptyStorage(PathBuf::from(":memory:")))
    }

    fn clear(&mut self) -> Result<()> {
        self.data = Some(CatalogueData::default());
        Ok(())
    }
}
