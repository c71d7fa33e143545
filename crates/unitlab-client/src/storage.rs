// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Unitlab Inc. All Rights Reserved.

//! Credential storage for the Unitlab Client.
//!
//! Credentials are the API key and the API base URL.  The default backend is
//! an INI file at `~/.unitlab/credentials` holding a `[default]` section:
//!
//! ```ini
//! [default]
//! api_key = YOUR_API_KEY
//! api_url = https://api.unitlab.ai
//! ```
//!
//! # Storage Implementations
//!
//! - [`FileCredentialStorage`]: INI file in the user's home directory
//! - [`MemoryCredentialStorage`]: In-memory storage (no persistence)
//!
//! # Examples
//!
//! ```rust,no_run
//! use unitlab_client::{Client, Credentials, FileCredentialStorage, CredentialStorage};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), unitlab_client::Error> {
//! let storage = FileCredentialStorage::new()?;
//! storage.store(&Credentials {
//!     api_key: Some("YOUR_API_KEY".to_string()),
//!     api_url: None,
//! })?;
//!
//! let client = Client::new()?.with_storage(Arc::new(storage));
//! # Ok(())
//! # }
//! ```

use config::{Config, FileFormat};
use directories::BaseDirs;
use log::debug;
use std::{io::Write as _, path::PathBuf, sync::RwLock};

/// Default Unitlab API server.
pub const DEFAULT_API_URL: &str = "https://api.unitlab.ai";

const SECTION: &str = "default";

/// Error type for credential storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// Storage is not available (e.g., cannot determine home directory).
    NotAvailable(String),
    /// Failed to read credentials from storage.
    ReadError(String),
    /// Failed to write credentials to storage.
    WriteError(String),
    /// Failed to clear credentials from storage.
    ClearError(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotAvailable(msg) => {
                write!(f, "Credential storage not available: {}", msg)
            }
            StorageError::ReadError(msg) => write!(f, "Failed to read credentials: {}", msg),
            StorageError::WriteError(msg) => write!(f, "Failed to write credentials: {}", msg),
            StorageError::ClearError(msg) => write!(f, "Failed to clear credentials: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// API credentials as stored in the `[default]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

impl Credentials {
    /// Returns `other` layered on top of `self`: fields set in `other` win,
    /// unset fields keep the current value.
    pub fn merge(&self, other: &Credentials) -> Credentials {
        Credentials {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            api_url: other.api_url.clone().or_else(|| self.api_url.clone()),
        }
    }
}

/// Trait for persistent credential storage.
///
/// The storage must be thread-safe (`Send + Sync`) as it is shared by every
/// clone of a [`Client`][crate::Client].
pub trait CredentialStorage: Send + Sync {
    /// Store the credentials.  Fields left as `None` keep their stored value.
    fn store(&self, credentials: &Credentials) -> Result<(), StorageError>;

    /// Load the stored credentials.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    fn load(&self) -> Result<Option<Credentials>, StorageError>;

    /// Remove the stored credentials.
    fn clear(&self) -> Result<(), StorageError>;
}

/// INI file credential storage.
///
/// By default the file is `~/.unitlab/credentials`.  On Unix the parent
/// directory is restricted to the owner (`0700`) and the file is written with
/// mode `0600`.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    /// Create a new `FileCredentialStorage` at `~/.unitlab/credentials`.
    pub fn new() -> Result<Self, StorageError> {
        let path = BaseDirs::new()
            .ok_or_else(|| {
                StorageError::NotAvailable("Could not determine user home directory".to_string())
            })?
            .home_dir()
            .join(".unitlab")
            .join("credentials");

        debug!("FileCredentialStorage using default path: {:?}", path);
        Ok(Self { path })
    }

    /// Create a new `FileCredentialStorage` with a custom file path.
    pub fn with_path(path: PathBuf) -> Self {
        debug!("FileCredentialStorage using custom path: {:?}", path);
        Self { path }
    }

    /// Returns the path where the credentials are stored.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn render(credentials: &Credentials) -> String {
        let mut ini = format!("[{}]\n", SECTION);
        if let Some(api_key) = &credentials.api_key {
            ini.push_str(&format!("api_key = {}\n", api_key));
        }
        if let Some(api_url) = &credentials.api_url {
            ini.push_str(&format!("api_url = {}\n", api_url));
        }
        ini.push('\n');
        ini
    }

    fn write_file(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::WriteError(format!("Failed to create directory {:?}: {}", parent, e))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt as _;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).map_err(
                    |e| {
                        StorageError::WriteError(format!(
                            "Failed to restrict directory {:?}: {}",
                            parent, e
                        ))
                    },
                )?;
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(|e| {
            StorageError::WriteError(format!("Failed to open {:?}: {}", self.path, e))
        })?;
        file.write_all(contents.as_bytes()).map_err(|e| {
            StorageError::WriteError(format!("Failed to write {:?}: {}", self.path, e))
        })?;

        Ok(())
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn store(&self, credentials: &Credentials) -> Result<(), StorageError> {
        let merged = match self.load()? {
            Some(existing) => existing.merge(credentials),
            None => credentials.clone(),
        };

        self.write_file(&Self::render(&merged))?;
        debug!("Credentials stored to {:?}", self.path);
        Ok(())
    }

    fn load(&self) -> Result<Option<Credentials>, StorageError> {
        if !self.path.exists() {
            debug!("No credentials file found at {:?}", self.path);
            return Ok(None);
        }

        let path = self.path.to_string_lossy();
        let settings = Config::builder()
            .add_source(config::File::new(&path, FileFormat::Ini))
            .build()
            .map_err(|e| {
                StorageError::ReadError(format!("Failed to parse {:?}: {}", self.path, e))
            })?;

        let field = |name: &str| {
            settings
                .get_string(&format!("{}.{}", SECTION, name))
                .ok()
                .filter(|value| !value.is_empty())
        };

        let credentials = Credentials {
            api_key: field("api_key"),
            api_url: field("api_url"),
        };

        if credentials == Credentials::default() {
            debug!("Credentials file at {:?} has no [default] values", self.path);
            return Ok(None);
        }

        debug!("Credentials loaded from {:?}", self.path);
        Ok(Some(credentials))
    }

    fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| {
                StorageError::ClearError(format!(
                    "Failed to remove credentials file {:?}: {}",
                    self.path, e
                ))
            })?;
            debug!("Credentials file removed from {:?}", self.path);
        }
        Ok(())
    }
}

/// In-memory credential storage (no persistence).
#[derive(Debug, Default)]
pub struct MemoryCredentialStorage {
    credentials: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStorage {
    /// Create a new, empty `MemoryCredentialStorage`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryCredentialStorage {
    fn store(&self, credentials: &Credentials) -> Result<(), StorageError> {
        let mut guard = self.credentials.write().map_err(|e| {
            StorageError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;
        let merged = match guard.as_ref() {
            Some(existing) => existing.merge(credentials),
            None => credentials.clone(),
        };
        *guard = Some(merged);
        Ok(())
    }

    fn load(&self) -> Result<Option<Credentials>, StorageError> {
        let guard = self
            .credentials
            .read()
            .map_err(|e| StorageError::ReadError(format!("Failed to acquire read lock: {}", e)))?;
        Ok(guard.clone())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self.credentials.write().map_err(|e| {
            StorageError::ClearError(format!("Failed to acquire write lock: {}", e))
        })?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key_only(key: &str) -> Credentials {
        Credentials {
            api_key: Some(key.to_string()),
            api_url: None,
        }
    }

    #[test]
    fn test_memory_storage_store_load_clear() {
        let storage = MemoryCredentialStorage::new();
        assert_eq!(storage.load().unwrap(), None);

        storage.store(&key_only("memory-key")).unwrap();
        assert_eq!(storage.load().unwrap(), Some(key_only("memory-key")));

        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn test_memory_storage_merges_fields() {
        let storage = MemoryCredentialStorage::new();
        storage.store(&key_only("key-1")).unwrap();
        storage
            .store(&Credentials {
                api_key: None,
                api_url: Some("http://localhost:8000".to_string()),
            })
            .unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("key-1"));
        assert_eq!(loaded.api_url.as_deref(), Some("http://localhost:8000"));
    }

    #[test]
    fn test_file_storage_store_load_clear() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials");
        let storage = FileCredentialStorage::with_path(path.clone());

        assert_eq!(storage.load().unwrap(), None);

        let credentials = Credentials {
            api_key: Some("file-key".to_string()),
            api_url: Some("https://api.unitlab.ai".to_string()),
        };
        storage.store(&credentials).unwrap();
        assert!(path.exists());
        assert_eq!(storage.load().unwrap(), Some(credentials));

        storage.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn test_file_storage_ini_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials");
        let storage = FileCredentialStorage::with_path(path.clone());

        storage
            .store(&Credentials {
                api_key: Some("abc123".to_string()),
                api_url: Some("http://localhost:8000".to_string()),
            })
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[default]\n"));
        assert!(contents.contains("api_key = abc123\n"));
        assert!(contents.contains("api_url = http://localhost:8000\n"));
    }

    #[test]
    fn test_file_storage_reads_hand_written_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials");
        std::fs::write(&path, "[default]\napi_key=handwritten\n").unwrap();

        let storage = FileCredentialStorage::with_path(path);
        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("handwritten"));
        assert_eq!(loaded.api_url, None);
    }

    #[test]
    fn test_file_storage_partial_update_keeps_existing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::with_path(temp_dir.path().join("credentials"));

        storage
            .store(&Credentials {
                api_key: Some("first".to_string()),
                api_url: Some("http://first.example".to_string()),
            })
            .unwrap();
        storage.store(&key_only("second")).unwrap();

        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("second"));
        assert_eq!(loaded.api_url.as_deref(), Some("http://first.example"));
    }

    #[test]
    fn test_file_storage_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".unitlab").join("credentials");
        let storage = FileCredentialStorage::with_path(path.clone());

        storage.store(&key_only("nested")).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_permissions() {
        use std::os::unix::fs::PermissionsExt as _;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".unitlab").join("credentials");
        let storage = FileCredentialStorage::with_path(path.clone());
        storage.store(&key_only("secret")).unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_file_storage_clear_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::with_path(temp_dir.path().join("missing"));
        assert!(storage.clear().is_ok());
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotAvailable("test".to_string());
        assert!(err.to_string().contains("not available"));

        let err = StorageError::ReadError("read failed".to_string());
        assert!(err.to_string().contains("read failed"));

        let err = StorageError::WriteError("write failed".to_string());
        assert!(err.to_string().contains("write failed"));
    }
}
