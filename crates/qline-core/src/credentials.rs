//! Bearer credential storage
//!
//! The API client looks the token up once per request. Where it lives is
//! up to the store: a file in the data directory for the CLI, memory for
//! tests and embedding.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

/// Environment variable that overrides the stored token
pub const TOKEN_ENV: &str = "QLINE_TOKEN";

/// Errors that can occur while reading or writing the credential
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Permission denied accessing the token file
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read the token file
    #[error("Failed to read token from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the token file
    #[error("Failed to write token to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CredentialError {
    fn from_io(error: io::Error, path: PathBuf, writing: bool) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => CredentialError::PermissionDenied {
                path,
                source: error,
            },
            _ if writing => CredentialError::Write {
                path,
                source: error,
            },
            _ => CredentialError::Read {
                path,
                source: error,
            },
        }
    }
}

/// Get/set access to the bearer token
pub trait CredentialStore: Send + Sync {
    /// Current token, if any
    fn token(&self) -> Result<Option<String>, CredentialError>;

    /// Replace the token
    fn set_token(&self, token: &str) -> Result<(), CredentialError>;

    /// Forget the token
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Token kept in a file (one line, trimmed on read)
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    honor_env: bool,
}

impl FileCredentialStore {
    /// Store backed by `path`; `QLINE_TOKEN` takes precedence when set
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            honor_env: true,
        }
    }

    /// Ignore `QLINE_TOKEN` and only consult the file
    pub fn without_env(mut self) -> Self {
        self.honor_env = false;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Result<Option<String>, CredentialError> {
        if self.honor_env {
            if let Ok(token) = std::env::var(TOKEN_ENV) {
                if !token.trim().is_empty() {
                    return Ok(Some(token.trim().to_string()));
                }
            }
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CredentialError::from_io(e, self.path.clone(), false)),
        }
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CredentialError::from_io(e, parent.to_path_buf(), true))?;
        }

        fs::write(&self.path, format!("{}\n", token.trim()))
            .map_err(|e| CredentialError::from_io(e, self.path.clone(), true))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| CredentialError::from_io(e, self.path.clone(), true))?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CredentialError::from_io(e, self.path.clone(), true)),
        }
    }
}

/// Token kept in memory
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Result<Option<String>, CredentialError> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
