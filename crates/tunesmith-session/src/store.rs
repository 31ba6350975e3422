//! Durable, realm-scoped token storage.
//!
//! Each realm owns exactly one slot. Reads and writes are synchronous:
//! the session context calls them while it holds its state lock, so a
//! token on disk and a token in memory never disagree for longer than one
//! call.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tunesmith_protocol::{Realm, Token};

use crate::StoreError;

/// Holds at most one token per realm.
///
/// `Send + Sync + 'static` so a single store can be shared by both realms'
/// session contexts behind an `Arc`.
pub trait TokenStore: Send + Sync + 'static {
    /// The persisted token for `realm`, if any.
    fn get(&self, realm: Realm) -> Result<Option<Token>, StoreError>;

    /// Replaces the token for `realm`.
    fn set(&self, realm: Realm, token: &Token) -> Result<(), StoreError>;

    /// Removes the token for `realm`. Removing a missing token is not an
    /// error.
    fn clear(&self, realm: Realm) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// Stores each realm's token in its own file, named by
/// [`Realm::storage_key`], inside one directory.
///
/// Writes go to a sibling `.tmp` file first and are then renamed over the
/// real one, so a crash mid-write leaves either the old token or the new
/// one, never half of each. On Unix the file is created `0600`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// A store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `realm`'s token lives.
    pub fn path_for(&self, realm: Realm) -> PathBuf {
        self.dir.join(realm.storage_key())
    }

    fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, path)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, realm: Realm) -> Result<Option<Token>, StoreError> {
        let path = self.path_for(realm);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Token::new(trimmed)))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                realm,
                path,
                source,
            }),
        }
    }

    fn set(&self, realm: Realm, token: &Token) -> Result<(), StoreError> {
        let path = self.path_for(realm);
        Self::write_atomically(&path, token.as_str()).map_err(|source| {
            StoreError::Write {
                realm,
                path: path.clone(),
                source,
            }
        })?;
        tracing::debug!(%realm, path = %path.display(), "token persisted");
        Ok(())
    }

    fn clear(&self, realm: Realm) -> Result<(), StoreError> {
        let path = self.path_for(realm);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%realm, path = %path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                realm,
                path,
                source,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// Keeps tokens in process memory. Nothing survives a restart; used by
/// tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<Realm, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds a token, as if a previous run had persisted it.
    pub fn with_token(self, realm: Realm, token: Token) -> Self {
        self.lock().insert(realm, token);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Realm, Token>> {
        // A panic while holding this lock can't leave the map half-written.
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, realm: Realm) -> Result<Option<Token>, StoreError> {
        Ok(self.lock().get(&realm).cloned())
    }

    fn set(&self, realm: Realm, token: &Token) -> Result<(), StoreError> {
        self.lock().insert(realm, token.clone());
        Ok(())
    }

    fn clear(&self, realm: Realm) -> Result<(), StoreError> {
        self.lock().remove(&realm);
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
