//! Out-of-band secret distribution.
//!
//! On registration a replica generates the account's shared secret and hands
//! it to the key store; the legitimate client reads it back from the same
//! store. Every replica of one deployment shares a single store, so the secret
//! checked at validation time is always the one the client can read. When
//! several replicas provision the same account the last write wins.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use gavel_crypto::{ProofError, SharedSecret};
use thiserror::Error;

/// Longest username accepted anywhere in the system.
pub const MAX_USERNAME_LEN: usize = 32;

/// Key store failures.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Username cannot be used as a key name.
    #[error("invalid key name: {0:?}")]
    InvalidName(String),

    /// Underlying storage failed.
    #[error("key store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored key material is unusable.
    #[error("corrupt key for {username}: {source}")]
    Corrupt {
        /// Account whose key is corrupt.
        username: String,
        /// Parse failure.
        #[source]
        source: ProofError,
    },
}

/// Returns true if `username` is 1 to 32 characters of `[A-Za-z0-9_-]`.
///
/// The same rule gates registration, so every registered account has a name
/// that is safe to use as a file name.
pub fn is_valid_username(username: &str) -> bool {
    (1..=MAX_USERNAME_LEN).contains(&username.len())
        && username.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Side channel for per-account shared secrets.
pub trait KeyStore: Send + Sync {
    /// Store (or replace) the secret for `username`.
    fn provision(&self, username: &str, secret: &SharedSecret) -> Result<(), KeyStoreError>;

    /// Fetch the secret for `username`, if one was provisioned.
    fn lookup(&self, username: &str) -> Result<Option<SharedSecret>, KeyStoreError>;
}

/// In-memory key store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    keys: Arc<Mutex<HashMap<String, SharedSecret>>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of provisioned secrets.
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been provisioned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for MemoryKeyStore {
    fn provision(&self, username: &str, secret: &SharedSecret) -> Result<(), KeyStoreError> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(username.to_string(), secret.clone());
        Ok(())
    }

    fn lookup(&self, username: &str) -> Result<Option<SharedSecret>, KeyStoreError> {
        Ok(self.keys.lock().unwrap_or_else(PoisonError::into_inner).get(username).cloned())
    }
}

/// Key store backed by a directory of `<username>.key` files holding the raw
/// 32-byte secret.
#[derive(Debug, Clone)]
pub struct DirKeyStore {
    dir: PathBuf,
}

impl DirKeyStore {
    /// Open (creating if needed) a key directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, username: &str) -> Result<PathBuf, KeyStoreError> {
        if !is_valid_username(username) {
            return Err(KeyStoreError::InvalidName(username.to_string()));
        }
        Ok(self.dir.join(format!("{username}.key")))
    }
}

impl KeyStore for DirKeyStore {
    fn provision(&self, username: &str, secret: &SharedSecret) -> Result<(), KeyStoreError> {
        let path = self.key_path(username)?;
        fs::write(path, secret.as_bytes())?;
        Ok(())
    }

    fn lookup(&self, username: &str) -> Result<Option<SharedSecret>, KeyStoreError> {
        let path = self.key_path(username)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        SharedSecret::from_slice(&bytes)
            .map(Some)
            .map_err(|source| KeyStoreError::Corrupt { username: username.to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use gavel_crypto::SECRET_SIZE;

    use super::*;

    #[test]
    fn username_rules() {
        assert!(is_valid_username("tom"));
        assert!(is_valid_username("max_2-b"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("../etc/passwd"));
        assert!(!is_valid_username("with space"));
        assert!(!is_valid_username(&"a".repeat(MAX_USERNAME_LEN + 1)));
    }

    #[test]
    fn memory_store_clones_share_keys() {
        let store = MemoryKeyStore::new();
        let other = store.clone();
        let secret = SharedSecret::from_random([5; SECRET_SIZE]);

        store.provision("tom", &secret).unwrap();

        assert_eq!(other.lookup("tom").unwrap(), Some(secret));
        assert_eq!(other.lookup("max").unwrap(), None);
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn memory_store_last_write_wins() {
        let store = MemoryKeyStore::new();
        store.provision("tom", &SharedSecret::from_random([1; SECRET_SIZE])).unwrap();
        store.provision("tom", &SharedSecret::from_random([2; SECRET_SIZE])).unwrap();

        assert_eq!(store.lookup("tom").unwrap(), Some(SharedSecret::from_random([2; SECRET_SIZE])));
    }

    #[test]
    fn dir_store_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirKeyStore::open(dir.path().join("keys")).unwrap();
        let secret = SharedSecret::from_random([9; SECRET_SIZE]);

        store.provision("fred", &secret).unwrap();

        let on_disk = fs::read(store.dir().join("fred.key")).unwrap();
        assert_eq!(on_disk, vec![9; SECRET_SIZE]);
        assert_eq!(store.lookup("fred").unwrap(), Some(secret));
        assert!(store.lookup("shaun").unwrap().is_none());
    }

    #[test]
    fn dir_store_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirKeyStore::open(dir.path()).unwrap();

        let result = store.provision("../escape", &SharedSecret::from_random([0; SECRET_SIZE]));
        assert!(matches!(result, Err(KeyStoreError::InvalidName(_))));
    }

    #[test]
    fn dir_store_reports_truncated_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirKeyStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("max.key"), [1, 2, 3]).unwrap();

        assert!(matches!(store.lookup("max"), Err(KeyStoreError::Corrupt { .. })));
    }
}
