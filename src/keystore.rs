//! Key Storage
//!
//! A small key-value interface for the node's long-term secrets: the Noise
//! static key and the Ed25519 signing key, stored as raw bytes.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Persistent secret storage.
///
/// Implementations must be safe to share across threads; reads may run
/// concurrently, writes are exclusive.
pub trait KeyStore: Send + Sync {
    /// Fetch a stored value.
    fn get(&self, name: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous one. Returns false on failure.
    fn put(&self, name: &str, value: &[u8]) -> bool;

    /// Remove a value. Returns true if something was removed.
    fn delete(&self, name: &str) -> bool;

    /// Overwrite a buffer that held secret material.
    fn secure_zero(&self, buf: &mut [u8]) {
        secure_zero(buf);
    }
}

/// Overwrite a buffer with zeros in a way the optimizer will not elide.
pub fn secure_zero(buf: &mut [u8]) {
    buf.zeroize();
}

/// In-memory key store for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.read().ok()?.get(name).cloned()
    }

    fn put(&self, name: &str, value: &[u8]) -> bool {
        match self.entries.write() {
            Ok(mut entries) => {
                if let Some(mut old) = entries.insert(name.to_string(), value.to_vec()) {
                    old.zeroize();
                }
                true
            }
            Err(_) => false,
        }
    }

    fn delete(&self, name: &str) -> bool {
        match self.entries.write() {
            Ok(mut entries) => match entries.remove(name) {
                Some(mut old) => {
                    old.zeroize();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Directory-backed key store: one hex-encoded file per key.
///
/// Files are named `<name>.key` and created with mode 0600 on Unix.
pub struct FileKeyStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl FileKeyStore {
    /// Open a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: RwLock::new(()),
        }
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.key", name))
    }

    /// Write `value` to `path`. The file never holds key bytes while it is
    /// readable by anyone but the owner.
    fn write_file(&self, path: &Path, value: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        // The mode above only applies to newly created files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        let mut encoded = hex::encode(value);
        let result = file.write_all(encoded.as_bytes());
        encoded.zeroize();
        result
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, name: &str) -> Option<Vec<u8>> {
        let _guard = self.lock.read().ok()?;
        let path = self.path_for(name);
        let mut contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to read key file");
                }
                return None;
            }
        };
        let decoded = hex::decode(contents.trim());
        contents.zeroize();
        match decoded {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Key file is not valid hex");
                None
            }
        }
    }

    fn put(&self, name: &str, value: &[u8]) -> bool {
        let Ok(_guard) = self.lock.write() else {
            return false;
        };
        let path = self.path_for(name);
        match self.write_file(&path, value) {
            Ok(()) => {
                debug!(path = %path.display(), "Stored key");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write key file");
                false
            }
        }
    }

    fn delete(&self, name: &str) -> bool {
        let Ok(_guard) = self.lock.write() else {
            return false;
        };
        fs::remove_file(self.path_for(name)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_put_get_delete() {
        let store = MemoryKeyStore::new();
        assert!(store.get("a").is_none());
        assert!(store.put("a", &[1, 2, 3]));
        assert_eq!(store.get("a"), Some(vec![1, 2, 3]));
        assert!(store.put("a", &[4]));
        assert_eq!(store.get("a"), Some(vec![4]));
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("keys");
        let store = FileKeyStore::new(&dir);

        assert!(store.get("noise_static_key").is_none());
        assert!(store.put("noise_static_key", &[0xAB; 32]));
        assert_eq!(store.get("noise_static_key"), Some(vec![0xAB; 32]));

        let on_disk = fs::read_to_string(dir.join("noise_static_key.key")).unwrap();
        assert_eq!(on_disk, "ab".repeat(32));

        // A second store over the same directory sees the key.
        let reopened = FileKeyStore::new(&dir);
        assert_eq!(reopened.get("noise_static_key"), Some(vec![0xAB; 32]));

        assert!(store.delete("noise_static_key"));
        assert!(store.get("noise_static_key").is_none());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("bad.key"), "not hex").unwrap();
        let store = FileKeyStore::new(temp.path());
        assert!(store.get("bad").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(temp.path());
        assert!(store.put("k", &[1]));
        let mode = fs::metadata(temp.path().join("k.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("k.key");
        fs::write(&path, "00").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileKeyStore::new(temp.path());
        assert!(store.put("k", &[0xCD, 0xEF]));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "cdef");
    }

    #[test]
    fn test_secure_zero() {
        let store = MemoryKeyStore::new();
        let mut buf = [0x5Au8; 16];
        store.secure_zero(&mut buf);
        assert_eq!(buf, [0u8; 16]);
    }
}
