//! Shared helpers for unit and scenario tests.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::error::{OffsiteError, Result};
use crate::storage::StorageBackend;

/// In-memory object store with the same existence-precondition semantics
/// as the real backends.
#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Seed an object directly, bypassing the upload path.
    pub fn insert_raw(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }
}

impl StorageBackend for MemoryBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn put_if_absent(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Err(OffsiteError::PreconditionFailed(key.to_string()));
        }
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let n = data.len() as u64;
        objects.insert(key.to_string(), data);
        Ok(n)
    }
}

/// Backend that fails the first `failures` writes with a transport error,
/// then delegates to an inner [`MemoryBackend`].
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    remaining_failures: AtomicU32,
}

impl FlakyBackend {
    pub fn new(failures: u32) -> Self {
        Self {
            inner: MemoryBackend::new(),
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

impl StorageBackend for FlakyBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key)
    }

    fn put_if_absent(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(OffsiteError::Remote("injected transport failure".into()));
        }
        self.inner.put_if_absent(key, reader)
    }
}

/// Create a file with the given contents under `dir`, creating parent
/// directories as needed. Returns the absolute path.
pub fn write_file(dir: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
