use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::error::{OffsiteError, Result};
use crate::storage::StorageBackend;

/// Object store rooted at a local directory, for filesystem "remotes"
/// (mounted NAS, tests). Writes go to a temp file in the target directory
/// and are moved into place without clobbering, so the existence
/// precondition holds even against a concurrent writer.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: &str) -> Result<Self> {
        let root_path = PathBuf::from(root);
        fs::create_dir_all(&root_path)?;
        // Canonicalize for correct behavior with symlinked roots.
        let root = fs::canonicalize(&root_path)?;
        Ok(Self { root })
    }

    /// Reject object keys that could escape the storage root.
    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(OffsiteError::InvalidFormat("unsafe object key: empty".into()));
        }
        if key.starts_with('/') || key.contains('\\') {
            return Err(OffsiteError::InvalidFormat(format!(
                "unsafe object key: '{key}'"
            )));
        }
        for component in Path::new(key).components() {
            if component == Component::ParentDir {
                return Err(OffsiteError::InvalidFormat(format!(
                    "unsafe object key: parent traversal '{key}'"
                )));
            }
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl StorageBackend for LocalBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn put_if_absent(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        let path = self.resolve(key)?;
        if path.exists() {
            return Err(OffsiteError::PreconditionFailed(key.to_string()));
        }
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let written = std::io::copy(reader, &mut tmp)?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(written),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(OffsiteError::PreconditionFailed(key.to_string()))
            }
            Err(e) => Err(e.error.into()),
        }
    }
}
