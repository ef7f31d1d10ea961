pub mod local_backend;
pub(crate) mod retry;
pub mod s3_backend;

use std::io::Read;
use std::path::{Component, Path};

use crate::config::RemoteConfig;
use crate::error::{OffsiteError, Result};

pub use local_backend::LocalBackend;
pub use s3_backend::S3Backend;

/// The write-only contract the uploader needs from remote object storage.
pub trait StorageBackend: Send + Sync {
    /// Whether an object with this key is already present remotely.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Stream `reader` to completion as a new object under `key`.
    ///
    /// The write carries an existence precondition: if the key is already
    /// present the backend rejects the write with
    /// [`OffsiteError::PreconditionFailed`] and leaves the existing object
    /// untouched. A write never replaces a complete prior object.
    ///
    /// Returns the number of bytes transmitted.
    fn put_if_absent(&self, key: &str, reader: &mut dyn Read) -> Result<u64>;
}

/// Derive the deterministic remote object name for a source path.
///
/// Flat `/`-separated key built from the path's normal components; root,
/// drive prefixes, and `.`/`..` are dropped. The same source path always
/// maps to the same key, which is what makes duplicate upload attempts
/// observable via the existence precondition.
pub fn object_key(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Build a storage backend from the remote configuration.
pub fn backend_from_config(cfg: &RemoteConfig) -> Result<Box<dyn StorageBackend>> {
    if let Some(rest) = cfg.url.strip_prefix("s3://") {
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(OffsiteError::Config(format!(
                "invalid s3 remote URL '{}': missing bucket",
                cfg.url
            )));
        }
        let region = cfg.region.clone().unwrap_or_else(|| "us-east-1".to_string());
        let endpoint = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"));
        let access_key_id = cfg
            .access_key_id
            .as_deref()
            .ok_or_else(|| OffsiteError::Config("s3 remote requires access_key_id".into()))?;
        let secret_access_key = cfg
            .secret_access_key
            .as_deref()
            .ok_or_else(|| OffsiteError::Config("s3 remote requires secret_access_key".into()))?;
        Ok(Box::new(S3Backend::new(
            bucket,
            &region,
            prefix,
            &endpoint,
            access_key_id,
            secret_access_key,
            cfg.upload_timeout_secs,
            cfg.retry.clone(),
        )?))
    } else {
        let path = cfg.url.strip_prefix("file://").unwrap_or(&cfg.url);
        Ok(Box::new(LocalBackend::new(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn object_key_strips_root() {
        assert_eq!(object_key(Path::new("/data/docs/a.txt")), "data/docs/a.txt");
    }

    #[test]
    fn object_key_strips_cur_dir() {
        assert_eq!(object_key(Path::new("./files/x")), "files/x");
    }

    #[test]
    fn object_key_is_deterministic() {
        let path = PathBuf::from("/var/backups/2024/db.dump");
        assert_eq!(object_key(&path), object_key(&path));
    }

    #[test]
    fn object_key_drops_parent_components() {
        assert_eq!(object_key(Path::new("/a/../b/c")), "a/b/c");
    }

    #[test]
    fn backend_from_config_rejects_bad_s3_url() {
        let cfg = RemoteConfig {
            url: "s3://".into(),
            region: None,
            access_key_id: Some("k".into()),
            secret_access_key: Some("s".into()),
            endpoint: None,
            upload_timeout_secs: 50,
            retry: Default::default(),
        };
        assert!(backend_from_config(&cfg).is_err());
    }

    #[test]
    fn backend_from_config_requires_s3_credentials() {
        let cfg = RemoteConfig {
            url: "s3://bucket".into(),
            region: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            upload_timeout_secs: 50,
            retry: Default::default(),
        };
        assert!(backend_from_config(&cfg).is_err());
    }
}
