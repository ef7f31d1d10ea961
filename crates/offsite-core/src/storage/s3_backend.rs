use std::io::Read;
use std::time::Duration;

use rusty_s3::actions::S3Action;
use rusty_s3::{Bucket, Credentials, UrlStyle};

use crate::config::RetryConfig;
use crate::error::{OffsiteError, Result};
use crate::storage::{retry, StorageBackend};

/// Duration for presigned URL validity.
const PRESIGN_DURATION: Duration = Duration::from_secs(3600);

pub struct S3Backend {
    bucket: Bucket,
    credentials: Credentials,
    agent: ureq::Agent,
    retry: RetryConfig,
    /// Prefix (root path) prepended to all keys.
    root: String,
}

impl S3Backend {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bucket_name: &str,
        region: &str,
        root: &str,
        endpoint: &str,
        access_key_id: &str,
        secret_access_key: &str,
        upload_timeout_secs: u64,
        retry: RetryConfig,
    ) -> Result<Self> {
        let base_url = endpoint.parse().map_err(|e| {
            OffsiteError::Config(format!("invalid S3 endpoint URL '{endpoint}': {e}"))
        })?;

        // Path-style addressing works for both AWS and S3-compatible stores.
        let bucket = Bucket::new(
            base_url,
            UrlStyle::Path,
            bucket_name.to_string(),
            region.to_string(),
        )
        .map_err(|e| OffsiteError::Config(format!("failed to create S3 bucket handle: {e}")))?;

        let credentials = Credentials::new(access_key_id, secret_access_key);

        // The read/write timeout doubles as the per-object upload deadline:
        // a write that stalls past it fails and the record stays pending.
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(upload_timeout_secs))
            .timeout_write(Duration::from_secs(upload_timeout_secs))
            .build();

        let root = root.trim_matches('/').to_string();

        Ok(Self {
            bucket,
            credentials,
            agent,
            retry,
            root,
        })
    }

    /// Prepend the root prefix to a key.
    fn full_key(&self, key: &str) -> String {
        if self.root.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.root, key)
        }
    }
}

impl StorageBackend for S3Backend {
    fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.full_key(key);
        let url = self
            .bucket
            .head_object(Some(&self.credentials), &full_key)
            .sign(PRESIGN_DURATION);

        match retry::retry_http(&self.retry, &format!("S3 HEAD {key}"), || {
            self.agent.head(url.as_str()).call()
        }) {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(e) => Err(OffsiteError::Remote(format!("S3 HEAD {key}: {e}"))),
        }
    }

    fn put_if_absent(&self, key: &str, reader: &mut dyn Read) -> Result<u64> {
        let full_key = self.full_key(key);
        let mut action = self.bucket.put_object(Some(&self.credentials), &full_key);
        action.headers_mut().insert("if-none-match", "*");
        let url = action.sign(PRESIGN_DURATION);

        // No in-process retry here: the body stream is consumed by the
        // attempt, so a transport failure leaves the record pending and the
        // next run re-encrypts and re-sends it.
        let mut counting = CountingReader::new(reader);
        let result = self
            .agent
            .put(url.as_str())
            .set("if-none-match", "*")
            .send(&mut counting);

        match result {
            Ok(_) => Ok(counting.bytes_read),
            Err(ureq::Error::Status(412, _)) => {
                Err(OffsiteError::PreconditionFailed(key.to_string()))
            }
            Err(e) => Err(OffsiteError::Remote(format!("S3 PUT {key}: {e}"))),
        }
    }
}

struct CountingReader<'a> {
    inner: &'a mut dyn Read,
    bytes_read: u64,
}

impl<'a> CountingReader<'a> {
    fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }
}

impl Read for CountingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}
