use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{OffsiteError, Result};

const READ_BUF_SIZE: usize = 64 * 1024;

/// A 32-byte content identifier computed as SHA-256 over a file's bytes.
///
/// Identical bytes produce identical digests; the digest is the dedup key
/// across the whole index, regardless of where the file was found.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    /// Hash a stream to completion without loading it into memory.
    ///
    /// Returns the digest and the number of bytes consumed, so callers can
    /// record the size the digest was computed over.
    pub fn of_reader(reader: &mut dyn Read) -> std::io::Result<(Self, u64)> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; READ_BUF_SIZE];
        let mut total = 0u64;
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buf[..n]);
                    total += n as u64;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Ok((ContentDigest(out), total))
    }

    /// Hash the file at `path`, streaming its contents.
    pub fn of_file(path: &Path) -> std::io::Result<(Self, u64)> {
        let mut file = File::open(path)?;
        Self::of_reader(&mut file)
    }

    /// Hex-encode the full digest for storage and display.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from its hex encoding.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| OffsiteError::InvalidFormat(format!("bad digest hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(OffsiteError::InvalidFormat(format!(
                "digest must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(ContentDigest(out))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
