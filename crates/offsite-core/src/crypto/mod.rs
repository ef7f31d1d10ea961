pub mod stream;

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{OffsiteError, Result};

pub const KEY_LEN: usize = 32;

/// Per-file symmetric key material, generated once at registration.
/// Zeroized on drop to prevent key bytes from lingering in memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey([u8; KEY_LEN]);

impl FileKey {
    /// Generate a new key using OS entropy only.
    ///
    /// If the OS random source is unavailable this fails; there is no
    /// fallback to a non-cryptographic generator.
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| OffsiteError::Entropy(e.to_string()))?;
        Ok(Self(key))
    }

    /// Reconstruct a key from stored bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(OffsiteError::InvalidFormat(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Never print key material, even at trace level.
impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = FileKey::generate().unwrap();
        let b = FileKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_bytes_roundtrip() {
        let key = FileKey::generate().unwrap();
        let restored = FileKey::from_bytes(key.as_bytes()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(FileKey::from_bytes(&[0u8; 16]).is_err());
        assert!(FileKey::from_bytes(&[]).is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = FileKey::generate().unwrap();
        assert_eq!(format!("{key:?}"), "FileKey(..)");
    }
}
