use std::io::Read;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use super::FileKey;
use crate::error::{OffsiteError, Result};

/// Plaintext bytes sealed per AEAD frame. Bounds memory use during upload:
/// at most one segment of plaintext and its ciphertext are in flight.
pub const SEGMENT_SIZE: usize = 1024 * 1024;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const FRAME_HEADER_LEN: usize = 4;

/// AES-256-GCM cipher bound to a single file's key.
///
/// Object wire format: a sequence of frames, each
/// `[u32 BE ct_len][12-byte nonce][ciphertext with appended 16-byte tag]`.
/// The frame ordinal is bound as AAD so frames cannot be reordered or
/// spliced between objects encrypted under the same key.
pub struct FileCipher {
    cipher: Aes256Gcm,
}

impl FileCipher {
    pub fn new(key: &FileKey) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .expect("valid 32-byte key for AES-256-GCM");
        Self { cipher }
    }

    fn seal_segment(&self, segment: u64, plaintext: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let aad = segment.to_be_bytes();
        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|e| OffsiteError::InvalidFormat(format!("AES-GCM encrypt: {e}")))?;

        out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(())
    }

    fn open_segment(&self, segment: u64, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let aad = segment.to_be_bytes();
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| OffsiteError::DecryptionFailed)
    }
}

/// Adapter that encrypts an underlying plaintext stream on the fly.
///
/// Reads at most [`SEGMENT_SIZE`] bytes of plaintext ahead, so arbitrarily
/// large files can be transmitted with bounded memory. An empty input
/// produces an empty object (zero frames).
pub struct EncryptReader<R: Read> {
    inner: R,
    cipher: FileCipher,
    segment: u64,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> EncryptReader<R> {
    pub fn new(inner: R, cipher: FileCipher) -> Self {
        Self {
            inner,
            cipher,
            segment: 0,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let mut plaintext = vec![0u8; SEGMENT_SIZE];
        let mut filled = 0;
        while filled < plaintext.len() {
            match self.inner.read(&mut plaintext[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            self.eof = true;
            return Ok(());
        }

        self.buf.clear();
        self.pos = 0;
        self.cipher
            .seal_segment(self.segment, &plaintext[..filled], &mut self.buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        self.segment += 1;
        if filled < SEGMENT_SIZE {
            // Short read means the source is exhausted; skip the extra
            // zero-byte read on the next refill.
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for EncryptReader<R> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if self.pos == self.buf.len() {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
            if self.pos == self.buf.len() {
                return Ok(0);
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Decrypt a complete object produced by [`EncryptReader`].
///
/// Counterpart used by tests and any future restore path; the upload
/// pipeline itself never decrypts.
pub fn open_stream(data: &[u8], key: &FileKey) -> Result<Vec<u8>> {
    let cipher = FileCipher::new(key);
    let mut plaintext = Vec::new();
    let mut rest = data;
    let mut segment = 0u64;

    while !rest.is_empty() {
        if rest.len() < FRAME_HEADER_LEN + NONCE_LEN {
            return Err(OffsiteError::InvalidFormat(
                "truncated frame header".into(),
            ));
        }
        let ct_len = u32::from_be_bytes(rest[..FRAME_HEADER_LEN].try_into().unwrap()) as usize;
        rest = &rest[FRAME_HEADER_LEN..];
        let (nonce, after_nonce) = rest.split_at(NONCE_LEN);
        if ct_len < TAG_LEN || after_nonce.len() < ct_len {
            return Err(OffsiteError::InvalidFormat("truncated frame body".into()));
        }
        let (ciphertext, remaining) = after_nonce.split_at(ct_len);
        plaintext.extend_from_slice(&cipher.open_segment(segment, nonce, ciphertext)?);
        rest = remaining;
        segment += 1;
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn encrypt_all(data: &[u8], key: &FileKey) -> Vec<u8> {
        let mut reader = EncryptReader::new(Cursor::new(data.to_vec()), FileCipher::new(key));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn roundtrip_small() {
        let key = FileKey::generate().unwrap();
        let sealed = encrypt_all(b"attack at dawn", &key);
        assert_eq!(open_stream(&sealed, &key).unwrap(), b"attack at dawn");
    }

    #[test]
    fn roundtrip_multi_segment() {
        let key = FileKey::generate().unwrap();
        let data: Vec<u8> = (0..SEGMENT_SIZE * 2 + 123).map(|i| (i % 251) as u8).collect();
        let sealed = encrypt_all(&data, &key);
        // Two full frames plus a short one.
        assert!(sealed.len() > data.len());
        assert_eq!(open_stream(&sealed, &key).unwrap(), data);
    }

    #[test]
    fn empty_input_produces_empty_object() {
        let key = FileKey::generate().unwrap();
        let sealed = encrypt_all(b"", &key);
        assert!(sealed.is_empty());
        assert_eq!(open_stream(&sealed, &key).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wrong_key_fails() {
        let key = FileKey::generate().unwrap();
        let other = FileKey::generate().unwrap();
        let sealed = encrypt_all(b"secret", &key);
        assert!(matches!(
            open_stream(&sealed, &other),
            Err(OffsiteError::DecryptionFailed)
        ));
    }

    #[test]
    fn ciphertext_hides_plaintext() {
        let key = FileKey::generate().unwrap();
        let sealed = encrypt_all(b"finding this would be bad", &key);
        assert!(!sealed
            .windows(7)
            .any(|w| w == b"finding".as_slice()));
    }

    #[test]
    fn tampered_frame_rejected() {
        let key = FileKey::generate().unwrap();
        let mut sealed = encrypt_all(b"integrity matters", &key);
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open_stream(&sealed, &key).is_err());
    }

    #[test]
    fn truncated_object_rejected() {
        let key = FileKey::generate().unwrap();
        let sealed = encrypt_all(b"do not truncate me", &key);
        assert!(open_stream(&sealed[..sealed.len() - 4], &key).is_err());
        assert!(open_stream(&sealed[..3], &key).is_err());
    }
}
