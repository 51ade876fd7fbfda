//! SHA-256 digests for content-derived identity.
//!
//! The content hash of a molecule is the lowercase hex SHA-256 of its
//! canonical string and nothing else, so equal canonical strings always map
//! to equal keys regardless of process, platform or input order.

use sha2::{Digest, Sha256};
use std::io::Read;

/// Length of a hex-encoded SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 64;

/// Calculate the SHA-256 hash of in-memory data.
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content hash of a canonical structure string.
pub fn content_hash(canonical: &str) -> String {
    sha256(canonical.as_bytes())
}

/// Whether `s` looks like a content hash (64 lowercase hex digits).
pub fn is_content_hash(s: &str) -> bool {
    s.len() == CONTENT_HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Format a content hash in the 14-10-1 block layout of an InChIKey.
///
/// The result is upper-case, e.g. `ABCDEF01234567-89ABCDEF01-N`. It is an
/// identity key with the familiar shape, not a real InChIKey.
pub fn pseudo_inchikey(hash: &str) -> Option<String> {
    if !is_content_hash(hash) {
        return None;
    }
    let upper = hash.to_ascii_uppercase();
    Some(format!("{}-{}-N", &upper[..14], &upper[14..24]))
}

/// A reader adapter that digests every byte passing through it.
///
/// Used to fingerprint an upload while it is being parsed, without buffering
/// the whole stream.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Hex digest of everything read so far.
    pub fn digest(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_empty() {
        let hash = sha256(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_hash_is_digest_of_string() {
        let h = content_hash("CCO");
        assert_eq!(h.len(), CONTENT_HASH_LEN);
        assert!(is_content_hash(&h));
        assert_eq!(h, sha256(b"CCO"));
        assert_ne!(h, content_hash("OCC"));
    }

    #[test]
    fn rejects_non_hashes() {
        assert!(!is_content_hash("abc"));
        assert!(!is_content_hash(&"G".repeat(64)));
        assert!(!is_content_hash(&"A".repeat(64)));
    }

    #[test]
    fn pseudo_inchikey_layout() {
        let key = pseudo_inchikey(&sha256(b"hello world")).unwrap();
        assert_eq!(key, "B94D27B9934D3E-08A52E52D7-N");
        assert_eq!(key.len(), 27);
        assert!(pseudo_inchikey("short").is_none());
    }

    #[test]
    fn hashing_reader_matches_in_memory() {
        let data = b"hello world".to_vec();
        let mut reader = HashingReader::new(&data[..]);
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();
        assert_eq!(sink, data);
        assert_eq!(reader.bytes_read(), 11);
        assert_eq!(reader.digest(), sha256(b"hello world"));
    }

    #[test]
    fn hashing_reader_over_file() {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello world").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut reader = HashingReader::new(std::io::BufReader::new(file));
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        assert_eq!(
            reader.digest(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
