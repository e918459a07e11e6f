//! Key hashing.
//!
//! Two unrelated hashes serve two unrelated purposes:
//!
//! - [`djb2`] is a fast 32-bit string hash used only to pick a memory
//!   partition for a key. Taken modulo the partition count it must be
//!   stable for the lifetime of the process, so a key's partition never
//!   changes during a run.
//! - [`HashPath`] is a SHA-256 digest of the key rendered as 64 lowercase
//!   hex characters and split into four 16-character directory segments.
//!   It addresses the entry's location in the disk tier while bounding
//!   the fan-out at each directory level.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// DJB2 hash over the raw bytes of a key.
///
/// Seed 5381, accumulator `acc * 33 + byte`, 32-bit wrap-around arithmetic.
#[inline]
pub fn djb2(key: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in key {
        hash = hash.wrapping_mul(33).wrapping_add(u32::from(byte));
    }
    hash
}

/// Select the memory partition for a key.
///
/// A pure function of the key and the partition count; the result never
/// changes during a run.
#[inline]
pub fn partition_index(key: &[u8], partition_count: u8) -> usize {
    debug_assert!(partition_count > 0);
    (djb2(key) % u32::from(partition_count)) as usize
}

/// Number of directory segments in a content-addressed path.
const SEGMENTS: usize = 4;

/// Hex characters per path segment (4 x 16 = the full SHA-256 digest).
const SEGMENT_LEN: usize = 16;

/// The content-addressed path for a key: four 16-hex-character directory
/// segments derived from the key's SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPath {
    hex: String,
}

impl HashPath {
    /// Derive the path for a key.
    pub fn from_key(key: &[u8]) -> Self {
        Self {
            hex: hex::encode(Sha256::digest(key)),
        }
    }

    /// The four directory segments, most significant first.
    pub fn segments(&self) -> [&str; SEGMENTS] {
        let mut out = [""; SEGMENTS];
        for (i, seg) in out.iter_mut().enumerate() {
            *seg = &self.hex[i * SEGMENT_LEN..(i + 1) * SEGMENT_LEN];
        }
        out
    }

    /// Join the segments under a base directory.
    pub fn join(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        for seg in self.segments() {
            path.push(seg);
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_djb2_empty_is_seed() {
        assert_eq!(djb2(b""), 5381);
    }

    #[test]
    fn test_djb2_known_values() {
        // 5381 * 33 + 'a'
        assert_eq!(djb2(b"a"), 177670);
        // (5381 * 33 + 'a') * 33 + 'b'
        assert_eq!(djb2(b"ab"), 5863208);
    }

    #[test]
    fn test_partition_index_in_range_and_stable() {
        for count in [1u8, 3, 16, 255] {
            let idx = partition_index(b"some-key", count);
            assert!(idx < usize::from(count));
            assert_eq!(idx, partition_index(b"some-key", count));
        }
    }

    #[test]
    fn test_hash_path_empty_key() {
        // SHA-256 of the empty string.
        let path = HashPath::from_key(b"");
        assert_eq!(
            path.segments(),
            [
                "e3b0c44298fc1c14",
                "9afbf4c8996fb924",
                "27ae41e4649b934c",
                "a495991b7852b855",
            ]
        );
    }

    #[test]
    fn test_hash_path_join() {
        let path = HashPath::from_key(b"hello");
        let joined = path.join(Path::new("/tmp/base"));
        let segments = path.segments();
        let expected: PathBuf = [
            "/tmp/base",
            segments[0],
            segments[1],
            segments[2],
            segments[3],
        ]
        .iter()
        .collect();
        assert_eq!(joined, expected);
        // Each segment is 16 lowercase hex characters.
        for seg in segments {
            assert_eq!(seg.len(), 16);
            assert!(seg.chars().all(|c| c.is_ascii_hexdigit()));
            assert_eq!(seg, seg.to_lowercase());
        }
    }

    #[test]
    fn test_hash_path_distinct_keys() {
        assert_ne!(HashPath::from_key(b"a"), HashPath::from_key(b"b"));
    }
}
