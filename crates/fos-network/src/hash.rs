//! Domain Hashing
//!
//! MD5 digest of a domain string, split into halves.
//!
//! Two consumers read the same digest differently:
//! - Bloom filter probing takes the first two 32-bit words (hex chars 0..8
//!   and 8..16) as the double-hashing seed and step.
//! - The remote blocklist takes hex chars 0..16 as the query prefix and
//!   matches hex chars 16..32 locally, so the server never sees the full hash.

use byteorder::{BigEndian, ByteOrder};
use md5::{Digest, Md5};
use std::fmt;

/// Length of an MD5 digest in bytes
const DIGEST_LEN: usize = 16;

/// Number of digest bytes sent to the blocklist server (16 hex chars)
const LOOKUP_PREFIX_LEN: usize = 8;

/// MD5 digest of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainHash {
    digest: [u8; DIGEST_LEN],
}

impl DomainHash {
    /// Hash the UTF-8 bytes of `value`.
    ///
    /// No normalization happens here. Callers hashing hosts must normalize
    /// identically at build time and query time.
    pub fn of(value: &str) -> Self {
        let output = Md5::digest(value.as_bytes());
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&output);
        Self { digest }
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Lowercase 32-char hex digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Seed and step for double hashing.
    ///
    /// Equivalent to parsing hex chars 0..8 and 8..16 as base-16 integers.
    pub fn probe_seed(&self) -> (u32, u32) {
        (
            BigEndian::read_u32(&self.digest[0..4]),
            BigEndian::read_u32(&self.digest[4..8]),
        )
    }

    /// First 16 hex chars, sent to the blocklist server
    pub fn lookup_prefix(&self) -> String {
        hex::encode(&self.digest[..LOOKUP_PREFIX_LEN])
    }

    /// Last 16 hex chars, compared against the server's candidates
    pub fn lookup_suffix(&self) -> String {
        hex::encode(&self.digest[LOOKUP_PREFIX_LEN..])
    }
}

impl fmt::Display for DomainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hash = DomainHash::of("tracker.example");
        assert_eq!(hash.to_hex(), "feccd2e2c2e1a3ae25510c3c72395a45");
    }

    #[test]
    fn test_probe_seed_matches_hex_halves() {
        let hash = DomainHash::of("tracker.example");
        let (seed, step) = hash.probe_seed();

        assert_eq!(seed, u32::from_str_radix("feccd2e2", 16).unwrap());
        assert_eq!(step, u32::from_str_radix("c2e1a3ae", 16).unwrap());
        assert_eq!((seed, step), (4_274_836_194, 3_269_567_406));
    }

    #[test]
    fn test_lookup_split() {
        let hash = DomainHash::of("example.com");

        assert_eq!(hash.lookup_prefix(), "5ababd603b227803");
        assert_eq!(hash.lookup_suffix(), "02dd8d83498e5172");
        assert_eq!(
            format!("{}{}", hash.lookup_prefix(), hash.lookup_suffix()),
            hash.to_hex()
        );
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(DomainHash::of("example.com"), DomainHash::of("example.com"));
        assert_ne!(DomainHash::of("example.com"), DomainHash::of("Example.com"));
    }
}
