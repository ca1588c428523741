//! Bloom Filter for Domain Classification
//!
//! Read-only probabilistic set loaded from a pre-built binary asset.
//! The filter is produced offline (see [`BloomFilterWriter`]) and only
//! queried at runtime, so no insertion API exists on [`BloomFilter`].
//!
//! Key properties:
//! - False negatives impossible (an inserted domain is always found)
//! - False positives possible (an extra forget-mode trigger, harmless)
//! - Immutable after load, safe for concurrent reads without locking
//!
//! Asset layout:
//! - bytes 0..7: reserved, ignored
//! - byte 7: probes per query (`u8`)
//! - bytes 8..EOF: little-endian `u32` buckets forming the bit array
//!
//! Probing uses double hashing over the MD5 split of the queried value:
//! `index_0 = seed mod m`, `index_i = (index_{i-1} + step) mod m`.

use crate::hash::DomainHash;
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bits stored in one bucket
pub const BITS_PER_BUCKET: u64 = 32;

/// Bytes of reserved header preceding the probe count
const RESERVED_HEADER_LEN: usize = 7;

/// Bytes per serialized bucket
const BUCKET_LEN: usize = 4;

/// Errors while decoding a filter asset
#[derive(Debug, Error)]
pub enum BloomFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated header: needed {needed} bytes, found {found}")]
    TruncatedHeader { needed: usize, found: usize },

    #[error("Bucket payload of {0} bytes is not a multiple of 4")]
    MisalignedPayload(usize),
}

/// Bounds-checked reader over the raw asset bytes
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BloomFormatError> {
        let end = self.pos + len;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(BloomFormatError::TruncatedHeader {
                needed: end,
                found: self.data.len(),
            })?;
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, len: usize) -> Result<(), BloomFormatError> {
        self.take(len).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8, BloomFormatError> {
        Ok(self.take(1)?[0])
    }

    fn remaining(self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Query statistics
#[derive(Debug, Default)]
pub struct FilterStats {
    /// Number of membership checks performed
    pub checks: AtomicU64,
    /// Number of checks reporting possible membership
    pub matches: AtomicU64,
}

/// Immutable bit-array membership filter
#[derive(Debug, Default)]
pub struct BloomFilter {
    /// Bit array, 32 bits per bucket
    buckets: Vec<u32>,
    /// Probe indices per query
    hash_count: u8,
    /// Statistics
    stats: FilterStats,
}

impl BloomFilter {
    /// Zero-capacity filter; every query returns `false`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a filter from decoded parts
    pub fn from_parts(buckets: Vec<u32>, hash_count: u8) -> Self {
        Self {
            buckets,
            hash_count,
            stats: FilterStats::default(),
        }
    }

    /// Decode a filter from the asset bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BloomFormatError> {
        let mut cursor = ByteCursor::new(bytes);
        cursor.skip(RESERVED_HEADER_LEN)?;
        let hash_count = cursor.read_u8()?;

        let payload = cursor.remaining();
        if payload.len() % BUCKET_LEN != 0 {
            return Err(BloomFormatError::MisalignedPayload(payload.len()));
        }

        let mut buckets = vec![0u32; payload.len() / BUCKET_LEN];
        LittleEndian::read_u32_into(payload, &mut buckets);

        Ok(Self::from_parts(buckets, hash_count))
    }

    /// Read and decode a filter asset from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BloomFormatError> {
        let bytes = std::fs::read(path.as_ref())?;
        let filter = Self::from_bytes(&bytes)?;

        info!(
            "Bloom filter loaded from {}: {} bits, {} hashes, ~{} KB",
            path.as_ref().display(),
            filter.total_bits(),
            filter.hash_count,
            filter.memory_usage() / 1024
        );

        Ok(filter)
    }

    /// Load a filter asset, substituting an empty filter on any failure.
    ///
    /// A missing or malformed asset must never block browsing.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::open(path.as_ref()) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(
                    "Bloom filter at {} unavailable, using empty filter: {}",
                    path.as_ref().display(),
                    e
                );
                Self::empty()
            }
        }
    }

    /// Check whether `value` may be in the set.
    ///
    /// `true` means possibly present; `false` means definitely absent.
    #[inline]
    pub fn contains(&self, value: &str) -> bool {
        self.stats.checks.fetch_add(1, Ordering::Relaxed);

        if self.is_empty() {
            return false;
        }

        let hash = DomainHash::of(value);
        for index in probe_indexes(&hash, self.total_bits(), self.hash_count) {
            let bucket = (index / BITS_PER_BUCKET) as usize;
            let mask = 1u32 << (index % BITS_PER_BUCKET);
            if self.buckets[bucket] & mask == 0 {
                return false;
            }
        }

        self.stats.matches.fetch_add(1, Ordering::Relaxed);
        debug!("Bloom filter match: {}", value);
        true
    }

    /// Number of probe indices per query
    pub fn hash_count(&self) -> u8 {
        self.hash_count
    }

    /// Capacity of the bit array
    pub fn total_bits(&self) -> u64 {
        self.buckets.len() as u64 * BITS_PER_BUCKET
    }

    /// Whether the filter can never report a match
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty() || self.hash_count == 0
    }

    /// Raw bucket words
    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    /// Get memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.buckets.len() * BUCKET_LEN
    }

    /// Get current statistics (checks, matches)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.stats.checks.load(Ordering::Relaxed),
            self.stats.matches.load(Ordering::Relaxed),
        )
    }
}

/// Double-hashing probe sequence for `hash` over a `total_bits` array.
///
/// Unsigned arithmetic with a true modulo keeps every index in
/// `0..total_bits`; `total_bits` must be non-zero.
pub fn probe_indexes(hash: &DomainHash, total_bits: u64, count: u8) -> impl Iterator<Item = u64> {
    let (seed, step) = hash.probe_seed();
    let step = u64::from(step) % total_bits;
    let mut index = u64::from(seed) % total_bits;

    (0..count).map(move |_| {
        let current = index;
        index = (index + step) % total_bits;
        current
    })
}

/// Offline producer of filter assets.
///
/// Inserts with the same probe sequence [`BloomFilter::contains`] queries,
/// so every inserted value is found after a round trip through the file.
#[derive(Debug, Clone)]
pub struct BloomFilterWriter {
    buckets: Vec<u32>,
    hash_count: u8,
    inserted: usize,
}

impl BloomFilterWriter {
    /// Create a writer with a fixed bit array size
    pub fn new(bucket_count: usize, hash_count: u8) -> Self {
        Self {
            buckets: vec![0; bucket_count.max(1)],
            hash_count: hash_count.max(1),
            inserted: 0,
        }
    }

    /// Size the bit array and probe count for a target false positive rate
    pub fn for_capacity(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let bits = (-n * p.ln() / (ln2 * ln2)).ceil();
        let bucket_count = (bits / BITS_PER_BUCKET as f64).ceil() as usize;
        let total_bits = (bucket_count.max(1) as u64 * BITS_PER_BUCKET) as f64;
        let hash_count = (total_bits / n * ln2).round().clamp(1.0, f64::from(u8::MAX)) as u8;

        info!(
            "Bloom writer sized for {} items at {:.2}% FP: {} bits, {} hashes",
            expected_items,
            p * 100.0,
            total_bits,
            hash_count
        );

        Self::new(bucket_count, hash_count)
    }

    /// Set the bits for `value`
    pub fn insert(&mut self, value: &str) {
        let total_bits = self.buckets.len() as u64 * BITS_PER_BUCKET;
        let hash = DomainHash::of(value);

        for index in probe_indexes(&hash, total_bits, self.hash_count) {
            let bucket = (index / BITS_PER_BUCKET) as usize;
            self.buckets[bucket] |= 1u32 << (index % BITS_PER_BUCKET);
        }
        self.inserted += 1;
    }

    /// Number of insert calls so far
    pub fn len(&self) -> usize {
        self.inserted
    }

    /// Whether nothing has been inserted yet
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Serialize to the asset layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; RESERVED_HEADER_LEN];
        bytes.push(self.hash_count);

        let payload_start = bytes.len();
        bytes.resize(payload_start + self.buckets.len() * BUCKET_LEN, 0);
        LittleEndian::write_u32_into(&self.buckets, &mut bytes[payload_start..]);
        bytes
    }

    /// Write the asset to disk
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), BloomFormatError> {
        std::fs::write(path.as_ref(), self.to_bytes())?;
        info!(
            "Wrote Bloom filter with {} entries to {}",
            self.inserted,
            path.as_ref().display()
        );
        Ok(())
    }

    /// Finish into a queryable filter without touching disk
    pub fn into_filter(self) -> BloomFilter {
        BloomFilter::from_parts(self.buckets, self.hash_count)
    }
}
