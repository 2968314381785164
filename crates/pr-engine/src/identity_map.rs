//! Open-addressing map from note identity to voice slot.
//!
//! Linear probing over a power-of-two bucket array kept at most half full.
//! Deletion shifts the rest of the probe run back into the hole instead of
//! leaving tombstones, so lookups never degrade however many notes come and
//! go during playback.

use alloc::vec;
use alloc::vec::Vec;

/// Key stored in empty buckets. Never a valid key.
pub const EMPTY_KEY: u64 = 0;

const MIN_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Bucket {
    key: u64,
    value: u32,
}

const EMPTY: Bucket = Bucket {
    key: EMPTY_KEY,
    value: 0,
};

/// Map from a non-zero 64-bit key to a 32-bit value.
#[derive(Clone, Debug)]
pub struct IdentityMap {
    buckets: Vec<Bucket>,
    len: usize,
}

impl Default for IdentityMap {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::with_capacity(MIN_CAPACITY / 2)
    }

    /// Create a map that holds `entries` keys before it first grows.
    pub fn with_capacity(entries: usize) -> Self {
        let capacity = (entries.saturating_mul(2)).next_power_of_two().max(MIN_CAPACITY);
        Self {
            buckets: vec![EMPTY; capacity],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets (always a power of two).
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    #[inline]
    fn ideal_bucket(&self, key: u64) -> usize {
        hash(key) as usize & self.mask()
    }

    /// Bucket index holding `key`, if present.
    pub fn get_index_from_key(&self, key: u64) -> Option<usize> {
        let mask = self.mask();
        let mut i = self.ideal_bucket(key);
        loop {
            let bucket = self.buckets[i];
            if bucket.key == key {
                return Some(i);
            }
            if bucket.key == EMPTY_KEY {
                return None;
            }
            i = (i + 1) & mask;
        }
    }

    /// Value stored in bucket `index` (from [`get_index_from_key`](Self::get_index_from_key)).
    #[inline]
    pub fn get_value_from_index(&self, index: usize) -> u32 {
        self.buckets[index].value
    }

    /// Overwrite the value in bucket `index` without rehashing.
    #[inline]
    pub fn set_value_at_index(&mut self, index: usize, value: u32) {
        self.buckets[index].value = value;
    }

    pub fn get(&self, key: u64) -> Option<u32> {
        self.get_index_from_key(key).map(|i| self.buckets[i].value)
    }

    pub fn has(&self, key: u64) -> bool {
        self.get_index_from_key(key).is_some()
    }

    /// Insert or update. Returns the previous value if the key was present.
    pub fn set(&mut self, key: u64, value: u32) -> Option<u32> {
        debug_assert_ne!(key, EMPTY_KEY, "the empty-bucket key cannot be stored");

        match self.probe(key) {
            Ok(i) => {
                let old = self.buckets[i].value;
                self.buckets[i].value = value;
                Some(old)
            }
            Err(mut i) => {
                if self.len + 1 > self.capacity() / 2 {
                    self.grow();
                    i = match self.probe(key) {
                        Ok(i) | Err(i) => i,
                    };
                }
                self.buckets[i] = Bucket { key, value };
                self.len += 1;
                None
            }
        }
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: u64) -> Option<u32> {
        let mut hole = self.get_index_from_key(key)?;
        let value = self.buckets[hole].value;
        let mask = self.mask();

        // Walk the rest of the run. An entry may move into the hole only if
        // the hole lies between its ideal bucket and where it sits now.
        let mut j = hole;
        loop {
            j = (j + 1) & mask;
            let bucket = self.buckets[j];
            if bucket.key == EMPTY_KEY {
                break;
            }
            let ideal = self.ideal_bucket(bucket.key);
            let displacement = j.wrapping_sub(ideal) & mask;
            let gap = j.wrapping_sub(hole) & mask;
            if displacement >= gap {
                self.buckets[hole] = bucket;
                hole = j;
            }
        }

        self.buckets[hole] = EMPTY;
        self.len -= 1;
        Some(value)
    }

    /// Empty every bucket. Capacity is kept.
    pub fn clear(&mut self) {
        self.buckets.fill(EMPTY);
        self.len = 0;
    }

    /// Iterate `(key, value)` pairs in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.buckets
            .iter()
            .filter(|b| b.key != EMPTY_KEY)
            .map(|b| (b.key, b.value))
    }

    /// `Ok(index)` of the key, or `Err(index)` of the empty bucket ending its run.
    fn probe(&self, key: u64) -> Result<usize, usize> {
        let mask = self.mask();
        let mut i = self.ideal_bucket(key);
        loop {
            let bucket_key = self.buckets[i].key;
            if bucket_key == key {
                return Ok(i);
            }
            if bucket_key == EMPTY_KEY {
                return Err(i);
            }
            i = (i + 1) & mask;
        }
    }

    /// Double the bucket array and reinsert everything.
    fn grow(&mut self) {
        let doubled = self.capacity() * 2;
        let old = core::mem::replace(&mut self.buckets, vec![EMPTY; doubled]);
        let mask = self.mask();
        for bucket in old.into_iter().filter(|b| b.key != EMPTY_KEY) {
            let mut i = hash(bucket.key) as usize & mask;
            while self.buckets[i].key != EMPTY_KEY {
                i = (i + 1) & mask;
            }
            self.buckets[i] = bucket;
        }
    }
}

/// 64-bit finalizer from SplitMix64.
#[inline]
fn hash(key: u64) -> u64 {
    let mut x = key;
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
