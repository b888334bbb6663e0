//! Character bucketing for bitmask pruning.
//!
//! Every character seen in the corpus is assigned to one of at most 32
//! buckets so that the total frequency mass per bucket is roughly even.
//! A character's mask is the single bit of its bucket. Suffix masks built
//! from these let searches skip subtrees that cannot contain the
//! characters a query still needs.

use crate::index::types::Mask;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;

/// Upper bound on buckets, one per bit of [`Mask`]
pub const MAX_BUCKETS: usize = Mask::BITS as usize;

/// Errors from table construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// Asked for more buckets than a mask has bits
    TooManyBuckets(usize),
    /// Asked for no buckets at all
    ZeroBuckets,
    /// A mask loaded from storage does not have exactly one bit set
    NotSingleton { symbol: char, mask: Mask },
}

impl fmt::Display for BucketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketError::TooManyBuckets(n) => {
                write!(f, "Requested {} buckets, at most {} are supported", n, MAX_BUCKETS)
            }
            BucketError::ZeroBuckets => write!(f, "At least one bucket is required"),
            BucketError::NotSingleton { symbol, mask } => {
                write!(f, "Mask {:o} for '{}' must have exactly one bit set", mask, symbol)
            }
        }
    }
}

impl std::error::Error for BucketError {}

/// Immutable `char -> singleton mask` table.
///
/// Characters that were not in the corpus map to 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    masks: BTreeMap<char, Mask>,
}

impl SymbolTable {
    /// Rebuild a table from stored `(char, mask)` pairs
    pub fn from_masks(
        entries: impl IntoIterator<Item = (char, Mask)>,
    ) -> Result<Self, BucketError> {
        let mut masks = BTreeMap::new();
        for (symbol, mask) in entries {
            if mask.count_ones() != 1 {
                return Err(BucketError::NotSingleton { symbol, mask });
            }
            masks.insert(symbol, mask);
        }
        Ok(Self { masks })
    }

    /// Mask of `c`, 0 if unknown
    #[inline]
    pub fn mask(&self, c: char) -> Mask {
        self.masks.get(&c).copied().unwrap_or(0)
    }

    /// Mask of `c`, `None` if unknown
    #[inline]
    pub fn get(&self, c: char) -> Option<Mask> {
        self.masks.get(&c).copied()
    }

    pub fn contains(&self, c: char) -> bool {
        self.masks.contains_key(&c)
    }

    /// Number of characters in the table
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Number of distinct buckets in use
    pub fn bucket_count(&self) -> usize {
        self.masks.values().fold(0 as Mask, |acc, m| acc | m).count_ones() as usize
    }

    /// Characters grouped by bucket bit, lowest bit first
    pub fn buckets(&self) -> Vec<(u32, Vec<char>)> {
        let mut grouped: BTreeMap<u32, Vec<char>> = BTreeMap::new();
        for (&c, &m) in &self.masks {
            grouped.entry(m.trailing_zeros()).or_default().push(c);
        }
        grouped.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, Mask)> + '_ {
        self.masks.iter().map(|(&c, &m)| (c, m))
    }

    /// OR of the masks of every character in `text`
    pub fn mask_of(&self, text: &str) -> Mask {
        text.chars().fold(0, |acc, c| acc | self.mask(c))
    }

    /// Suffix-mask array: `result[i]` is the OR of masks of `text[i..]`
    pub fn suffix_masks(&self, text: &str) -> Vec<Mask> {
        let chars: Vec<char> = text.chars().collect();
        self.suffix_masks_of(&chars)
    }

    /// Same as [`Self::suffix_masks`] over already decoded characters
    pub fn suffix_masks_of(&self, chars: &[char]) -> Vec<Mask> {
        let mut masks = vec![0; chars.len()];
        let mut acc = 0;
        for (i, &c) in chars.iter().enumerate().rev() {
            acc |= self.mask(c);
            masks[i] = acc;
        }
        masks
    }
}

/// Running total for one bucket while assigning characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLoad {
    pub id: u32,
    pub mass: u64,
    pub symbols: Vec<char>,
}

/// Greedy balanced partition of an alphabet into buckets.
#[derive(Debug, Clone, Copy)]
pub struct Bucketer {
    bucket_count: usize,
}

impl Default for Bucketer {
    fn default() -> Self {
        Self {
            bucket_count: MAX_BUCKETS,
        }
    }
}

impl Bucketer {
    pub fn new(bucket_count: usize) -> Result<Self, BucketError> {
        if bucket_count == 0 {
            return Err(BucketError::ZeroBuckets);
        }
        if bucket_count > MAX_BUCKETS {
            return Err(BucketError::TooManyBuckets(bucket_count));
        }
        Ok(Self { bucket_count })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Assign every character to a bucket and return the resulting table
    pub fn build(&self, frequencies: impl IntoIterator<Item = (char, u64)>) -> SymbolTable {
        let (table, _) = self.build_with_loads(frequencies);
        table
    }

    /// Like [`Self::build`], also returning the final bucket loads
    pub fn build_with_loads(
        &self,
        frequencies: impl IntoIterator<Item = (char, u64)>,
    ) -> (SymbolTable, Vec<BucketLoad>) {
        let mut symbols: Vec<(char, u64)> = frequencies.into_iter().collect();
        // Most frequent first; break ties on the character for stable output
        symbols.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut loads: Vec<BucketLoad> = Vec::with_capacity(self.bucket_count);
        let mut masks = BTreeMap::new();

        let seeded = symbols.len().min(self.bucket_count);
        for (next_id, &(symbol, freq)) in symbols[..seeded].iter().enumerate() {
            let id = next_id as u32;
            loads.push(BucketLoad {
                id,
                mass: freq,
                symbols: vec![symbol],
            });
            masks.insert(symbol, 1 << id);
        }

        // Min-heap on (mass, id): the lightest bucket wins, lower id on ties
        let mut heap: BinaryHeap<Reverse<(u64, u32)>> =
            loads.iter().map(|b| Reverse((b.mass, b.id))).collect();

        for &(symbol, freq) in &symbols[seeded..] {
            let Some(Reverse((mass, id))) = heap.pop() else {
                break;
            };
            let load = &mut loads[id as usize];
            load.mass = mass + freq;
            load.symbols.push(symbol);
            masks.insert(symbol, 1 << id);
            heap.push(Reverse((load.mass, id)));
        }

        (SymbolTable { masks }, loads)
    }
}

/// Count character occurrences over many texts in parallel
pub fn count_frequencies<S: AsRef<str> + Sync>(texts: &[S]) -> FxHashMap<char, u64> {
    texts
        .par_iter()
        .fold(FxHashMap::default, |mut counts, text| {
            for c in text.as_ref().chars() {
                *counts.entry(c).or_insert(0) += 1;
            }
            counts
        })
        .reduce(FxHashMap::default, |mut a, b| {
            for (c, n) in b {
                *a.entry(c).or_insert(0) += n;
            }
            a
        })
}
