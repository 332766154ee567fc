//! Order-preserving parallel filter over a package index.
//!
//! Small indices are scanned in place. Large ones are cut into fixed-size
//! shards that run on the rayon pool; each shard reports the *positions* it
//! matched, the position sets are unioned, and the union is replayed in
//! ascending order. Output order therefore never depends on which shard
//! finishes first.

use rayon::prelude::*;

/// Indices shorter than this are filtered sequentially.
pub const SPLIT_THRESHOLD: usize = 3000;

/// Number of records evaluated by one shard task.
pub const SHARD_SIZE: usize = 2000;

/// Compact set of index positions, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionSet {
    words: Vec<u64>,
}

impl PositionSet {
    /// An empty set sized for positions below `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
        }
    }

    /// Add `pos`, growing the set if needed.
    pub fn insert(&mut self, pos: usize) {
        let word = pos / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (pos % 64);
    }

    /// Add every member of `other` to `self`.
    pub fn union_with(&mut self, other: &PositionSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True when no position is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(i * 64 + bit)
            })
        })
    }
}

/// Return the elements of `index` accepted by `pred`, in their original order.
///
/// `pred` runs concurrently on large inputs and must only read the element.
pub fn filter<'a, T, F>(index: &'a [T], pred: F) -> Vec<&'a T>
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    if index.len() < SPLIT_THRESHOLD {
        return index.iter().filter(|item| pred(item)).collect();
    }

    let matched = split_positions(index, &pred);
    if matched.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(matched.len());
    out.extend(matched.iter().map(|pos| &index[pos]));
    out
}

fn split_positions<T, F>(index: &[T], pred: &F) -> PositionSet
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    let shards: Vec<PositionSet> = index
        .par_chunks(SHARD_SIZE)
        .enumerate()
        .map(|(shard, items)| {
            let base = shard * SHARD_SIZE;
            let mut set = PositionSet::with_capacity(base + items.len());
            for (offset, item) in items.iter().enumerate() {
                if pred(item) {
                    set.insert(base + offset);
                }
            }
            set
        })
        .collect();

    tracing::trace!(len = index.len(), shards = shards.len(), "split filter");

    let mut union = PositionSet::with_capacity(index.len());
    for set in &shards {
        union.union_with(set);
    }
    union
}
