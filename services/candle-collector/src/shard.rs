//! Round-robin partitioning of the instrument universe across collectors
//!
//! Shard `i` of `n` owns every configuration entry whose position `k` in the
//! list satisfies `k mod n == i`. The partition is a pure function of the
//! list order, so independently started collectors agree on ownership
//! without coordinating. Shards must be disjoint and covering: two shards
//! writing the same instrument's current-candle key would race.

use std::fmt;

use tick_types::errors::ShardError;

/// Validated shard parameters (`0 <= index < count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    index: usize,
    count: usize,
}

impl ShardSpec {
    pub fn new(index: usize, count: usize) -> Result<Self, ShardError> {
        if count == 0 {
            return Err(ShardError::ZeroCount);
        }
        if index >= count {
            return Err(ShardError::IndexOutOfRange { index, count });
        }
        Ok(Self { index, count })
    }

    /// The whole universe in one process.
    pub fn single() -> Self {
        Self { index: 0, count: 1 }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the entry at `position` in the universe belongs to this shard.
    pub fn owns(&self, position: usize) -> bool {
        position % self.count == self.index
    }

    /// Select this shard's entries, preserving their relative order.
    pub fn partition<T: Clone>(&self, universe: &[T]) -> Vec<T> {
        universe
            .iter()
            .enumerate()
            .filter(|(position, _)| self.owns(*position))
            .map(|(_, item)| item.clone())
            .collect()
    }
}

impl Default for ShardSpec {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.count)
    }
}

/// Select shard `index` of `count` from the universe.
pub fn partition<T: Clone>(universe: &[T], index: usize, count: usize) -> Result<Vec<T>, ShardError> {
    Ok(ShardSpec::new(index, count)?.partition(universe))
}


// ── Property-Based Tests ────────────────────────────────────────────

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_shards_partition_universe(
            len in 0usize..300,
            count in 1usize..16,
        ) {
            let universe: Vec<usize> = (0..len).collect();

            let mut seen = vec![0u32; len];
            for index in 0..count {
                for item in partition(&universe, index, count).unwrap() {
                    seen[item] += 1;
                }
            }

            // Every entry lands in exactly one shard
            prop_assert!(seen.iter().all(|&hits| hits == 1));
        }
    }
}
