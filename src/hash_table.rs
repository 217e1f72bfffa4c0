//! HashTable: seeded substitution table that digests byte keys.
//!
//! The table is `depth` layers of 256 pseudorandom words. Byte `i` of a key
//! selects word `key[i]` of layer `i % depth` and all selected words are
//! XOR-ed together. This is fast and spreads keys well enough for bucket
//! selection; it is not a cryptographic hash and makes no attempt to be.

use rand_core::{RngCore, SeedableRng};
use rand_pcg::Lcg128Xsl64 as Pcg;

use crate::config::TableConfig;
use crate::error::{AllocTarget, DictError, Result};
use crate::report::{self, Operation};

/// Words per layer, one per possible byte value.
pub const LAYER_WIDTH: usize = 256;

pub struct HashTable {
    words: Box<[u64]>,
    depth: u32,
    seed: u64,
}

impl HashTable {
    /// Build a table of `depth` layers from `seed`. The same pair always
    /// yields the same table.
    pub fn try_new(depth: u32, seed: u64) -> Result<Self> {
        report::reported(Operation::CreateHash, Self::build(depth, seed))
    }

    fn build(depth: u32, seed: u64) -> Result<Self> {
        if depth == 0 {
            return Err(DictError::InvalidConfig {
                reason: "hash depth must be at least 1",
            });
        }
        let len = (depth as usize).saturating_mul(LAYER_WIDTH);
        let mut words: Vec<u64> = Vec::new();
        words.try_reserve_exact(len).map_err(|source| {
            DictError::allocation(
                AllocTarget::HashTable,
                len.saturating_mul(core::mem::size_of::<u64>()),
                source,
            )
        })?;

        let mut rng = Pcg::seed_from_u64(seed);
        words.extend((0..len).map(|_| rng.next_u64()));

        tracing::debug!(depth, seed, "created hash table");
        Ok(Self {
            words: words.into_boxed_slice(),
            depth,
            seed,
        })
    }

    pub fn from_config(config: &TableConfig) -> Result<Self> {
        Self::try_new(config.depth, config.seed)
    }

    /// Digest `bytes`. The empty key hashes to 0.
    #[inline]
    pub fn hash(&self, bytes: &[u8]) -> u64 {
        bytes
            .iter()
            .zip(self.words.chunks_exact(LAYER_WIDTH).cycle())
            .fold(0, |h, (&b, layer)| h ^ layer[b as usize])
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The 256 words of layer `i`, if it exists.
    pub fn layer(&self, i: usize) -> Option<&[u64]> {
        self.words.chunks_exact(LAYER_WIDTH).nth(i)
    }
}

impl Drop for HashTable {
    fn drop(&mut self) {
        tracing::debug!(depth = self.depth, seed = self.seed, "destroyed hash table");
    }
}

impl core::fmt::Debug for HashTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("depth", &self.depth)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
