use serde::{Deserialize, Serialize};

/// Parameters of a shared substitution table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of 256-word layers; key byte `i` is looked up in layer
    /// `i % depth`.
    pub depth: u32,
    /// Seed of the generator that fills the table.
    pub seed: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { depth: 1, seed: 0 }
    }
}

/// Parameters of a single dictionary.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DictConfig {
    /// Fixed number of buckets. Should be about the expected number of
    /// entries; it never grows.
    pub bucket_count: usize,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self { bucket_count: 64 }
    }
}
