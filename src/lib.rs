//! chained-dict: a fixed-bucket, chained dictionary from byte keys to byte
//! values, hashed through a substitution table shared by every live
//! dictionary of a context.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep each concern in its own small layer so ownership of keys,
//!   values and the shared table can be checked independently.
//! - Layers:
//!   - HashTable: `depth × 256` seeded pseudorandom words; a key's digest
//!     is the XOR of one word per byte, cycling through the layers.
//!   - HashContext: owns the shared table slot and the live-dictionary
//!     count. The first attaching dictionary builds the table, the last
//!     one to leave destroys it.
//!   - ChainTable<'v>: structural layer. Fixed bucket heads, nodes in a
//!     generational arena, chains linked by arena keys.
//!   - Dict<'v>: public API. Hashes, walks chains, enforces key
//!     uniqueness and value ownership, records failures.
//!
//! Constraints
//! - Buckets are fixed at creation; there is no rehashing.
//! - `len()` is recomputed by walking every chain.
//! - Keys are always copied into the dictionary; values follow their mode.
//! - Every allocation made on behalf of an operation is fallible except
//!   arena growth. A failed operation leaves the dictionary as it was.
//!
//! Value ownership
//! - `Value::Borrowed` (`Pointer` mode) stores the caller's slice. The
//!   `'v` lifetime on `Dict` keeps the caller from freeing it early.
//! - `Value::Owned` (`Copy` mode) stores a duplicate made at insert.
//! - `Value::Leased` (`Insert` mode) stores the caller's buffer as-is and
//!   runs its release hook on overwrite, removal or drop.
//! - A copied dictionary shares `Borrowed` values with its source and
//!   duplicates the rest into `Owned` buffers.
//!
//! Shared-table lifecycle
//! - The count and table slot are guarded by a mutex inside the context;
//!   `HashContext::global()` is the process-wide default.
//! - Each dictionary holds an `Arc` of the table it attached to and hashes
//!   without taking the lock.
//! - A registration is a `TableLease` token handed back exactly once, on
//!   `destroy` or drop. Releasing with a zero count is reported as
//!   `InvariantViolation`.
//!
//! Error reporting
//! - Operations return `Result<_, DictError>`; nothing panics or aborts.
//! - Each failure is also stored as the calling thread's last error (see
//!   `report`) and emitted as a `tracing` event.
//!
//! Notes and non-goals
//! - The digest is not cryptographic and with depth 1 ignores byte order.
//! - No persistence, no network surface, no atomic batch insert:
//!   `add_list` stops at the first failure and keeps earlier insertions.

mod chain;
pub mod config;
pub mod context;
mod dict;
mod dict_proptest;
pub mod error;
pub mod hash_table;
pub mod key;
pub mod report;
pub mod value;

// Public surface
pub use config::{DictConfig, TableConfig};
pub use context::HashContext;
pub use dict::Dict;
pub use error::{AllocTarget, DictError, ErrorKind, Result};
pub use hash_table::HashTable;
pub use key::{DictKey, KeyKind};
pub use report::{clear_last_error, last_error, take_last_error, ErrorRecord, Operation};
pub use value::{Leased, Value, ValueMode};
