//! Shared-table context: one lazily created `HashTable` reference counted
//! by the dictionaries attached to it.
//!
//! A dictionary registers with `attach`, which mints a `TableLease` token.
//! Handing the token back through `release` is the only way to decrement
//! the count. The table exists exactly while the count is
//! non-zero. Count and table slot sit behind one mutex so dictionaries of
//! one context can be created and destroyed from different threads.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::config::TableConfig;
use crate::error::{DictError, Result};
use crate::hash_table::HashTable;
use crate::report::{self, Operation};

#[derive(Debug)]
struct LiveState {
    table: Option<Arc<HashTable>>,
    live: usize,
}

#[derive(Debug)]
struct Shared {
    config: TableConfig,
    state: Mutex<LiveState>,
}

/// Handle to a shared table slot. Cloning is cheap and yields a handle to
/// the same context.
#[derive(Clone, Debug)]
pub struct HashContext {
    shared: Arc<Shared>,
}

static GLOBAL: OnceLock<HashContext> = OnceLock::new();

impl HashContext {
    /// A new, independent context. No table is built until the first
    /// dictionary attaches.
    pub fn new(config: TableConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(LiveState {
                    table: None,
                    live: 0,
                }),
            }),
        }
    }

    /// The process-wide default context (depth 1, seed 0).
    pub fn global() -> &'static HashContext {
        GLOBAL.get_or_init(|| HashContext::new(TableConfig::default()))
    }

    pub fn config(&self) -> &TableConfig {
        &self.shared.config
    }

    // The state is updated in single assignments with no user code in
    // between, so a poisoned lock still guards consistent data.
    fn state(&self) -> MutexGuard<'_, LiveState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of dictionaries currently attached.
    pub fn live_count(&self) -> usize {
        self.state().live
    }

    pub fn has_table(&self) -> bool {
        self.state().table.is_some()
    }

    pub fn same_context(&self, other: &HashContext) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The current shared table.
    pub fn shared_table(&self) -> Result<Arc<HashTable>> {
        let res = {
            let st = self.state();
            st.table
                .clone()
                .ok_or(DictError::NoSharedTable { live: st.live })
        };
        report::reported(Operation::HashKey, res)
    }

    /// Hash `bytes` through the current shared table.
    pub fn hash(&self, bytes: &[u8]) -> Result<u64> {
        self.shared_table().map(|t| t.hash(bytes))
    }

    /// Register one more dictionary, building the table if this is the
    /// first. On failure the count is unchanged.
    pub(crate) fn attach(&self) -> Result<(Arc<HashTable>, TableLease)> {
        let mut st = self.state();
        let table = match &st.table {
            Some(t) => t.clone(),
            None => {
                let t = Arc::new(HashTable::from_config(&self.shared.config)?);
                st.table = Some(t.clone());
                t
            }
        };
        st.live += 1;
        tracing::debug!(live = st.live, "attached dictionary to hash context");
        Ok((table, TableLease::new()))
    }

    /// Return a registration. The table is destroyed when the count
    /// reaches zero; a release with the count already at zero is an
    /// invariant violation.
    pub(crate) fn release(&self, lease: TableLease) -> Result<()> {
        let TableLease { .. } = lease;
        let retired = {
            let mut st = self.state();
            if st.live == 0 {
                return Err(DictError::InvariantViolation);
            }
            st.live -= 1;
            tracing::debug!(live = st.live, "detached dictionary from hash context");
            if st.live == 0 {
                st.table.take()
            } else {
                None
            }
        };
        // Dropped outside the lock.
        drop(retired);
        Ok(())
    }
}

/// Proof that one dictionary is counted by a context. Not `Clone`; it is
/// consumed by `HashContext::release`.
#[derive(Debug)]
pub(crate) struct TableLease {
    _private: (),
}

impl TableLease {
    fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fresh_context_has_no_table() {
        let ctx = HashContext::new(TableConfig::default());
        assert_eq!(ctx.live_count(), 0);
        assert!(!ctx.has_table());
        assert_eq!(
            ctx.hash(b"k").unwrap_err(),
            DictError::NoSharedTable { live: 0 }
        );
        let rec = report::take_last_error().unwrap();
        assert_eq!(rec.kind, ErrorKind::NoSharedTable);
    }

    /// Invariant: table exists iff live > 0; all attachments share it.
    #[test]
    fn attach_shares_and_last_release_destroys() {
        let ctx = HashContext::new(TableConfig { depth: 2, seed: 5 });
        let (t1, l1) = ctx.attach().unwrap();
        let (t2, l2) = ctx.attach().unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(ctx.live_count(), 2);
        assert_eq!(ctx.hash(b"xy").unwrap(), t1.hash(b"xy"));

        ctx.release(l1).unwrap();
        assert!(ctx.has_table());
        ctx.release(l2).unwrap();
        assert_eq!(ctx.live_count(), 0);
        assert!(!ctx.has_table());
        // Only the local handles keep the old table alive now.
        assert_eq!(Arc::strong_count(&t1), 2);
    }

    #[test]
    fn release_at_zero_is_an_invariant_violation() {
        let ctx = HashContext::new(TableConfig::default());
        let forged = TableLease::new();
        assert_eq!(ctx.release(forged), Err(DictError::InvariantViolation));
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn rebuilt_table_matches_the_previous_one() {
        let ctx = HashContext::new(TableConfig { depth: 1, seed: 3 });
        let (t1, l1) = ctx.attach().unwrap();
        let before = t1.hash(b"stable");
        ctx.release(l1).unwrap();
        drop(t1);

        let (t2, l2) = ctx.attach().unwrap();
        assert_eq!(t2.hash(b"stable"), before);
        ctx.release(l2).unwrap();
    }

    #[test]
    fn failed_attach_leaves_count_unchanged() {
        let ctx = HashContext::new(TableConfig { depth: 0, seed: 0 });
        let err = ctx.attach().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(ctx.live_count(), 0);
        assert!(!ctx.has_table());
    }

    #[test]
    fn global_is_a_single_context() {
        let a = HashContext::global();
        let b = HashContext::global();
        assert!(a.same_context(b));
        assert_eq!(*a.config(), TableConfig::default());
        assert!(!a.same_context(&HashContext::new(TableConfig::default())));
    }
}
