use std::sync::Arc;

use crate::chain::{ChainNode, ChainTable};
use crate::config::DictConfig;
use crate::context::{HashContext, TableLease};
use crate::error::{AllocTarget, DictError, Result};
use crate::hash_table::HashTable;
use crate::key::{DictKey, KeyKind};
use crate::report::{self, Operation};
use crate::value::{try_copy, Value, ValueMode};

/// Fixed-bucket, chained dictionary from byte keys to byte values.
///
/// `'v` bounds the values stored in `Pointer` mode: the dictionary cannot
/// outlive data it borrows.
pub struct Dict<'v> {
    chains: ChainTable<'v>,
    table: Arc<HashTable>,
    ctx: HashContext,
    lease: Option<TableLease>,
}

impl<'v> Dict<'v> {
    /// Create a dictionary with `bucket_count` buckets on the global
    /// context.
    pub fn new(bucket_count: usize) -> Result<Self> {
        Self::with_context(HashContext::global(), bucket_count)
    }

    /// Create a dictionary on `ctx`, building its shared table if no other
    /// dictionary of `ctx` is live.
    pub fn with_context(ctx: &HashContext, bucket_count: usize) -> Result<Self> {
        report::reported(Operation::CreateDict, Self::create(ctx, bucket_count))
    }

    pub fn with_config(ctx: &HashContext, config: &DictConfig) -> Result<Self> {
        Self::with_context(ctx, config.bucket_count)
    }

    // Buckets first: if attaching fails they are simply dropped and the
    // context count is untouched.
    fn create(ctx: &HashContext, bucket_count: usize) -> Result<Self> {
        let chains = ChainTable::try_with_buckets(bucket_count)?;
        let (table, lease) = ctx.attach()?;
        tracing::debug!(bucket_count, "created dictionary");
        Ok(Self {
            chains,
            table,
            ctx: ctx.clone(),
            lease: Some(lease),
        })
    }

    #[inline]
    fn bucket_for(&self, bytes: &[u8]) -> usize {
        self.chains.bucket_of(self.table.hash(bytes))
    }

    /// Insert or overwrite `key`. On overwrite the previous value is
    /// released first if the dictionary owned it.
    ///
    /// On failure the dictionary is unchanged and `value` is dropped.
    /// Key copies fail with `Allocation`; growth of the node arena does
    /// not and aborts on out-of-memory like any std collection.
    pub fn add_item<K: DictKey + ?Sized>(&mut self, key: &K, value: Value<'v>) -> Result<()> {
        report::reported(Operation::AddItem, self.add_inner(key, value))
    }

    /// Insert or overwrite `key` with a `Copy`-mode duplicate of `bytes`.
    pub fn add_copy<K: DictKey + ?Sized>(&mut self, key: &K, bytes: &[u8]) -> Result<()> {
        let res = try_copy(bytes, AllocTarget::Value)
            .and_then(|buf| self.add_inner(key, Value::Owned(buf)));
        report::reported(Operation::AddItem, res)
    }

    fn add_inner<K: DictKey + ?Sized>(&mut self, key: &K, value: Value<'v>) -> Result<()> {
        let kind = key.kind();
        key.with_bytes(|bytes| {
            let bucket = self.bucket_for(bytes);
            if let Some(k) = self.chains.find(bucket, kind, bytes) {
                if let Some(node) = self.chains.node_mut(k) {
                    // Old value dropped here, before the new one is visible.
                    node.value = value;
                }
                return Ok(());
            }
            let owned_key = try_copy(bytes, AllocTarget::Key)?;
            self.chains
                .append(bucket, ChainNode::new(kind, owned_key, value));
            Ok(())
        })
    }

    /// Insert every pair in order and return how many were inserted.
    ///
    /// Stops at the first failure without undoing earlier insertions.
    pub fn add_list<'k, K, I>(&mut self, items: I) -> Result<usize>
    where
        K: DictKey + ?Sized + 'k,
        I: IntoIterator<Item = (&'k K, Value<'v>)>,
    {
        let mut inserted = 0;
        for (key, value) in items {
            if let Err(e) = self.add_inner(key, value) {
                report::record(Operation::AddList, &e);
                tracing::debug!(inserted, "batch insert stopped early");
                return Err(e);
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    fn lookup<K: DictKey + ?Sized>(&self, key: &K) -> Option<&ChainNode<'v>> {
        let kind = key.kind();
        key.with_bytes(|bytes| {
            let bucket = self.bucket_for(bytes);
            self.chains
                .find(bucket, kind, bytes)
                .and_then(|k| self.chains.node(k))
        })
    }

    /// Borrow the stored value for `key`.
    pub fn get_value<K: DictKey + ?Sized>(&self, key: &K) -> Result<&Value<'v>> {
        let res = self.lookup(key).map(|n| &n.value).ok_or(DictError::NotFound);
        report::reported(Operation::GetItem, res)
    }

    /// Borrow the bytes stored for `key`. For `Pointer` values this is the
    /// caller's own slice.
    pub fn get<K: DictKey + ?Sized>(&self, key: &K) -> Result<&[u8]> {
        self.get_value(key).map(Value::as_bytes)
    }

    pub fn mode<K: DictKey + ?Sized>(&self, key: &K) -> Result<ValueMode> {
        self.get_value(key).map(Value::mode)
    }

    /// Whether `key` is present. Absence is not an error.
    pub fn contains<K: DictKey + ?Sized>(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Remove `key`, releasing its value if the dictionary owned it.
    pub fn remove<K: DictKey + ?Sized>(&mut self, key: &K) -> Result<()> {
        let kind = key.kind();
        let res = key.with_bytes(|bytes| {
            let bucket = self.bucket_for(bytes);
            self.chains
                .unlink(bucket, kind, bytes)
                .map(drop)
                .ok_or(DictError::NotFound)
        });
        report::reported(Operation::RemoveItem, res)
    }

    /// Deep copy on the same context with the same bucket count.
    ///
    /// Keys are duplicated. `Copy` and `Insert` values are duplicated into
    /// owned buffers, so the copy reports them as `Copy`. `Pointer` values
    /// are shared: both dictionaries then borrow the same caller bytes.
    pub fn try_clone(&self) -> Result<Dict<'v>> {
        report::reported(Operation::CopyDict, self.clone_inner())
    }

    fn clone_inner(&self) -> Result<Dict<'v>> {
        // Dropping a half-built copy releases its registration.
        let mut copy = Dict::create(self.context(), self.bucket_count())?;
        for bucket in 0..self.bucket_count() {
            for (_, node) in self.chains.chain(bucket) {
                let key = try_copy(&node.key, AllocTarget::Key)?;
                let value = node.value.try_clone()?;
                copy.chains
                    .append(bucket, ChainNode::new(node.kind, key, value));
            }
        }
        Ok(copy)
    }

    /// Number of entries, counted by walking every chain.
    pub fn len(&self) -> usize {
        self.chains.count()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.chains.bucket_count()
    }

    /// Number of entries in one bucket's chain.
    pub fn chain_len(&self, bucket: usize) -> usize {
        self.chains.chain(bucket).count()
    }

    /// The context this dictionary is registered with.
    pub fn context(&self) -> &HashContext {
        &self.ctx
    }

    /// Entries as `(kind, key bytes, value)`, in bucket then chain order.
    pub fn iter(&self) -> impl Iterator<Item = (KeyKind, &[u8], &Value<'v>)> + '_ {
        self.chains.iter().map(|n| (n.kind, &*n.key, &n.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = (KeyKind, &[u8])> + '_ {
        self.iter().map(|(kind, key, _)| (kind, key))
    }

    /// Release every entry and the context registration.
    ///
    /// Reports `InvariantViolation` if the context no longer counted this
    /// dictionary as live.
    pub fn destroy(mut self) -> Result<()> {
        report::reported(Operation::DestroyDict, self.teardown())
    }

    // Entries are dropped before the lease is returned so that release
    // hooks never run while the context lock is held.
    fn teardown(&mut self) -> Result<()> {
        self.chains.clear();
        match self.lease.take() {
            Some(lease) => {
                let res = self.ctx.release(lease);
                tracing::debug!(ok = res.is_ok(), "destroyed dictionary");
                res
            }
            None => Ok(()),
        }
    }
}

impl Drop for Dict<'_> {
    fn drop(&mut self) {
        if self.lease.is_some() {
            if let Err(e) = self.teardown() {
                report::record(Operation::DestroyDict, &e);
                tracing::warn!(error = %e, "dictionary teardown failed");
            }
        }
    }
}

impl core::fmt::Debug for Dict<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(_, k, v)| (k, v)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableConfig;
    use crate::error::ErrorKind;

    fn ctx() -> HashContext {
        HashContext::new(TableConfig::default())
    }

    fn int(v: i32) -> [u8; 4] {
        v.to_ne_bytes()
    }

    #[test]
    fn four_bucket_scenario() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 4).unwrap();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("ab", 4)] {
            d.add_item(k, Value::copy(&int(v)).unwrap()).unwrap();
        }
        assert_eq!(d.get("a").unwrap(), int(1));
        assert_eq!(d.get("ab").unwrap(), int(4));
        assert_eq!(d.len(), 4);

        d.remove("b").unwrap();
        assert_eq!(d.len(), 3);
        assert!(!d.contains("b"));
        d.destroy().unwrap();
        assert_eq!(c.live_count(), 0);
    }

    /// Invariant: overwrite replaces value and mode, never the entry count.
    #[test]
    fn overwrite_switches_mode() {
        let c = ctx();
        let borrowed = *b"ptr";
        let mut d = Dict::with_context(&c, 2).unwrap();
        d.add_item("k", Value::copy(b"one").unwrap()).unwrap();
        assert_eq!(d.mode("k").unwrap(), ValueMode::Copy);
        d.add_item("k", Value::pointer(&borrowed)).unwrap();
        assert_eq!(d.mode("k").unwrap(), ValueMode::Pointer);
        d.add_item("k", Value::insert(b"three".to_vec())).unwrap();
        assert_eq!(d.mode("k").unwrap(), ValueMode::Insert);
        assert_eq!(d.get("k").unwrap(), b"three");
        d.add_copy("k", b"four").unwrap();
        assert_eq!(d.mode("k").unwrap(), ValueMode::Copy);
        assert_eq!(d.get("k").unwrap(), b"four");
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn missing_keys_report_not_found() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 8).unwrap();
        report::clear_last_error();
        assert!(!d.contains("nope"));
        assert!(report::last_error().is_none(), "contains records nothing");

        assert_eq!(d.get("nope").unwrap_err(), DictError::NotFound);
        assert_eq!(report::take_last_error().unwrap().operation, Operation::GetItem);

        assert_eq!(d.remove("nope").unwrap_err(), DictError::NotFound);
        let rec = report::take_last_error().unwrap();
        assert_eq!(rec.operation, Operation::RemoveItem);
        assert_eq!(rec.kind, ErrorKind::NotFound);
    }

    /// Invariant: key identity is kind + exact bytes; embedded NULs count.
    #[test]
    fn key_identity() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 1).unwrap();
        d.add_item(&b"a\0b"[..], Value::copy(b"1").unwrap()).unwrap();
        d.add_item(&b"a\0c"[..], Value::copy(b"2").unwrap()).unwrap();
        d.add_item(&b"a"[..], Value::copy(b"3").unwrap()).unwrap();
        d.add_item("a", Value::copy(b"4").unwrap()).unwrap();
        d.add_item(&7u32, Value::copy(b"5").unwrap()).unwrap();
        d.add_item(&7i32, Value::copy(b"6").unwrap()).unwrap();
        assert_eq!(d.len(), 6);
        assert_eq!(d.get(&b"a\0b"[..]).unwrap(), b"1");
        assert_eq!(d.get(&b"a"[..]).unwrap(), b"3");
        assert_eq!(d.get("a").unwrap(), b"4");
        assert_eq!(d.get(&7u32).unwrap(), b"5");
        assert_eq!(d.get(&7i32).unwrap(), b"6");
        assert!(!d.contains(&7u64));
    }

    #[test]
    fn empty_key_is_a_key() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 3).unwrap();
        d.add_item("", Value::copy(b"empty").unwrap()).unwrap();
        assert_eq!(d.get("").unwrap(), b"empty");
        assert_eq!(d.chain_len(0), 1, "empty key hashes to bucket 0");
    }

    #[test]
    fn zero_buckets_is_invalid_and_does_not_attach() {
        let c = ctx();
        let err = Dict::with_context(&c, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(c.live_count(), 0);
        assert_eq!(
            report::take_last_error().unwrap().operation,
            Operation::CreateDict
        );
    }

    #[test]
    fn drop_releases_registration() {
        let c = ctx();
        {
            let _a = Dict::with_context(&c, 1).unwrap();
            let b = Dict::with_config(&c, &DictConfig::default()).unwrap();
            assert_eq!(c.live_count(), 2);
            assert_eq!(b.bucket_count(), 64);
        }
        assert_eq!(c.live_count(), 0);
        assert!(!c.has_table());
    }

    #[test]
    fn copy_keeps_chain_layout() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 3).unwrap();
        for i in 0..20u8 {
            d.add_item(&[i, i], Value::copy(&[i]).unwrap()).unwrap();
        }
        let copy = d.try_clone().unwrap();
        assert!(copy.context().same_context(&c));
        assert_eq!(c.live_count(), 2);
        for b in 0..3 {
            assert_eq!(copy.chain_len(b), d.chain_len(b));
        }
        let orig: Vec<_> = d.keys().collect();
        let copied: Vec<_> = copy.keys().collect();
        assert_eq!(orig, copied);
    }

    #[test]
    fn debug_lists_entries() {
        let c = ctx();
        let mut d = Dict::with_context(&c, 1).unwrap();
        d.add_item("k", Value::copy(b"v").unwrap()).unwrap();
        let s = format!("{d:?}");
        assert!(s.contains("Owned"), "{s}");
    }
}
