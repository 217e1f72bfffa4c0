use chained_dict::{Dict, HashContext, TableConfig, Value, ValueMode};
use proptest::prelude::*;
use std::collections::BTreeSet;

// After inserting a set of distinct keys and removing a subset of them, the
// length is the size of the difference, whatever the bucket count.
proptest! {
    #[test]
    fn prop_len_after_inserts_and_removes(
        keys in proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 0..8), 0..64),
        remove_mask in proptest::collection::vec(any::<bool>(), 64),
        buckets in 1usize..32,
        depth in 1u32..4,
    ) {
        let ctx = HashContext::new(TableConfig { depth, seed: 9 });
        let mut d = Dict::with_context(&ctx, buckets).unwrap();
        for (i, k) in keys.iter().enumerate() {
            d.add_item(k, Value::copy(&(i as u32).to_le_bytes()).unwrap()).unwrap();
        }
        prop_assert_eq!(d.len(), keys.len());

        let removed: BTreeSet<_> = keys
            .iter()
            .zip(&remove_mask)
            .filter(|(_, m)| **m)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &removed {
            prop_assert!(d.remove(k).is_ok());
            prop_assert!(d.remove(k).is_err());
        }
        prop_assert_eq!(d.len(), keys.len() - removed.len());
        for k in &keys {
            prop_assert_eq!(d.contains(k), !removed.contains(k));
        }
        let per_bucket: usize = (0..d.bucket_count()).map(|b| d.chain_len(b)).sum();
        prop_assert_eq!(per_bucket, d.len());
    }
}

// A copy holds equal keys and value bytes, is independent of later edits
// to its source, and shares Pointer values with it.
proptest! {
    #[test]
    fn prop_copy_matches_and_is_independent(
        entries in proptest::collection::btree_map("[a-z]{1,6}", (proptest::collection::vec(any::<u8>(), 0..8), any::<bool>()), 1..32),
    ) {
        let ctx = HashContext::new(TableConfig::default());
        let mut d = Dict::with_context(&ctx, 5).unwrap();
        for (k, (v, by_ref)) in &entries {
            let value = if *by_ref { Value::pointer(v) } else { Value::insert(v.clone()) };
            d.add_item(k, value).unwrap();
        }
        let copy = d.try_clone().unwrap();
        prop_assert_eq!(copy.len(), d.len());
        for (k, (v, by_ref)) in &entries {
            prop_assert_eq!(copy.get(k).unwrap(), &v[..]);
            let expected = if *by_ref { ValueMode::Pointer } else { ValueMode::Copy };
            prop_assert_eq!(copy.mode(k).unwrap(), expected);
            if *by_ref {
                prop_assert!(std::ptr::eq(copy.get(k).unwrap(), &v[..]));
            }
        }

        let first = entries.keys().next().unwrap();
        d.remove(first).unwrap();
        drop(d);
        prop_assert!(copy.contains(first));
        prop_assert_eq!(copy.len(), entries.len());
        prop_assert_eq!(ctx.live_count(), 1);
    }
}
