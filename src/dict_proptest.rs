#![cfg(test)]

// Property tests for Dict kept inside the crate so they can reach the
// chain layer and a private context without feature gates.

use crate::config::TableConfig;
use crate::context::HashContext;
use crate::dict::Dict;
use crate::key::KeyKind;
use crate::value::{Leased, Value, ValueMode};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys/values, pool lengths shrink, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    AddCopy(usize, usize),
    AddPointer(usize, usize),
    AddInsert(usize, usize),
    Remove(usize),
    Get(usize),
    Contains(String),
    CopyDict,
    Iterate,
}

type Scenario = (Vec<String>, Vec<Vec<u8>>, Vec<OpI>);

fn arb_scenario() -> impl Strategy<Value = Scenario> {
    (
        proptest::collection::vec("[a-z]{0,5}", 1..=8),
        proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..6), 1..=4),
    )
        .prop_flat_map(|(keys, vals)| {
            let k = proptest::sample::select((0..keys.len()).collect::<Vec<_>>());
            let v = proptest::sample::select((0..vals.len()).collect::<Vec<_>>());
            let contains_pool = proptest::sample::select(keys.clone());
            let op = prop_oneof![
                (k.clone(), v.clone()).prop_map(|(i, j)| OpI::AddCopy(i, j)),
                (k.clone(), v.clone()).prop_map(|(i, j)| OpI::AddPointer(i, j)),
                (k.clone(), v.clone()).prop_map(|(i, j)| OpI::AddInsert(i, j)),
                k.clone().prop_map(OpI::Remove),
                k.clone().prop_map(OpI::Get),
                prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
                Just(OpI::CopyDict),
                Just(OpI::Iterate),
            ];
            proptest::collection::vec(op, 1..60)
                .prop_map(move |ops| (keys.clone(), vals.clone(), ops))
        })
}

// A leased copy of `bytes` whose release bumps `released`.
fn tracked(bytes: &[u8], released: &Arc<AtomicUsize>) -> Value<'static> {
    let buf: Box<[u8]> = bytes.into();
    let len = buf.len();
    let ptr = NonNull::from(Box::leak(buf)).cast::<u8>();
    let released = released.clone();
    let lease = unsafe {
        Leased::from_raw_parts(ptr, len, move |ptr, len| {
            drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                ptr.as_ptr(),
                len,
            )));
            released.fetch_add(1, Ordering::SeqCst);
        })
    };
    Value::Leased(lease)
}

fn run_state_machine(
    bucket_count: usize,
    (keys, vals, ops): Scenario,
) -> Result<(), TestCaseError> {
    let ctx = HashContext::new(TableConfig { depth: 2, seed: 17 });
    let released = Arc::new(AtomicUsize::new(0));
    let mut leased_total = 0usize;
    {
        let mut sut = Dict::with_context(&ctx, bucket_count).expect("create");
        // key -> (mode, value index)
        let mut model: HashMap<String, (ValueMode, usize)> = HashMap::new();

        for op in ops {
            match op {
                OpI::AddCopy(i, j) => {
                    sut.add_item(&keys[i], Value::copy(&vals[j]).unwrap()).unwrap();
                    model.insert(keys[i].clone(), (ValueMode::Copy, j));
                }
                OpI::AddPointer(i, j) => {
                    sut.add_item(&keys[i], Value::pointer(&vals[j])).unwrap();
                    model.insert(keys[i].clone(), (ValueMode::Pointer, j));
                }
                OpI::AddInsert(i, j) => {
                    sut.add_item(&keys[i], tracked(&vals[j], &released)).unwrap();
                    leased_total += 1;
                    model.insert(keys[i].clone(), (ValueMode::Insert, j));
                }
                OpI::Remove(i) => {
                    let expected = model.remove(&keys[i]).is_some();
                    prop_assert_eq!(sut.remove(&keys[i]).is_ok(), expected);
                }
                OpI::Get(i) => match model.get(&keys[i]) {
                    Some(&(mode, j)) => {
                        let v = sut.get_value(&keys[i]).expect("present");
                        prop_assert_eq!(v.mode(), mode);
                        prop_assert_eq!(v.as_bytes(), &vals[j][..]);
                        if mode == ValueMode::Pointer {
                            prop_assert!(std::ptr::eq(v.as_bytes(), &vals[j][..]));
                        }
                    }
                    None => prop_assert!(sut.get(&keys[i]).is_err()),
                },
                OpI::Contains(s) => {
                    prop_assert_eq!(sut.contains(&s), model.contains_key(&s));
                }
                OpI::CopyDict => {
                    let copy = sut.try_clone().expect("copy");
                    prop_assert_eq!(copy.len(), sut.len());
                    for (k, &(mode, j)) in &model {
                        let got = copy.get_value(k).expect("copied key");
                        prop_assert_eq!(got.as_bytes(), &vals[j][..]);
                        let expected_mode = match mode {
                            ValueMode::Pointer => ValueMode::Pointer,
                            _ => ValueMode::Copy,
                        };
                        prop_assert_eq!(got.mode(), expected_mode);
                    }
                    prop_assert_eq!(ctx.live_count(), 2);
                }
                OpI::Iterate => {
                    let s_keys: BTreeSet<_> = sut
                        .keys()
                        .map(|(kind, k)| {
                            assert_eq!(kind, KeyKind::Str);
                            String::from_utf8(k.to_vec()).unwrap()
                        })
                        .collect();
                    let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                    prop_assert_eq!(s_keys, m_keys);
                }
            }

            // Post-conditions after each op
            // 1) Size parity
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            // 2) Every leased value not currently stored has been released once
            let live_leased = model
                .values()
                .filter(|(m, _)| *m == ValueMode::Insert)
                .count();
            prop_assert_eq!(released.load(Ordering::SeqCst), leased_total - live_leased);
            // 3) Exactly one registration outside copy scopes
            prop_assert_eq!(ctx.live_count(), 1);
        }
    }
    prop_assert_eq!(released.load(Ordering::SeqCst), leased_total);
    prop_assert_eq!(ctx.live_count(), 0);
    prop_assert!(!ctx.has_table());
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Overwrites keep one entry per key and take the latest mode/value.
// - `get`/`contains` parity; Pointer values are the caller's slices.
// - Copies match content, share Pointer values, re-tag the rest as Copy.
// - Leased values are released exactly once: on overwrite, remove or drop.
// - `len`/`is_empty` parity; the context count returns to zero.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(scenario in arb_scenario()) {
        run_state_machine(16, scenario)?;
    }
}

// Property: Same invariants with a single bucket, so every key collides
// and all resolution happens by walking one chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_single_chain(scenario in arb_scenario()) {
        run_state_machine(1, scenario)?;
    }
}
