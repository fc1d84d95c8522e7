#![cfg(test)]

// Property tests for ChainMap kept inside the crate so they can check
// internal invariants (capacity, load factor) alongside the public API.

use crate::chain_map::ChainMap;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Find(usize),
    Mutate(usize, i32),
    Contains(String),
    Iterate,
    Walk,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Find),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            Just(OpI::Iterate),
            Just(OpI::Walk),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn check_structural_invariants(sut: &ChainMap<String, i32>) {
    // Load factor bound holds after every operation, not just inserts.
    let lf = sut.len() as f64 / sut.capacity() as f64;
    assert!(lf <= 0.4, "load factor exceeds threshold");

    // Enumeration terminates (acyclic chains), covers exactly len()
    // entries, and never repeats a key.
    let mut seen = std::collections::BTreeSet::new();
    let mut steps = 0usize;
    let mut c = sut.begin();
    while !c.is_end() {
        assert!(steps <= sut.len(), "traversal exceeded entry count");
        assert!(seen.insert(c.key(sut).unwrap().clone()), "duplicate key");
        steps += 1;
        c.advance(sut);
    }
    assert_eq!(steps, sut.len());
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert reports update-vs-add in agreement with the model and preserves
//   last-write-wins values.
// - find/contains/get parity with the model for present and absent keys.
// - get_mut updates are observed by later reads.
// - Cursor walks and `iter` agree and cover every live entry exactly once.
// - The load factor bound and chain acyclicity hold after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut: ChainMap<String, i32> = ChainMap::with_capacity(3);
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                OpI::Insert(i, v) => {
                    let key = pool[i].clone();
                    let expected_update = model.contains_key(&key);
                    let (cursor, updated) = sut.insert(key.clone(), v);
                    model.insert(key.clone(), v);
                    prop_assert_eq!(updated, expected_update);
                    prop_assert_eq!(cursor.value(&sut), Some(&v));
                    prop_assert_eq!(cursor.key(&sut), Some(&key));
                }
                OpI::Find(i) => {
                    let key = &pool[i];
                    let cursor = sut.find(key.as_str());
                    match model.get(key) {
                        Some(v) => {
                            prop_assert_eq!(cursor.value(&sut), Some(v));
                            prop_assert_eq!(sut.get(key.as_str()), Some(v));
                        }
                        None => {
                            prop_assert!(cursor.is_end());
                            prop_assert_eq!(sut.get(key.as_str()), None);
                        }
                    }
                }
                OpI::Mutate(i, d) => {
                    let key = &pool[i];
                    match (sut.get_mut(key.as_str()), model.get_mut(key)) {
                        (Some(sv), Some(mv)) => {
                            *sv = sv.wrapping_add(d);
                            *mv = mv.wrapping_add(d);
                        }
                        (None, None) => {}
                        _ => prop_assert!(false, "get_mut presence mismatch"),
                    }
                }
                OpI::Contains(key) => {
                    prop_assert_eq!(sut.contains_key(key.as_str()), model.contains_key(&key));
                }
                OpI::Iterate => {
                    let seen: BTreeMap<String, i32> =
                        sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    let expected: BTreeMap<String, i32> =
                        model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(seen, expected);
                }
                OpI::Walk => {
                    let mut count = 0usize;
                    let mut c = sut.begin();
                    while !c.is_end() {
                        let k = c.key(&sut).unwrap();
                        prop_assert_eq!(c.value(&sut), model.get(k));
                        count += 1;
                        c.advance(&sut);
                    }
                    prop_assert_eq!(count, model.len());
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            check_structural_invariants(&sut);
        }
    }
}

// Property: growth policy. Starting from any small capacity, a run of
// distinct-key inserts keeps the load factor at or below 0.4 after every
// insert, and capacity only ever moves to len*3+5 when it moves at all.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_growth_policy(initial in 1usize..64, n in 1usize..200) {
        let mut sut: ChainMap<u64, u64> = ChainMap::with_capacity(initial);
        let mut capacity = sut.capacity();
        for i in 0..n as u64 {
            sut.insert(i, i);
            let new_capacity = sut.capacity();
            if new_capacity != capacity {
                prop_assert_eq!(new_capacity, sut.len() * 3 + 5);
                capacity = new_capacity;
            }
            prop_assert!(sut.len() as f64 / new_capacity as f64 <= 0.4);
        }
        for i in 0..n as u64 {
            prop_assert_eq!(sut.get(&i), Some(&i));
        }
    }
}
