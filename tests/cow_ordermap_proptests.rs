// CowOrderMap property tests (consolidated).
//
// Property 1: state-machine equivalence against an ordered Vec model.
//  - Model: Vec<(key, value)> in touch order; insert semantics replayed
//    on the model (move-to-back keeps the first-inserted value).
//  - Operations: insert, erase, at_mut, or_default, clear, snapshot
//    (clone), merge of the snapshot back into the map.
//  - Invariants after each step: iteration order and pairs equal the
//    model; len/is_empty/contains/at parity over the whole key domain;
//    the snapshot still matches the model state it was taken from (copy
//    independence under later mutation of the source).
//
// Property 2: the merge law. B.merge(A) must equal iterating A in order
// and calling B.insert(k, v) for each pair.

use cow_ordermap::{CowOrderMap, LookupError};
use proptest::prelude::*;

const KEYS: u8 = 8;

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, i32),
    Erase(u8),
    AtMut(u8, i32),
    OrDefault(u8, i32),
    Clear,
    Snapshot,
    MergeSnapshot,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let key = 0u8..KEYS;
    let op = prop_oneof![
        6 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => key.clone().prop_map(Op::Erase),
        3 => (key.clone(), any::<i32>()).prop_map(|(k, d)| Op::AtMut(k, d)),
        2 => (key.clone(), any::<i32>()).prop_map(|(k, d)| Op::OrDefault(k, d)),
        1 => Just(Op::Clear),
        2 => Just(Op::Snapshot),
        2 => Just(Op::MergeSnapshot),
    ];
    proptest::collection::vec(op, 1..80)
}

fn pairs(m: &CowOrderMap<u8, i32>) -> Vec<(u8, i32)> {
    m.iter().map(|(k, v)| (*k, *v)).collect()
}

// Insert semantics on the model: touch keeps the first-inserted value.
fn model_insert(model: &mut Vec<(u8, i32)>, k: u8, v: i32) -> bool {
    if let Some(i) = model.iter().position(|(mk, _)| *mk == k) {
        let pair = model.remove(i);
        model.push(pair);
        false
    } else {
        model.push((k, v));
        true
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in arb_ops()) {
        let mut sut: CowOrderMap<u8, i32> = CowOrderMap::new();
        let mut model: Vec<(u8, i32)> = Vec::new();
        let mut snap: Option<(CowOrderMap<u8, i32>, Vec<(u8, i32)>)> = None;

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let expect = model_insert(&mut model, k, v);
                    prop_assert_eq!(sut.insert(k, v), expect);
                }
                Op::Erase(k) => {
                    let present = model.iter().any(|(mk, _)| *mk == k);
                    let res = sut.erase(&k);
                    prop_assert_eq!(res.is_ok(), present);
                    if present {
                        let i = model.iter().position(|(mk, _)| *mk == k).expect("in model");
                        model.remove(i);
                    } else {
                        prop_assert_eq!(res, Err(LookupError));
                    }
                }
                Op::AtMut(k, d) => {
                    match sut.at_mut(&k) {
                        Ok(vr) => {
                            *vr = vr.saturating_add(d);
                            let (_mk, mv) = model
                                .iter_mut()
                                .find(|(mk, _)| *mk == k)
                                .expect("present in model");
                            *mv = mv.saturating_add(d);
                        }
                        Err(LookupError) => {
                            prop_assert!(!model.iter().any(|(mk, _)| *mk == k));
                        }
                    }
                }
                Op::OrDefault(k, d) => {
                    if !model.iter().any(|(mk, _)| *mk == k) {
                        model.push((k, 0));
                    }
                    let vr = sut.or_default(k);
                    *vr = vr.saturating_add(d);
                    let (_mk, mv) = model
                        .iter_mut()
                        .find(|(mk, _)| *mk == k)
                        .expect("present in model");
                    *mv = mv.saturating_add(d);
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
                Op::Snapshot => {
                    snap = Some((sut.clone(), model.clone()));
                }
                Op::MergeSnapshot => {
                    if let Some((sm, smodel)) = &snap {
                        sut.merge(sm);
                        for (k, v) in smodel {
                            model_insert(&mut model, *k, *v);
                        }
                    }
                }
            }

            // Post-conditions after each op.
            prop_assert_eq!(pairs(&sut), model.clone());
            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            for k in 0..KEYS {
                let mv = model.iter().find(|(mk, _)| *mk == k).map(|(_, v)| *v);
                prop_assert_eq!(sut.contains(&k), mv.is_some());
                prop_assert_eq!(sut.get(&k).copied(), mv);
                prop_assert_eq!(sut.at(&k).ok().copied(), mv);
            }
            // Copy independence: the snapshot still matches the state it
            // was taken from, no matter what happened to `sut` since.
            if let Some((sm, smodel)) = &snap {
                prop_assert_eq!(pairs(sm), smodel.clone());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_merge_equals_insert_replay(
        a_pairs in proptest::collection::vec((0u8..KEYS, any::<i32>()), 0..24),
        b_pairs in proptest::collection::vec((0u8..KEYS, any::<i32>()), 0..24),
    ) {
        let a: CowOrderMap<u8, i32> = a_pairs.iter().copied().collect();
        let b: CowOrderMap<u8, i32> = b_pairs.iter().copied().collect();

        let mut merged = b.clone();
        merged.merge(&a);

        let mut replayed = b.clone();
        for (k, v) in a.iter() {
            replayed.insert(*k, *v);
        }

        prop_assert_eq!(&merged, &replayed);
        // The source of a merge is never modified.
        prop_assert_eq!(pairs(&a), a_pairs_in_touch_order(&a_pairs));
    }
}

// Reference computation of touch order for a raw pair list.
fn a_pairs_in_touch_order(raw: &[(u8, i32)]) -> Vec<(u8, i32)> {
    let mut model = Vec::new();
    for (k, v) in raw {
        model_insert(&mut model, *k, *v);
    }
    model
}
