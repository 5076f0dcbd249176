use super::{AvlTree, Ptr};

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;
use std::fmt;

/// Walk the whole tree and check ordering, balance, cached heights and that
/// every arena slot is linked exactly once.
fn validate_tree<K: Ord + Clone + fmt::Debug, V>(t: &AvlTree<K, V>) {
    let mut linked = vec![false; t.nodes.len()];

    // (node, exclusive lower bound, exclusive upper bound)
    let mut stack: Vec<(Ptr, Option<K>, Option<K>)> = Vec::new();
    if !t.root.is_null() {
        stack.push((t.root, None, None));
    }

    let mut reached = 0usize;
    while let Some((ptr, lo, hi)) = stack.pop() {
        assert!(!ptr.is_null(), "NULL pointer inside tree");
        assert!(ptr.idx() < t.nodes.len(), "slot {} out of range", ptr.0);
        assert!(!linked[ptr.idx()], "slot {} linked twice", ptr.0);
        linked[ptr.idx()] = true;
        reached += 1;

        let node = &t.nodes[ptr.idx()];
        if let Some(lo) = &lo {
            assert!(*lo < node.key, "{:?} not above {:?}", node.key, lo);
        }
        if let Some(hi) = &hi {
            assert!(node.key < *hi, "{:?} not below {:?}", node.key, hi);
        }

        let lh = t.height_of(node.left);
        let rh = t.height_of(node.right);
        assert_eq!(
            node.height,
            1 + lh.max(rh),
            "stored height must match children at {:?}",
            node.key
        );
        assert!(
            (i32::from(lh) - i32::from(rh)).abs() <= 1,
            "unbalanced at {:?}: left {lh}, right {rh}",
            node.key
        );

        if !node.left.is_null() {
            stack.push((node.left, lo.clone(), Some(node.key.clone())));
        }
        if !node.right.is_null() {
            stack.push((node.right, Some(node.key.clone()), hi));
        }
    }

    assert_eq!(reached, t.len(), "reachable node count must match len");
}

fn avl_height_bound(n: usize) -> usize {
    (1.44 * ((n + 2) as f64).log2()).ceil() as usize
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    Insert(u16, u32),
    Bump(u16, u32),
    Get(u16),
    Contains(u16),
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=1000)) {
        let mut t: AvlTree<u16, u32> = AvlTree::new();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let fresh = !m.contains_key(&key);
                    m.entry(key).or_insert(value);
                    prop_assert_eq!(t.insert(key, value), fresh);
                }
                Op::Bump(key, delta) => {
                    let v = t.get_or_insert_default(key);
                    *v = v.wrapping_add(delta);
                    let e = m.entry(key).or_default();
                    *e = e.wrapping_add(delta);
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                }
                Op::Contains(key) => {
                    prop_assert_eq!(t.contains_key(&key), m.contains_key(&key));
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(u16, u32)> = t.in_order().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_invariants_hold_after_every_insert(keys in prop::collection::vec(any::<i32>(), 0..=300)) {
        let mut t: AvlTree<i32, ()> = AvlTree::new();
        for key in keys {
            t.insert(key, ());
            validate_tree(&t);
            prop_assert!(t.height() <= avl_height_bound(t.len()));
        }
    }

    #[test]
    fn prop_in_order_is_strictly_ascending(keys in prop::collection::vec(any::<i64>(), 0..=500)) {
        let mut t: AvlTree<i64, usize> = AvlTree::new();
        for (i, key) in keys.into_iter().enumerate() {
            t.insert(key, i);
        }
        let got: Vec<i64> = t.in_order().map(|(k, _)| *k).collect();
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(got.len(), t.len());
    }

    #[test]
    fn prop_duplicate_insert_is_noop(
        keys in prop::collection::vec(0u16..512, 1..=200),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut t: AvlTree<u16, u32> = AvlTree::new();
        for &key in &keys {
            t.insert(key, u32::from(key));
        }
        let key = keys[pick.index(keys.len())];
        let before = t.bfs_dump();
        let len = t.len();

        prop_assert!(!t.insert(key, u32::MAX));
        prop_assert_eq!(t.get(&key), Some(&u32::from(key)));
        prop_assert_eq!(t.bfs_dump(), before.clone());
        prop_assert_eq!(t.len(), len);

        // The accessor fetches without reshaping either.
        *t.get_or_insert_default(key) += 1;
        prop_assert_eq!(t.get(&key), Some(&(u32::from(key) + 1)));
        prop_assert_eq!(t.bfs_dump(), before);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<i32> = (1..=7).collect();

    for_each_permutation(&keys, |perm| {
        let mut t: AvlTree<i32, i32> = AvlTree::new();
        for &k in &perm {
            assert!(t.insert(k, -k));
            validate_tree(&t);
        }
        assert!(t.height() <= avl_height_bound(t.len()), "order {perm:?}");
        let got: Vec<(i32, i32)> = t.in_order().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(i32, i32)> = keys.iter().map(|&k| (k, -k)).collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_accessor_order_small_set() {
    let keys: Vec<i32> = (1..=6).collect();

    for_each_permutation(&keys, |perm| {
        let mut by_insert: AvlTree<i32, i32> = AvlTree::new();
        let mut by_accessor: AvlTree<i32, i32> = AvlTree::new();
        for &k in &perm {
            by_insert.insert(k, k);
            *by_accessor.get_or_insert_default(k) = k;
        }
        validate_tree(&by_accessor);
        assert_eq!(by_accessor.bfs_dump(), by_insert.bfs_dump(), "order {perm:?}");
        assert_eq!(format!("{by_accessor:?}"), format!("{by_insert:?}"));
    });
}
