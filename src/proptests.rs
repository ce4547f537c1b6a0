use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn validate_trie(t: &PruningRadixTrie) {
    if let Err(violation) = t.check_invariants() {
        panic!("{violation}\n{t:?}");
    }
}

/// The answer `top_k` must give, computed from the oracle.
fn expected_top_k(m: &BTreeMap<String, i64>, prefix: &str, k: usize) -> Vec<(String, i64)> {
    let mut matching: Vec<(String, i64)> = m
        .iter()
        .filter(|(term, _)| term.starts_with(prefix))
        .map(|(term, score)| (term.clone(), *score))
        .collect();
    matching.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    matching.truncate(k);
    matching
}

fn owned(v: Vec<(&str, i64)>) -> Vec<(String, i64)> {
    v.into_iter().map(|(t, s)| (t.to_owned(), s)).collect()
}

#[derive(Clone, Debug, Arbitrary)]
struct Query {
    #[proptest(strategy = "prefix_strategy()")]
    prefix: String,
    #[proptest(strategy = "0usize..24")]
    k: usize,
}

#[derive(Clone, Debug)]
enum Op {
    Set(String, i64),
    AddToScore(String, i64),
    Delete(String),
    GetScore(String),
    TopK(Query),
}

fn term_strategy() -> impl Strategy<Value = String> + Clone {
    // A tiny alphabet makes shared prefixes, prefix-of-prefix chains and repeats common.
    "[abc]{0,6}"
}

fn prefix_strategy() -> impl Strategy<Value = String> {
    "[abc]{0,3}"
}

fn score_strategy() -> impl Strategy<Value = i64> + Clone {
    // Narrow range so equal scores (and tie-breaking) show up often.
    -8i64..24
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let term = term_strategy();
    let score = score_strategy();
    let op = prop_oneof![
        40 => (term.clone(), score.clone()).prop_map(|(t, s)| Op::Set(t, s)),
        10 => (term.clone(), score).prop_map(|(t, s)| Op::AddToScore(t, s)),
        25 => term.clone().prop_map(Op::Delete),
        10 => term.prop_map(Op::GetScore),
        15 => any::<Query>().prop_map(Op::TopK),
    ];
    prop::collection::vec(op, 0..=600)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t = PruningRadixTrie::new();
        let mut m: BTreeMap<String, i64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Set(term, score) => {
                    t.set(&term, score);
                    if !term.is_empty() {
                        m.insert(term, score);
                    }
                }
                Op::AddToScore(term, delta) => {
                    t.add_to_score(&term, delta);
                    if !term.is_empty() {
                        *m.entry(term).or_default() += delta;
                    }
                }
                Op::Delete(term) => {
                    prop_assert_eq!(t.delete(&term), m.remove(&term).is_some());
                }
                Op::GetScore(term) => {
                    prop_assert_eq!(t.get_score(&term), m.get(&term).copied().unwrap_or(0));
                    prop_assert_eq!(t.contains(&term), m.contains_key(&term));
                }
                Op::TopK(Query { prefix, k }) => {
                    let got = owned(t.top_k(&prefix, k));
                    prop_assert_eq!(got, expected_top_k(&m, &prefix, k));
                }
            }

            prop_assert_eq!(t.len(), m.len());
            validate_trie(&t);
        }

        let got = owned(t.all_terms_sorted());
        prop_assert_eq!(got, expected_top_k(&m, "", usize::MAX));
    }

    #[test]
    fn prop_bulk_load_matches_incremental(
        terms in prop::collection::vec((term_strategy(), score_strategy()), 0..=300),
        queries in prop::collection::vec(any::<Query>(), 1..=20),
    ) {
        let mut bulk = PruningRadixTrie::new();
        bulk.add_terms(terms.clone());
        validate_trie(&bulk);

        let mut merged: BTreeMap<String, i64> = BTreeMap::new();
        for (term, score) in terms.into_iter().filter(|(t, _)| !t.is_empty()) {
            *merged.entry(term).or_default() += score;
        }
        let mut incremental = PruningRadixTrie::new();
        for (term, score) in &merged {
            incremental.set(term, *score);
        }

        prop_assert_eq!(bulk.len(), merged.len());
        prop_assert_eq!(bulk.all_terms_sorted(), incremental.all_terms_sorted());
        for Query { prefix, k } in queries {
            prop_assert_eq!(bulk.top_k(&prefix, k), incremental.top_k(&prefix, k));
        }
    }

    #[test]
    fn prop_delete_is_idempotent(
        entries in prop::collection::vec((term_strategy(), score_strategy()), 1..=200),
        victim in term_strategy(),
    ) {
        let mut t = PruningRadixTrie::new();
        for (term, score) in &entries {
            t.set(term, *score);
        }
        let present = t.contains(&victim);
        let before = t.len();

        prop_assert_eq!(t.delete(&victim), present);
        prop_assert!(!t.delete(&victim));
        prop_assert_eq!(t.len(), before - usize::from(present));
        prop_assert_eq!(t.get_score(&victim), 0);
        validate_trie(&t);
    }

    #[test]
    fn prop_top_k_prefix_of_larger_k(
        entries in prop::collection::vec((term_strategy(), score_strategy()), 0..=200),
        query in any::<Query>(),
    ) {
        let t: PruningRadixTrie = entries.into_iter().collect();
        let small = t.top_k(&query.prefix, query.k);
        let large = t.top_k(&query.prefix, query.k + 7);
        prop_assert!(small.len() <= query.k);
        prop_assert_eq!(&small[..], &large[..small.len()]);
        prop_assert!(small.iter().all(|(term, _)| term.starts_with(query.prefix.as_str())));
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

const SMALL_SET: [(&str, i64); 6] = [
    ("a", 3),
    ("ab", 5),
    ("abc", 5),
    ("abd", 1),
    ("b", 4),
    ("ba", 6),
];

#[test]
fn exhaustive_insert_order_small_set() {
    let m: BTreeMap<String, i64> = SMALL_SET.iter().map(|&(t, s)| (t.to_owned(), s)).collect();
    let expected = expected_top_k(&m, "", usize::MAX);

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t = PruningRadixTrie::new();
        for (term, score) in perm {
            t.set(term, score);
        }
        validate_trie(&t);
        assert_eq!(owned(t.all_terms_sorted()), expected);
        for prefix in ["", "a", "ab", "abc", "b", "c"] {
            for k in 0..=7 {
                assert_eq!(owned(t.top_k(prefix, k)), expected_top_k(&m, prefix, k));
            }
        }
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    // Insert in a fixed order, then remove in all permutations.
    let mut base_trie = PruningRadixTrie::new();
    let mut base_map: BTreeMap<String, i64> = BTreeMap::new();
    for &(term, score) in &SMALL_SET {
        base_trie.set(term, score);
        base_map.insert(term.to_owned(), score);
    }

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t = base_trie.clone();
        let mut m = base_map.clone();

        for (term, _) in perm {
            assert_eq!(t.delete(term), m.remove(term).is_some());
            assert_eq!(t.len(), m.len());
            validate_trie(&t);
            assert_eq!(owned(t.top_k("a", 4)), expected_top_k(&m, "a", 4));
        }
        assert!(t.is_empty());
        assert_eq!(t.nodes.root(), None);
    });
}

#[test]
fn exhaustive_rescore_order_small_set() {
    // Every permutation of a sequence of score changes on overlapping terms.
    let updates = [("ab", 9), ("a", 7), ("abc", 0), ("ba", 2), ("b", 8)];
    for_each_permutation(&updates, |perm| {
        let mut t: PruningRadixTrie = SMALL_SET.iter().copied().collect();
        let mut m: BTreeMap<String, i64> = SMALL_SET.iter().map(|&(t, s)| (t.to_owned(), s)).collect();
        for (term, score) in perm {
            t.set(term, score);
            m.insert(term.to_owned(), score);
            validate_trie(&t);
        }
        assert_eq!(owned(t.all_terms_sorted()), expected_top_k(&m, "", usize::MAX));
    });
}
