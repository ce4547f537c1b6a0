//! Exact lookup and top-k prefix queries.

use std::cmp::Ordering;

use crate::arena::{common_prefix_from, find_branch, NodeId, Peer, Rank};
use crate::depq::BoundedDepq;
use crate::PruningRadixTrie;

/// Where an exact match lives.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Located {
    pub(crate) node: NodeId,
    /// Owner of the peer list holding `node`, at `index`.
    pub(crate) owner: NodeId,
    pub(crate) index: usize,
    /// LCP tag of `node` in that list.
    pub(crate) branch_lcp: usize,
}

/// A position in a peer list, ordered by the rank of the node it points at.
#[derive(Clone, Copy)]
struct Cursor<'a> {
    peers: &'a [Peer],
    index: usize,
    rank: Rank<'a>,
}

impl Cursor<'_> {
    #[inline]
    fn node(&self) -> NodeId {
        self.peers[self.index].node
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl Eq for Cursor<'_> {}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank)
    }
}

impl PruningRadixTrie {
    /// Score of `term`, or 0 when it is absent (or empty).
    ///
    /// A stored score of 0 is indistinguishable from absence here; use
    /// [`PruningRadixTrie::contains`] to tell them apart.
    pub fn get_score(&self, term: &str) -> i64 {
        if term.is_empty() {
            return 0;
        }
        self.locate(term).map_or(0, |found| self.nodes.score(found.node))
    }

    /// Whether `term` is stored.
    pub fn contains(&self, term: &str) -> bool {
        !term.is_empty() && self.locate(term).is_some()
    }

    /// Up to `k` terms starting with `prefix`, highest score first (ties by term).
    ///
    /// An empty prefix matches every term.
    pub fn top_k(&self, prefix: &str, k: usize) -> Vec<(&str, i64)> {
        let mut results = Vec::with_capacity(k.min(self.count));
        if k == 0 {
            return results;
        }
        let p = prefix.as_bytes();
        let Some(locus) = self.find_locus(p) else {
            return results;
        };
        results.push(self.entry(locus));
        if k == 1 {
            return results;
        }

        // Below the locus only peers branching at or after the prefix still match it. Every
        // node reached from there on matches, and so do all of its peers.
        let branches = self.nodes.peers(locus);
        let Some(first) = next_match(branches, 0, p.len()) else {
            return results;
        };
        let mut current = self.cursor(branches, first);
        results.push(self.entry(current.node()));

        let mut remaining = k - 2;
        let mut queue = BoundedDepq::with_capacity(remaining, remaining / 2 + 1);
        while remaining > 0 {
            // Candidates: the best peer of the node just emitted, and the next matching entry
            // after it in its own list.
            let below = self.nodes.peers(current.node());
            if !below.is_empty() {
                queue.push(self.cursor(below, 0));
            }
            if let Some(next) = next_match(current.peers, current.index + 1, p.len()) {
                queue.push(self.cursor(current.peers, next));
            }

            let Some(best) = queue.pop_max() else {
                break;
            };
            results.push(self.entry(best.node()));
            current = best;
            remaining -= 1;
            queue.set_bound(remaining);
        }
        results
    }

    /// [`PruningRadixTrie::top_k`] together with the exact score of `prefix` itself (0 when
    /// the prefix is not a stored term).
    pub fn top_k_with_prefix_score(&self, prefix: &str, k: usize) -> (Vec<(&str, i64)>, i64) {
        (self.top_k(prefix, k), self.get_score(prefix))
    }

    /// Find the node holding exactly `term`.
    pub(crate) fn locate(&self, term: &str) -> Option<Located> {
        let t = term.as_bytes();
        let mut found = Located {
            node: self.nodes.root()?,
            owner: NodeId::ROOT_SLOT,
            index: 0,
            branch_lcp: 0,
        };
        let mut lcp = 0;
        loop {
            found.branch_lcp = lcp;
            let key = self.nodes.key(found.node).as_bytes();
            lcp = common_prefix_from(t, key, lcp);
            if lcp == t.len() && lcp == key.len() {
                return Some(found);
            }
            let index = find_branch(self.nodes.peers(found.node), lcp)?;
            found.owner = found.node;
            found.index = index;
            found.node = self.nodes.peers(found.owner)[index].node;
        }
    }

    /// The highest-ranked node whose key starts with `prefix`.
    fn find_locus(&self, prefix: &[u8]) -> Option<NodeId> {
        let mut node = self.nodes.root()?;
        let mut lcp = 0;
        loop {
            lcp = common_prefix_from(prefix, self.nodes.key(node).as_bytes(), lcp);
            if lcp == prefix.len() {
                return Some(node);
            }
            let index = find_branch(self.nodes.peers(node), lcp)?;
            node = self.nodes.peers(node)[index].node;
        }
    }

    #[inline]
    fn cursor<'a>(&'a self, peers: &'a [Peer], index: usize) -> Cursor<'a> {
        Cursor {
            peers,
            index,
            rank: self.nodes.rank(peers[index].node),
        }
    }
}

/// Index of the first peer at or after `from` branching at `min_lcp` or deeper.
#[inline]
fn next_match(peers: &[Peer], from: usize, min_lcp: usize) -> Option<usize> {
    peers
        .iter()
        .skip(from)
        .position(|p| p.lcp() >= min_lcp)
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PruningRadixTrie {
        [
            ("tennis academy", 9001),
            ("tennis championships", 63),
            ("tennis championships 2020", 50),
            ("table tennis", 700),
            ("tent", 12),
            ("ten", 0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_locate_reports_slot() {
        let t = sample();
        let root = t.locate("tennis academy").unwrap();
        assert_eq!(root.owner, NodeId::ROOT_SLOT);
        assert_eq!(root.index, 0);
        assert_eq!(root.branch_lcp, 0);

        let found = t.locate("tennis championships 2020").unwrap();
        assert_eq!(t.nodes.key(found.node), "tennis championships 2020");
        let owner_peers = t.nodes.peers(found.owner);
        assert_eq!(owner_peers[found.index].node, found.node);
        assert_eq!(owner_peers[found.index].lcp(), found.branch_lcp);

        assert!(t.locate("tennis").is_none());
        assert!(t.locate("tennis academy!").is_none());
    }

    #[test]
    fn test_zero_score_vs_absent() {
        let t = sample();
        assert_eq!(t.get_score("ten"), 0);
        assert!(t.contains("ten"));
        assert_eq!(t.get_score("te"), 0);
        assert!(!t.contains("te"));
        assert!(!t.contains(""));
    }

    #[test]
    fn test_find_locus() {
        let t = sample();
        let locus = |p: &str| t.find_locus(p.as_bytes()).map(|id| t.nodes.key(id));
        assert_eq!(locus(""), Some("tennis academy"));
        assert_eq!(locus("t"), Some("tennis academy"));
        assert_eq!(locus("ta"), Some("table tennis"));
        assert_eq!(locus("tennis c"), Some("tennis championships"));
        assert_eq!(locus("tent"), Some("tent"));
        assert_eq!(locus("tents"), None);
        assert_eq!(locus("x"), None);
    }

    #[test]
    fn test_top_k_skips_shallow_siblings_of_locus() {
        let t = sample();
        assert_eq!(
            t.top_k("ten", 10),
            vec![
                ("tennis academy", 9001),
                ("tennis championships", 63),
                ("tennis championships 2020", 50),
                ("tent", 12),
                ("ten", 0),
            ]
        );
        assert_eq!(t.top_k("t", 2), vec![("tennis academy", 9001), ("table tennis", 700)]);
        assert_eq!(t.top_k("tennis ", 1), vec![("tennis academy", 9001)]);
    }

    #[test]
    fn test_next_match() {
        let peers = [
            Peer::new(NodeId::ROOT_SLOT, 1),
            Peer::new(NodeId::ROOT_SLOT, 4),
            Peer::new(NodeId::ROOT_SLOT, 2),
            Peer::new(NodeId::ROOT_SLOT, 5),
        ];
        assert_eq!(next_match(&peers, 0, 2), Some(1));
        assert_eq!(next_match(&peers, 2, 3), Some(3));
        assert_eq!(next_match(&peers, 4, 0), None);
        assert_eq!(next_match(&peers, 0, 6), None);
    }
}
