//! Insert, score update, delete and bulk load.
//!
//! Every operation restores the structural invariants before returning: peer lists in
//! descending rank order, one peer per LCP value in each list, every node outranking its
//! subtree, and every node sharing exactly its branch's LCP with each ancestor's key.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::arena::{common_prefix_from, find_branch, NodeId, Peer, Rank};
use crate::PruningRadixTrie;

/// A position in some owner's peer list, and the LCP the entry there branches at.
#[derive(Clone, Copy, Debug)]
struct Slot {
    owner: NodeId,
    index: usize,
    lcp: usize,
}

impl PruningRadixTrie {
    /// Inserts `term` with `score`, or replaces the score of an existing term.
    ///
    /// Empty terms are ignored. Terms longer than `u32::MAX` bytes are not supported.
    pub fn set(&mut self, term: &str, score: i64) {
        if term.is_empty() {
            return;
        }
        self.dirty = true;
        self.set_inner(term, score);
        self.after_mutation();
    }

    /// Adds `delta` to the score of `term`, inserting it with score `delta` if absent.
    /// The sum saturates at the `i64` bounds.
    pub fn add_to_score(&mut self, term: &str, delta: i64) {
        let current = self.get_score(term);
        self.set(term, current.saturating_add(delta));
    }

    /// Removes `term`. Returns whether it was present.
    pub fn delete(&mut self, term: &str) -> bool {
        if term.is_empty() {
            return false;
        }
        let Some(found) = self.locate(term) else {
            return false;
        };
        self.dirty = true;
        self.count -= 1;

        let orphans = self.nodes.take_peers(found.node);
        match orphans.split_first() {
            None => {
                self.nodes.peers_mut(found.owner).remove(found.index);
            }
            Some((&promoted, rest)) => {
                // The best child inherits the slot; it outranks all of its former siblings.
                let (ranks, peers) = self.nodes.split_mut();
                let list = &mut peers[found.owner.index()];
                list[found.index] = Peer::new(promoted.node, found.branch_lcp);
                ranks.sort_right(list, found.index);
                self.push_nodes(rest, promoted.lcp(), promoted.node);
            }
        }
        self.nodes.free(found.node);
        self.after_mutation();
        true
    }

    /// Adds a batch of `(term, score)` pairs.
    ///
    /// On an empty trie the batch is merged (duplicate scores summed), ordered by rank and
    /// built in one pass without any reordering. On a non-empty trie every pair goes through
    /// [`PruningRadixTrie::add_to_score`]. Empty terms are dropped.
    pub fn add_terms<I, S>(&mut self, terms: I)
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let terms: Vec<(String, i64)> = terms.into_iter().map(|(t, s)| (t.into(), s)).collect();
        if self.count != 0 {
            debug!(
                "add_terms: adding {} terms one by one to a trie of {}",
                terms.len(),
                self.count
            );
            for (term, score) in &terms {
                self.add_to_score(term, *score);
            }
            return;
        }

        self.bulk_load(terms);
        if self.count != 0 {
            self.dirty = true;
        }
        self.after_mutation();
    }

    // =========================================================================
    // Insert
    // =========================================================================

    fn set_inner(&mut self, term: &str, score: i64) {
        let t = term.as_bytes();
        let Some(root) = self.nodes.root() else {
            let id = self.nodes.alloc(term, score);
            self.nodes.peers_mut(NodeId::ROOT_SLOT).push(Peer::new(id, 0));
            self.count = 1;
            return;
        };

        let mut slot = Slot {
            owner: NodeId::ROOT_SLOT,
            index: 0,
            lcp: 0,
        };
        let mut node = root;
        let mut lcp = 0;
        loop {
            slot.lcp = lcp;
            let key = self.nodes.key(node).as_bytes();
            lcp = common_prefix_from(t, key, lcp);
            if lcp == t.len() && lcp == key.len() {
                self.update_in_place(slot, node, score);
                return;
            }
            if Rank::new(score, term) > self.nodes.rank(node) {
                self.insert_above(slot, node, term, score, lcp);
                return;
            }
            match find_branch(self.nodes.peers(node), lcp) {
                Some(i) => {
                    slot.owner = node;
                    slot.index = i;
                    node = self.nodes.peers(node)[i].node;
                }
                None => {
                    let id = self.nodes.alloc(term, score);
                    let (ranks, peers) = self.nodes.split_mut();
                    ranks.sorted_push(&mut peers[node.index()], Peer::new(id, lcp));
                    self.count += 1;
                    return;
                }
            }
        }
    }

    /// `node` (at `slot`) holds the term; give it `score`.
    fn update_in_place(&mut self, slot: Slot, node: NodeId, score: i64) {
        let key_len = self.nodes.key(node).len();
        let top = self.nodes.peers(node).first().copied();
        self.nodes.set_score(node, score);

        let (ranks, peers) = self.nodes.split_mut();
        match top {
            Some(top) if ranks.outranks(top.node, node) => {
                // Demotion below the best child: the child takes over the slot and the node,
                // now childless, is re-homed together with its former peers.
                let mut orphans = std::mem::take(&mut peers[node.index()]);
                let list = &mut peers[slot.owner.index()];
                list[slot.index] = Peer::new(top.node, slot.lcp);
                ranks.sort_right(list, slot.index);

                orphans[0] = Peer::new(node, key_len);
                ranks.sort_right(&mut orphans, 0);
                self.push_nodes(&orphans, top.lcp(), top.node);
            }
            _ => {
                ranks.resort(&mut peers[slot.owner.index()], slot.index);
            }
        }
    }

    /// Place a new node for `term` at `slot`, above `node`, which it outranks.
    ///
    /// `lcp` is the common prefix of `term` and `node`'s key. Everything in `node`'s subtree
    /// that the new node should own is gathered into its peer list; an existing node for
    /// `term` further down is merged away.
    fn insert_above(&mut self, slot: Slot, node: NodeId, term: &str, score: i64, lcp: usize) {
        let mut adopted = vec![Peer::new(node, lcp)];
        if lcp != slot.lcp {
            self.extract_shallow_peers(node, lcp, &mut adopted);
        }

        match self.adopt_continuation(node, term.as_bytes(), lcp, &mut adopted) {
            Some(existing) => {
                let from = adopted.len();
                adopted.extend(self.nodes.take_peers(existing));
                self.nodes.ranks().sort_tail(&mut adopted, from);
                self.nodes.free(existing);
            }
            None => self.count += 1,
        }

        let id = self.nodes.alloc(term, score);
        *self.nodes.peers_mut(id) = adopted;
        let (ranks, peers) = self.nodes.split_mut();
        let list = &mut peers[slot.owner.index()];
        list[slot.index] = Peer::new(id, slot.lcp);
        ranks.sort_left(list, slot.index);
    }

    /// Follow `term` down from `node`, detaching each node that extends the match and moving
    /// it (with its peers that branch off before the new match length) into `adopted`.
    ///
    /// Returns the node already holding `term`, detached, if there is one.
    fn adopt_continuation(
        &mut self,
        node: NodeId,
        term: &[u8],
        mut lcp: usize,
        adopted: &mut Vec<Peer>,
    ) -> Option<NodeId> {
        let mut cursor = node;
        while lcp != term.len() {
            let at = lcp;
            let next = self.detach_along_chain(cursor, lcp, |key| key.len() > at && key[at] == term[at])?;

            let key = self.nodes.key(next).as_bytes();
            let key_len = key.len();
            lcp = common_prefix_from(term, key, lcp + 1);
            if lcp == term.len() && lcp == key_len {
                return Some(next);
            }

            let from = adopted.len();
            adopted.push(Peer::new(next, lcp));
            self.extract_shallow_peers(next, lcp, adopted);
            self.nodes.ranks().sort_tail(adopted, from);
            cursor = next;
        }

        // `term` is a proper prefix of the last adopted key; the exact node can only sit on
        // the chain branching at the full term length.
        self.detach_along_chain(cursor, lcp, |key| key.len() == lcp)
    }

    /// Walk the chain of nodes branching at `lcp` starting from `owner`'s peers, and detach
    /// the first one whose key satisfies `matches`.
    fn detach_along_chain(
        &mut self,
        mut owner: NodeId,
        lcp: usize,
        matches: impl Fn(&[u8]) -> bool,
    ) -> Option<NodeId> {
        loop {
            let index = find_branch(self.nodes.peers(owner), lcp)?;
            let candidate = self.nodes.peers(owner)[index].node;
            if matches(self.nodes.key(candidate).as_bytes()) {
                self.supplant(owner, index, candidate, lcp);
                return Some(candidate);
            }
            owner = candidate;
        }
    }

    /// Unlink `node` from `owner.peers[index]`. Its own branch at `lcp`, if any, moves up into
    /// the vacated slot.
    fn supplant(&mut self, owner: NodeId, index: usize, node: NodeId, lcp: usize) {
        match find_branch(self.nodes.peers(node), lcp) {
            None => {
                self.nodes.peers_mut(owner).remove(index);
            }
            Some(j) => {
                let successor = self.nodes.peers_mut(node).remove(j);
                let (ranks, peers) = self.nodes.split_mut();
                let list = &mut peers[owner.index()];
                list[index] = successor;
                ranks.sort_right(list, index);
            }
        }
    }

    /// Move `node`'s peers that branch before `lcp` into `out`, preserving their order.
    fn extract_shallow_peers(&mut self, node: NodeId, lcp: usize, out: &mut Vec<Peer>) {
        let peers = self.nodes.peers_mut(node);
        out.extend(peers.iter().filter(|p| p.lcp() < lcp).copied());
        peers.retain(|p| p.lcp() >= lcp);
    }

    /// Re-home a rank-ordered list of detached subtrees below `first`, which outranks all of
    /// them. Each entry's LCP is relative to the key of the node that previously owned it,
    /// which `first` shares.
    ///
    /// Subtrees whose LCP is at least the depth of the deepest placement so far descend along
    /// that placement's branch; shallower ones attach to the placement that owns their range.
    pub(crate) fn push_nodes(&mut self, orphans: &[Peer], first_lcp: usize, first: NodeId) {
        let mut placements: Vec<(usize, NodeId)> = vec![(first_lcp, first)];

        for &orphan in orphans {
            let (depth, mut owner) = placements[placements.len() - 1];
            let lcp = orphan.lcp();

            if lcp >= depth {
                loop {
                    let (ranks, peers) = self.nodes.split_mut();
                    let list = &mut peers[owner.index()];
                    match find_branch(list, depth) {
                        None => {
                            ranks.sorted_push(list, Peer::new(orphan.node, depth));
                            break;
                        }
                        Some(i) => {
                            let existing = list[i].node;
                            if ranks.outranks(orphan.node, existing) {
                                // The orphan holds no peer at `depth`.
                                list[i] = Peer::new(orphan.node, depth);
                                ranks.sort_left(list, i);
                                let moved = &mut peers[orphan.node.index()];
                                ranks.sorted_push(moved, Peer::new(existing, depth));
                                break;
                            }
                            owner = existing;
                        }
                    }
                }
                if lcp > depth {
                    placements.push((lcp, orphan.node));
                }
            } else {
                let pos = placements.partition_point(|&(depth, _)| depth <= lcp);
                let owner = placements[pos].1;
                let (ranks, peers) = self.nodes.split_mut();
                ranks.sorted_push(&mut peers[owner.index()], Peer::new(orphan.node, lcp));
            }
        }
    }

    // =========================================================================
    // Bulk load
    // =========================================================================

    /// Build an empty trie from `terms`. Returns whether the input was already canonical:
    /// no empty or repeated terms, and in rank order.
    pub(crate) fn bulk_load(&mut self, mut terms: Vec<(String, i64)>) -> bool {
        debug_assert_eq!(self.count, 0);
        let before = terms.len();
        terms.retain(|(term, _)| !term.is_empty());
        let canonical = canonicalize(&mut terms) && terms.len() == before;
        if !canonical {
            debug!(
                "add_terms: merged and sorted {} input terms into {}",
                before,
                terms.len()
            );
        }

        let mut entries = terms.into_iter();
        let Some((first, score)) = entries.next() else {
            return canonical;
        };
        let root = self.nodes.alloc(first, score);
        self.nodes.peers_mut(NodeId::ROOT_SLOT).push(Peer::new(root, 0));
        self.count = 1;

        // Input arrives in rank order, so each new node ranks below everything already placed
        // and simply joins the end of the list it lands in.
        for (term, score) in entries {
            let (owner, lcp) = self.descend_to_branch(term.as_bytes(), root);
            let id = self.nodes.alloc(term, score);
            self.nodes.peers_mut(owner).push(Peer::new(id, lcp));
            self.count += 1;
        }
        canonical
    }

    /// Deepest node on the path of `term` with no peer branching at the common prefix, and
    /// that prefix length.
    fn descend_to_branch(&self, term: &[u8], root: NodeId) -> (NodeId, usize) {
        let mut node = root;
        let mut lcp = 0;
        loop {
            lcp = common_prefix_from(term, self.nodes.key(node).as_bytes(), lcp);
            match find_branch(self.nodes.peers(node), lcp) {
                Some(i) => node = self.nodes.peers(node)[i].node,
                None => return (node, lcp),
            }
        }
    }
}

/// Sum duplicate scores and sort by rank, unless `terms` already has unique terms in rank
/// order. Returns whether it did.
fn canonicalize(terms: &mut Vec<(String, i64)>) -> bool {
    let needs_merge = {
        let mut seen = HashSet::with_capacity(terms.len());
        let mut prev: Option<Rank<'_>> = None;
        terms.iter().any(|(term, score)| {
            let rank = Rank::new(*score, term);
            let out_of_order = prev.is_some_and(|p| rank > p);
            prev = Some(rank);
            out_of_order || !seen.insert(term.as_str())
        })
    };
    if !needs_merge {
        return true;
    }

    let mut merged: HashMap<String, i64> = HashMap::with_capacity(terms.len());
    for (term, score) in terms.drain(..) {
        merged
            .entry(term)
            .and_modify(|s| *s = s.saturating_add(score))
            .or_insert(score);
    }
    terms.extend(merged);
    terms.sort_unstable_by(|(a, x), (b, y)| Rank::new(*y, b).cmp(&Rank::new(*x, a)));
    false
}
