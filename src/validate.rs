//! Structural self-check.
//!
//! [`PruningRadixTrie::check_invariants`] walks every reachable node and reports the first
//! broken rule. With the `invariant-checks` feature the check runs after every mutation and
//! panics on failure.

use std::collections::HashSet;

use thiserror::Error;

use crate::arena::{common_prefix_from, NodeId};
use crate::PruningRadixTrie;

/// A broken structural rule, naming the terms involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root slot holds {entries} entries, or a non-zero LCP")]
    RootSlot { entries: usize },
    #[error("peer {child:?} outranks its owner {owner:?}")]
    OutranksOwner { owner: String, child: String },
    #[error("peers of {owner:?} are out of rank order at index {index}")]
    Unsorted { owner: String, index: usize },
    #[error("LCP {lcp} appears twice among the peers of {owner:?}")]
    DuplicateLcp { owner: String, lcp: usize },
    #[error("peer {child:?} of {owner:?} has LCP {lcp}, outside {min}..={max}")]
    LcpOutOfRange {
        owner: String,
        child: String,
        lcp: usize,
        min: usize,
        max: usize,
    },
    #[error("peer {child:?} of {owner:?} is tagged with LCP {stored}, actual common prefix is {actual}")]
    LcpMismatch {
        owner: String,
        child: String,
        stored: usize,
        actual: usize,
    },
    #[error("{key:?} sits on the LCP {expected} branch of {ancestor:?} but shares {actual} bytes with it")]
    MisfiledNode {
        ancestor: String,
        key: String,
        expected: usize,
        actual: usize,
    },
    #[error("node {key:?} is reachable more than once")]
    Cycle { key: String },
    #[error("term {key:?} is stored more than once")]
    DuplicateTerm { key: String },
    #[error("a node holds an empty key")]
    EmptyKey,
    #[error("count is {count} but {reachable} nodes are reachable")]
    CountMismatch { count: usize, reachable: usize },
}

impl PruningRadixTrie {
    /// Verifies every structural invariant of the trie.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let root_slot = self.nodes.peers(NodeId::ROOT_SLOT);
        if root_slot.len() > 1 || root_slot.first().is_some_and(|p| p.lcp() != 0) {
            return Err(InvariantViolation::RootSlot {
                entries: root_slot.len(),
            });
        }

        let ranks = self.nodes.ranks();
        let mut visited = vec![false; self.nodes.slots()];
        let mut terms = HashSet::with_capacity(self.count);
        let mut lcps = HashSet::new();
        // Ancestors of the node being visited, each with the LCP of the branch taken from it.
        let mut path: Vec<(NodeId, usize)> = Vec::new();
        // (node, owner, branch LCP, ancestors above the owner)
        let mut stack: Vec<(NodeId, NodeId, usize, usize)> = root_slot
            .iter()
            .map(|p| (p.node, NodeId::ROOT_SLOT, 0, 0))
            .collect();
        let mut reachable = 0;

        while let Some((node, owner, branch_lcp, depth)) = stack.pop() {
            path.truncate(depth);
            if owner != NodeId::ROOT_SLOT {
                path.push((owner, branch_lcp));
            }
            let key = self.nodes.key(node);
            if std::mem::replace(&mut visited[node.index()], true) {
                return Err(InvariantViolation::Cycle { key: key.to_owned() });
            }
            reachable += 1;
            if key.is_empty() {
                return Err(InvariantViolation::EmptyKey);
            }
            if !terms.insert(key) {
                return Err(InvariantViolation::DuplicateTerm { key: key.to_owned() });
            }
            for &(ancestor, expected) in &path {
                let ancestor = self.nodes.key(ancestor);
                let actual = common_prefix_from(ancestor.as_bytes(), key.as_bytes(), 0);
                if actual != expected {
                    return Err(InvariantViolation::MisfiledNode {
                        ancestor: ancestor.to_owned(),
                        key: key.to_owned(),
                        expected,
                        actual,
                    });
                }
            }

            let peers = self.nodes.peers(node);
            lcps.clear();
            for (index, peer) in peers.iter().enumerate() {
                let child = self.nodes.key(peer.node);
                let lcp = peer.lcp();
                if !ranks.outranks(node, peer.node) {
                    return Err(InvariantViolation::OutranksOwner {
                        owner: key.to_owned(),
                        child: child.to_owned(),
                    });
                }
                if index > 0 && !ranks.outranks(peers[index - 1].node, peer.node) {
                    return Err(InvariantViolation::Unsorted {
                        owner: key.to_owned(),
                        index,
                    });
                }
                if !lcps.insert(lcp) {
                    return Err(InvariantViolation::DuplicateLcp {
                        owner: key.to_owned(),
                        lcp,
                    });
                }
                if lcp < branch_lcp || lcp > key.len() {
                    return Err(InvariantViolation::LcpOutOfRange {
                        owner: key.to_owned(),
                        child: child.to_owned(),
                        lcp,
                        min: branch_lcp,
                        max: key.len(),
                    });
                }
                let actual = common_prefix_from(key.as_bytes(), child.as_bytes(), 0);
                if actual != lcp {
                    return Err(InvariantViolation::LcpMismatch {
                        owner: key.to_owned(),
                        child: child.to_owned(),
                        stored: lcp,
                        actual,
                    });
                }
                stack.push((peer.node, node, lcp, path.len()));
            }
        }

        if reachable != self.count {
            return Err(InvariantViolation::CountMismatch {
                count: self.count,
                reachable,
            });
        }
        Ok(())
    }

    /// Full re-validation after a mutation when `invariant-checks` is enabled.
    #[inline]
    pub(crate) fn after_mutation(&self) {
        #[cfg(feature = "invariant-checks")]
        if let Err(violation) = self.check_invariants() {
            panic!("trie invariant violated: {violation}");
        }
    }
}
