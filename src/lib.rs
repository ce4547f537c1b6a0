//! # pruning-radix-trie
//!
//! An in-memory autocomplete index: a radix trie whose sibling lists are kept in descending
//! score order, so that a top-k prefix query can stop exploring a branch as soon as its best
//! entry cannot beat the results already found.
//!
//! Every node stores a complete term and its score. A node's peers (children) are tagged with
//! the length of the prefix they share with the node's key, and every node outranks everything
//! below it. Queries locate the highest-ranked node matching a prefix and then merge the
//! score-ordered sibling lists lazily through a bounded double-ended priority queue, touching
//! only `O(k)` nodes beyond the descent.
//!
//! ## Example
//!
//! ```rust
//! use pruning_radix_trie::PruningRadixTrie;
//!
//! let mut trie = PruningRadixTrie::new();
//! trie.set("tennis academy", 9001);
//! trie.set("tennis championships", 63);
//! trie.set("tennis championships 2020", 50);
//! trie.set("table tennis", 700);
//!
//! assert_eq!(
//!     trie.top_k("tennis", 2),
//!     vec![("tennis academy", 9001), ("tennis championships", 63)]
//! );
//! assert_eq!(trie.get_score("table tennis"), 700);
//! assert!(trie.delete("table tennis"));
//! assert_eq!(trie.get_score("table tennis"), 0);
//! ```
//!
//! Ties between equal scores are broken by byte-wise term order, so every listing is
//! deterministic.

#![deny(unsafe_code)]

mod arena;
pub mod corpus;
pub mod depq;
mod mutate;
mod query;
mod validate;

use arena::{NodeArena, NodeId, Rank};

pub use corpus::CorpusError;
pub use validate::InvariantViolation;

// =============================================================================
// PruningRadixTrie
// =============================================================================

/// Top-k prefix autocomplete index.
///
/// Mutation (`set`, `add_to_score`, `delete`, `add_terms`) and queries are all synchronous and
/// single-threaded; the type performs no internal locking. Share it across threads the usual
/// way (e.g. behind an `RwLock`) if needed.
#[derive(Clone)]
pub struct PruningRadixTrie {
    nodes: NodeArena,
    count: usize,
    /// Set by every effective mutation, cleared when the corpus is written back.
    dirty: bool,
}

impl PruningRadixTrie {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            count: 0,
            dirty: false,
        }
    }

    /// Number of terms stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Number of terms stored. Same as [`PruningRadixTrie::len`].
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the trie changed since it was created, loaded from a canonical corpus or last
    /// saved.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Removes every term.
    pub fn clear(&mut self) {
        if self.count != 0 {
            self.dirty = true;
        }
        self.nodes.clear();
        self.count = 0;
    }

    /// Approximate heap bytes held by the trie.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Iterates over all `(term, score)` pairs in no particular order.
    pub fn iter(&self) -> Iter<'_> {
        let mut stack = Vec::with_capacity(64);
        stack.extend(self.nodes.root());
        Iter { trie: self, stack }
    }

    /// All terms, highest score first (ties by term).
    pub fn all_terms_sorted(&self) -> Vec<(&str, i64)> {
        let mut terms = self.all_terms_unordered();
        terms.sort_unstable_by(|a, b| Rank::new(b.1, b.0).cmp(&Rank::new(a.1, a.0)));
        terms
    }

    /// All terms in trie order (each node before its peers).
    pub fn all_terms_unordered(&self) -> Vec<(&str, i64)> {
        let mut terms = Vec::with_capacity(self.count);
        terms.extend(self.iter());
        terms
    }

    #[inline]
    fn entry(&self, id: NodeId) -> (&str, i64) {
        (self.nodes.key(id), self.nodes.score(id))
    }
}

impl Default for PruningRadixTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PruningRadixTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for PruningRadixTrie {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut trie = Self::new();
        trie.add_terms(iter);
        trie
    }
}

impl<S: Into<String>> Extend<(S, i64)> for PruningRadixTrie {
    fn extend<I: IntoIterator<Item = (S, i64)>>(&mut self, iter: I) {
        self.add_terms(iter);
    }
}

/// Pre-order iterator over `(term, score)` pairs.
pub struct Iter<'a> {
    trie: &'a PruningRadixTrie,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let peers = self.trie.nodes.peers(id);
        self.stack.extend(peers.iter().rev().map(|p| p.node));
        Some(self.trie.entry(id))
    }
}

impl<'a> IntoIterator for &'a PruningRadixTrie {
    type Item = (&'a str, i64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


#[cfg(test)]
mod proptests;
