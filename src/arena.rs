//! Node storage for the trie.
//!
//! Nodes live in parallel vectors indexed by [`NodeId`] (keys, scores and peer lists), with a
//! free list so that slots vacated by deletes and merges are reused. Slot 0 is a sentinel that
//! is never freed: its peer list is the *root slot*, holding zero entries when the trie is empty
//! and exactly one entry (LCP 0) otherwise.
//!
//! Each node stores its complete term. A [`Peer`] records a child together with the number of
//! leading bytes that the child (and every node below it) shares with the owning node's key.

use std::cmp::Ordering;

/// Index of a node slot in the [`NodeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    /// The sentinel slot whose peer list is the root slot.
    pub(crate) const ROOT_SLOT: NodeId = NodeId(0);

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One entry of a peer (child) list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Peer {
    pub(crate) node: NodeId,
    /// Length of the prefix `node` shares with the owner's key.
    pub(crate) lcp: u32,
}

impl Peer {
    #[inline]
    pub(crate) fn new(node: NodeId, lcp: usize) -> Self {
        let lcp = u32::try_from(lcp).expect("LCP exceeds u32::MAX bytes");
        Self { node, lcp }
    }

    #[inline]
    pub(crate) fn lcp(self) -> usize {
        self.lcp as usize
    }
}

/// Total order used everywhere the trie talks about "score order".
///
/// Higher scores rank first; equal scores are broken by the byte-wise smaller key ranking
/// first. `a > b` means `a` ranks before `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rank<'a> {
    pub(crate) score: i64,
    pub(crate) key: &'a str,
}

impl<'a> Rank<'a> {
    #[inline]
    pub(crate) fn new(score: i64, key: &'a str) -> Self {
        Self { score, key }
    }
}

impl Ord for Rank<'_> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.key.cmp(self.key))
    }
}

impl PartialOrd for Rank<'_> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Longest common prefix of `a` and `b`, given that the first `from` bytes are known to match.
#[inline]
pub(crate) fn common_prefix_from(a: &[u8], b: &[u8], from: usize) -> usize {
    let end = a.len().min(b.len());
    let mut i = from;
    while i < end && a[i] == b[i] {
        i += 1;
    }
    i
}

/// Index of the peer branching at exactly `lcp`, if any.
#[inline]
pub(crate) fn find_branch(peers: &[Peer], lcp: usize) -> Option<usize> {
    peers.iter().position(|p| p.lcp() == lcp)
}

// =============================================================================
// Rank view
// =============================================================================

/// Read-only view of keys and scores, borrowed disjointly from the peer lists so that a peer
/// list can be reordered while ranks of other nodes are consulted.
#[derive(Clone, Copy)]
pub(crate) struct Ranks<'a> {
    keys: &'a [Box<str>],
    scores: &'a [i64],
}

impl<'a> Ranks<'a> {
    #[inline]
    pub(crate) fn of(&self, id: NodeId) -> Rank<'a> {
        Rank::new(self.scores[id.index()], &self.keys[id.index()])
    }

    #[inline]
    pub(crate) fn outranks(&self, a: NodeId, b: NodeId) -> bool {
        self.of(a) > self.of(b)
    }

    /// Shift `peers[index]` towards the front while it outranks its predecessor.
    pub(crate) fn sort_left(&self, peers: &mut [Peer], mut index: usize) -> usize {
        while index != 0 && self.outranks(peers[index].node, peers[index - 1].node) {
            peers.swap(index, index - 1);
            index -= 1;
        }
        index
    }

    /// Shift `peers[index]` towards the back while its successor outranks it.
    pub(crate) fn sort_right(&self, peers: &mut [Peer], mut index: usize) -> usize {
        while index + 1 < peers.len() && self.outranks(peers[index + 1].node, peers[index].node) {
            peers.swap(index, index + 1);
            index += 1;
        }
        index
    }

    /// Restore order after the rank of `peers[index]` changed in either direction.
    pub(crate) fn resort(&self, peers: &mut [Peer], index: usize) -> usize {
        let index = self.sort_left(peers, index);
        self.sort_right(peers, index)
    }

    /// Append `peer` and move it into rank position. Returns its final index.
    pub(crate) fn sorted_push(&self, peers: &mut Vec<Peer>, peer: Peer) -> usize {
        peers.push(peer);
        let last = peers.len() - 1;
        self.sort_left(peers, last)
    }

    /// Insertion-sort the elements from `from` onwards into the already sorted prefix.
    pub(crate) fn sort_tail(&self, peers: &mut [Peer], from: usize) {
        for i in from..peers.len() {
            self.sort_left(peers, i);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_sorted(&self, peers: &[Peer]) -> bool {
        peers
            .windows(2)
            .all(|w| self.outranks(w[0].node, w[1].node))
    }
}

// =============================================================================
// Node Arena
// =============================================================================

/// Node arena with a free list of vacated slots.
#[derive(Clone)]
pub(crate) struct NodeArena {
    keys: Vec<Box<str>>,
    scores: Vec<i64>,
    peers: Vec<Vec<Peer>>,
    /// Vacated slots, reused LIFO.
    free: Vec<NodeId>,
}

impl NodeArena {
    pub(crate) fn new() -> Self {
        Self {
            keys: vec![Box::from("")],
            scores: vec![i64::MAX],
            peers: vec![Vec::new()],
            free: Vec::new(),
        }
    }

    /// Drop every node, keeping only an empty root slot.
    pub(crate) fn clear(&mut self) {
        self.keys.truncate(1);
        self.scores.truncate(1);
        self.peers.truncate(1);
        self.peers[0].clear();
        self.free.clear();
    }

    pub(crate) fn alloc(&mut self, key: impl Into<Box<str>>, score: i64) -> NodeId {
        let key = key.into();
        debug_assert!(!key.is_empty(), "empty keys are never stored");
        if let Some(id) = self.free.pop() {
            let i = id.index();
            self.keys[i] = key;
            self.scores[i] = score;
            debug_assert!(self.peers[i].is_empty());
            return id;
        }

        let id = NodeId(u32::try_from(self.keys.len()).expect("node arena exceeds u32 slots"));
        self.keys.push(key);
        self.scores.push(score);
        self.peers.push(Vec::new());
        id
    }

    /// Vacate a slot. The node must already be unreachable.
    pub(crate) fn free(&mut self, id: NodeId) {
        debug_assert_ne!(id, NodeId::ROOT_SLOT);
        let i = id.index();
        self.keys[i] = Box::from("");
        self.scores[i] = 0;
        self.peers[i] = Vec::new();
        self.free.push(id);
    }

    /// The trie's top node, if the trie is non-empty.
    #[inline]
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.peers[0].first().map(|p| p.node)
    }

    #[inline]
    pub(crate) fn key(&self, id: NodeId) -> &str {
        &self.keys[id.index()]
    }

    #[inline]
    pub(crate) fn score(&self, id: NodeId) -> i64 {
        self.scores[id.index()]
    }

    #[inline]
    pub(crate) fn set_score(&mut self, id: NodeId, score: i64) {
        self.scores[id.index()] = score;
    }

    #[inline]
    pub(crate) fn rank(&self, id: NodeId) -> Rank<'_> {
        Rank::new(self.score(id), self.key(id))
    }

    #[inline]
    pub(crate) fn peers(&self, id: NodeId) -> &[Peer] {
        &self.peers[id.index()]
    }

    #[inline]
    pub(crate) fn peers_mut(&mut self, id: NodeId) -> &mut Vec<Peer> {
        &mut self.peers[id.index()]
    }

    #[inline]
    pub(crate) fn take_peers(&mut self, id: NodeId) -> Vec<Peer> {
        std::mem::take(&mut self.peers[id.index()])
    }

    #[inline]
    pub(crate) fn ranks(&self) -> Ranks<'_> {
        Ranks {
            keys: &self.keys,
            scores: &self.scores,
        }
    }

    /// Split into a rank view and mutable access to every peer list.
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (Ranks<'_>, &mut [Vec<Peer>]) {
        (
            Ranks {
                keys: &self.keys,
                scores: &self.scores,
            },
            &mut self.peers,
        )
    }

    /// Number of allocated slots, including the sentinel and vacated slots.
    #[inline]
    pub(crate) fn slots(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        use std::mem::size_of;
        self.keys.capacity() * size_of::<Box<str>>()
            + self.keys.iter().map(|k| k.len()).sum::<usize>()
            + self.scores.capacity() * size_of::<i64>()
            + self.peers.capacity() * size_of::<Vec<Peer>>()
            + self
                .peers
                .iter()
                .map(|p| p.capacity() * size_of::<Peer>())
                .sum::<usize>()
            + self.free.capacity() * size_of::<NodeId>()
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.keys.shrink_to_fit();
        self.scores.shrink_to_fit();
        self.peers.shrink_to_fit();
        for p in &mut self.peers {
            p.shrink_to_fit();
        }
        self.free.shrink_to_fit();
    }
}
