//! Bounded double-ended priority queue.
//!
//! A [`BoundedDepq`] keeps at most `bound` elements. Pushing into a full queue evicts the
//! current minimum if the new element is strictly greater, and otherwise discards the new
//! element. The maximum can be extracted from the other end.
//!
//! Two layouts are available:
//! - an insertion-sorted array (ascending), which wins for small bounds because shifting a
//!   handful of slots beats the bookkeeping of a heap;
//! - a Symmetric Min-Max Heap, `O(log n)` for push, push-with-eviction and extract-max.
//!
//! Symmetric Min-Max Heap layout (0-based, the empty root is implicit): `data[0]` is the
//! minimum and `data[1]` the maximum. Slots `2j` and `2j + 1` are siblings, with the left one
//! never greater than the right one. For a slot `i >= 2`, the pair `(p, p | 1)` with
//! `p = (i / 2 - 1) & !1` bounds it: `data[p] <= data[i] <= data[p | 1]`.

/// Bounds below this use the sorted-array layout, bounds at or above it use the heap.
pub const DEPQ_THRESHOLD: usize = 125;

/// Backing layout of a [`BoundedDepq`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Insertion-sorted array, ascending.
    SortedArray,
    /// Symmetric Min-Max Heap.
    SymmetricMinMaxHeap,
}

impl Layout {
    /// Layout picked for a queue with the given bound.
    pub fn for_bound(bound: usize) -> Self {
        if bound < DEPQ_THRESHOLD {
            Layout::SortedArray
        } else {
            Layout::SymmetricMinMaxHeap
        }
    }
}

/// Fixed-bound double-ended priority queue.
#[derive(Clone, Debug)]
pub struct BoundedDepq<T> {
    data: Vec<T>,
    bound: usize,
    layout: Layout,
}

impl<T: Ord> BoundedDepq<T> {
    /// Creates an empty queue holding at most `bound` elements.
    pub fn new(bound: usize) -> Self {
        Self::with_layout(bound, Layout::for_bound(bound))
    }

    /// Like [`BoundedDepq::new`], but pre-allocates room for `capacity` elements.
    pub fn with_capacity(bound: usize, capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity.min(bound)),
            bound,
            layout: Layout::for_bound(bound),
        }
    }

    /// Creates an empty queue with an explicit layout.
    pub fn with_layout(bound: usize, layout: Layout) -> Self {
        Self {
            data: Vec::new(),
            bound,
            layout,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.bound
    }

    #[inline]
    pub fn bound(&self) -> usize {
        self.bound
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Changes the bound. Minimum elements are evicted until the queue fits.
    pub fn set_bound(&mut self, bound: usize) {
        self.bound = bound;
        while self.data.len() > bound {
            self.pop_min();
        }
    }

    pub fn peek_min(&self) -> Option<&T> {
        self.data.first()
    }

    pub fn peek_max(&self) -> Option<&T> {
        match self.layout {
            Layout::SortedArray => self.data.last(),
            Layout::SymmetricMinMaxHeap => self.data.get(1).or_else(|| self.data.first()),
        }
    }

    /// Pushes `item`, evicting the minimum when the queue is full and `item` is strictly
    /// greater than it.
    ///
    /// Returns the element that did not make it into the queue: the evicted minimum, `item`
    /// itself if it was discarded, or `None` if nothing was dropped.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.data.len() < self.bound {
            match self.layout {
                Layout::SortedArray => {
                    let pos = self.data.partition_point(|x| x < &item);
                    self.data.insert(pos, item);
                }
                Layout::SymmetricMinMaxHeap => {
                    self.data.push(item);
                    self.heap_sift_up(self.data.len() - 1);
                }
            }
            return None;
        }

        match self.data.first() {
            Some(min) if item > *min => Some(self.replace_min(item)),
            _ => Some(item),
        }
    }

    /// Removes and returns the maximum element.
    pub fn pop_max(&mut self) -> Option<T> {
        match self.layout {
            Layout::SortedArray => self.data.pop(),
            Layout::SymmetricMinMaxHeap => {
                if self.data.len() <= 2 {
                    // With two elements the maximum is the right sibling, i.e. the last slot.
                    return self.data.pop();
                }
                let max = self.data.swap_remove(1);
                let mut i = 1;
                while let Some(child) = self.larger_max_child(i) {
                    self.data.swap(i, child);
                    i = child;
                }
                self.heap_sift_up(i);
                Some(max)
            }
        }
    }

    /// Removes and returns the minimum element.
    pub fn pop_min(&mut self) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        match self.layout {
            Layout::SortedArray => Some(self.data.remove(0)),
            Layout::SymmetricMinMaxHeap => {
                let min = self.data.swap_remove(0);
                if !self.data.is_empty() {
                    self.heap_settle_from_min_root();
                }
                Some(min)
            }
        }
    }

    /// Consumes the queue, returning its elements largest first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        let mut data = self.data;
        data.sort_unstable_by(|a, b| b.cmp(a));
        data
    }

    /// Replaces the minimum with `item` in a single restructuring pass. The queue must be
    /// non-empty.
    fn replace_min(&mut self, item: T) -> T {
        debug_assert!(!self.data.is_empty());
        let old = std::mem::replace(&mut self.data[0], item);
        match self.layout {
            Layout::SortedArray => {
                let pos = self.data[1..].partition_point(|x| x < &self.data[0]);
                self.data[..=pos].rotate_left(1);
            }
            Layout::SymmetricMinMaxHeap => self.heap_settle_from_min_root(),
        }
        old
    }

    // =========================================================================
    // Symmetric Min-Max Heap internals
    // =========================================================================

    /// Moves the element at slot 0 down the min side to a leaf, then back up.
    fn heap_settle_from_min_root(&mut self) {
        let mut i = 0;
        while let Some(child) = self.smaller_min_child(i) {
            self.data.swap(i, child);
            i = child;
        }
        self.heap_sift_up(i);
    }

    /// Min-side children of the left slot `i`: the left children of `i` and of its sibling.
    fn smaller_min_child(&self, i: usize) -> Option<usize> {
        let len = self.data.len();
        let a = 2 * i + 2;
        if a >= len {
            return None;
        }
        let b = a + 2;
        if b < len && self.data[b] < self.data[a] {
            Some(b)
        } else {
            Some(a)
        }
    }

    /// Max-side children of the right slot `i`: the right children of `i`'s sibling and of
    /// `i`. A pair that only holds its left element uses that element instead.
    fn larger_max_child(&self, i: usize) -> Option<usize> {
        let len = self.data.len();
        let candidate = |c: usize| {
            if c < len {
                Some(c)
            } else if c - 1 < len {
                Some(c - 1)
            } else {
                None
            }
        };
        let a = candidate(2 * i + 1)?;
        match candidate(2 * i + 3) {
            Some(b) if self.data[b] > self.data[a] => Some(b),
            _ => Some(a),
        }
    }

    /// Restores the heap after the element at slot `i` was placed there.
    fn heap_sift_up(&mut self, mut i: usize) {
        let data = &mut self.data;

        let sibling = i ^ 1;
        if sibling < data.len() {
            let misplaced = if sibling > i {
                data[i] > data[sibling]
            } else {
                data[i] < data[sibling]
            };
            if misplaced {
                data.swap(i, sibling);
                i = sibling;
            }
        }

        if i < 2 {
            return;
        }
        let left_uncle = (i / 2 - 1) & !1;
        if data[i] < data[left_uncle] {
            let mut up = left_uncle;
            loop {
                data.swap(i, up);
                i = up;
                if i < 2 {
                    break;
                }
                up = (i / 2 - 1) & !1;
                if data[i] >= data[up] {
                    break;
                }
            }
        } else if data[i] > data[left_uncle | 1] {
            let mut up = left_uncle | 1;
            loop {
                data.swap(i, up);
                i = up;
                if i < 2 {
                    break;
                }
                up = (i / 2 - 1) | 1;
                if data[i] <= data[up] {
                    break;
                }
            }
        }
    }

    #[cfg(test)]
    fn check_layout(&self) {
        match self.layout {
            Layout::SortedArray => {
                assert!(self.data.windows(2).all(|w| w[0] <= w[1]), "array not sorted");
            }
            Layout::SymmetricMinMaxHeap => {
                for i in 1..self.data.len() {
                    if i % 2 == 1 {
                        assert!(self.data[i - 1] <= self.data[i], "siblings out of order at {i}");
                    }
                    if i >= 2 {
                        let p = (i / 2 - 1) & !1;
                        assert!(self.data[p] <= self.data[i], "left bound broken at {i}");
                        assert!(self.data[i] <= self.data[p | 1], "right bound broken at {i}");
                    }
                }
            }
        }
        assert!(self.data.len() <= self.bound);
    }
}
