//! Dependency-ordered invalidation queue.
//!
//! Nodes are keyed by column and singly linked through `next`, the same way
//! B+tree leaves chain through their sibling ids. A node is linked in right
//! before the first queued node it feeds, so a column is always recomputed
//! before anything that reads it.

use alloc::vec::Vec;
use cambium_core::{ColumnId, RowId};
use hashbrown::{HashMap, HashSet};

/// Rows waiting for one column to be recomputed.
#[derive(Debug, Default)]
struct InvalidationNode {
    /// Rows in invalidation order.
    rows: Vec<RowId>,
    seen: HashSet<RowId>,
    next: Option<ColumnId>,
}

/// Pending (column, rows) recomputations.
#[derive(Debug, Default)]
pub(crate) struct InvalidationQueue {
    nodes: HashMap<ColumnId, InvalidationNode>,
    head: Option<ColumnId>,
}

impl InvalidationQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of queued columns.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if `row` is queued for `column`.
    #[cfg(test)]
    pub(crate) fn contains(&self, column: ColumnId, row: RowId) -> bool {
        self.nodes
            .get(&column)
            .map(|node| node.seen.contains(&row))
            .unwrap_or(false)
    }

    /// Queues `row` for `column`.
    ///
    /// `feeds(a, b)` must return true when `b` reads `a`, directly or
    /// transitively. Returns false if the pair was already queued.
    pub(crate) fn enqueue<F>(&mut self, column: ColumnId, row: RowId, feeds: F) -> bool
    where
        F: Fn(ColumnId, ColumnId) -> bool,
    {
        if !self.nodes.contains_key(&column) {
            self.link(column, &feeds);
        }
        match self.nodes.get_mut(&column) {
            Some(node) => {
                if node.seen.insert(row) {
                    node.rows.push(row);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    fn link<F>(&mut self, column: ColumnId, feeds: &F)
    where
        F: Fn(ColumnId, ColumnId) -> bool,
    {
        let mut previous: Option<ColumnId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if feeds(column, current) {
                break;
            }
            previous = Some(current);
            cursor = self.nodes.get(&current).and_then(|node| node.next);
        }

        let node = InvalidationNode {
            next: cursor,
            ..InvalidationNode::default()
        };
        self.nodes.insert(column, node);
        match previous {
            Some(previous) => {
                if let Some(prev) = self.nodes.get_mut(&previous) {
                    prev.next = Some(column);
                }
            }
            None => self.head = Some(column),
        }
    }

    /// Removes the head node, returning its column and rows.
    pub(crate) fn pop_front(&mut self) -> Option<(ColumnId, Vec<RowId>)> {
        let column = self.head?;
        let node = self.nodes.remove(&column)?;
        self.head = node.next;
        Some((column, node.rows))
    }

    /// Returns queued columns in order.
    #[cfg(test)]
    pub(crate) fn columns(&self) -> Vec<ColumnId> {
        let mut columns = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(current) = cursor {
            columns.push(current);
            cursor = self.nodes.get(&current).and_then(|node| node.next);
        }
        columns
    }

    #[cfg(test)]
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    /// 1 -> 2 -> 3, 10 is unrelated.
    fn chain(a: ColumnId, b: ColumnId) -> bool {
        matches!((a, b), (1, 2) | (1, 3) | (2, 3))
    }

    #[test]
    fn test_enqueue_dedups_rows() {
        let mut queue = InvalidationQueue::new();
        assert!(queue.enqueue(1, 100, chain));
        assert!(queue.enqueue(1, 101, chain));
        assert!(!queue.enqueue(1, 100, chain));
        assert!(queue.contains(1, 101));
        assert_eq!(queue.pop_front(), Some((1, vec![100, 101])));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dependency_order_regardless_of_arrival() {
        let mut queue = InvalidationQueue::new();
        queue.enqueue(3, 1, chain);
        queue.enqueue(10, 1, chain);
        queue.enqueue(2, 1, chain);
        queue.enqueue(1, 1, chain);
        assert_eq!(queue.columns(), vec![1, 2, 3, 10]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_unrelated_columns_keep_arrival_order() {
        let mut queue = InvalidationQueue::new();
        queue.enqueue(10, 1, chain);
        queue.enqueue(11, 1, chain);
        queue.enqueue(12, 1, chain);
        assert_eq!(queue.columns(), vec![10, 11, 12]);
    }

    #[test]
    fn test_relink_after_pop() {
        let mut queue = InvalidationQueue::new();
        queue.enqueue(2, 1, chain);
        queue.enqueue(3, 1, chain);
        assert_eq!(queue.pop_front().map(|(c, _)| c), Some(2));
        queue.enqueue(2, 5, chain);
        assert_eq!(queue.columns(), vec![2, 3]);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }
}
