//! Probabilistic ordered map (skip list) used to back ordered-set values.
//!
//! A classic multi-level linked skip list: each node's height is drawn from
//! a geometric(½) distribution, capped at [`SkipList::MAX_LEVEL`]. Search
//! descends from the top level, advancing at each level while the next
//! node's key is `<=` the target, then drops a level; this gives expected
//! `O(log n)` search, insert, and delete.

use rand::Rng;

/// Maximum number of levels a node can participate in.
///
/// 32 levels comfortably supports tens of millions of entries before the
/// geometric height distribution would need a taller list.
const MAX_LEVEL: usize = 32;

#[derive(Clone)]
struct Node<K, V> {
    key: Option<K>,
    value: Option<V>,
    // `next[level]` is the index into `SkipList::nodes` of the following
    // node at that level, or `None` at the tail.
    next: Vec<Option<usize>>,
}

impl<K, V> Node<K, V> {
    fn head(height: usize) -> Self {
        Self {
            key: None,
            value: None,
            next: vec![None; height],
        }
    }

    fn new(key: K, value: V, height: usize) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            next: vec![None; height],
        }
    }

    fn height(&self) -> usize {
        self.next.len()
    }
}

/// An ordered map over keys with a total order, implemented as a skip list.
///
/// Ties on key overwrite the value in place without any structural change
/// (no new node, no re-leveling).
#[derive(Clone)]
pub struct SkipList<K, V> {
    // Slab of nodes. `nodes[0]` is always the head sentinel. Deleted slots
    // are never reused; this trades a little memory for simplicity, which
    // is acceptable since ordered-set members are typically short-lived
    // relative to the process, not astronomically numerous.
    nodes: Vec<Node<K, V>>,
    level: usize,
    len: usize,
}

const HEAD: usize = 0;

impl<K: Ord + Clone, V> SkipList<K, V> {
    /// Creates a new, empty skip list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::head(MAX_LEVEL)],
            level: 1,
            len: 0,
        }
    }

    /// Number of entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Draws a node height from a geometric(½) distribution, capped at
    /// [`MAX_LEVEL`]: each additional level has probability ½ of being
    /// reached via a coin flip.
    fn random_height() -> usize {
        let mut height = 1;
        let mut rng = rand::rng();
        while height < MAX_LEVEL && rng.random_bool(0.5) {
            height += 1;
        }
        height
    }

    /// Finds, for each level, the index of the last node whose key is
    /// strictly less than `key`. Used by both search and insertion.
    fn find_predecessors(&self, key: &K) -> [usize; MAX_LEVEL] {
        let mut preds = [HEAD; MAX_LEVEL];
        let mut cur = HEAD;
        for lvl in (0..self.level).rev() {
            loop {
                match self.nodes[cur].next[lvl] {
                    Some(next_idx) if self.nodes[next_idx].key.as_ref().unwrap() < key => {
                        cur = next_idx;
                    }
                    _ => break,
                }
            }
            preds[lvl] = cur;
        }
        preds
    }

    /// Looks up the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let preds = self.find_predecessors(key);
        let candidate = self.nodes[preds[0]].next[0]?;
        let node = &self.nodes[candidate];
        if node.key.as_ref() == Some(key) {
            node.value.as_ref()
        } else {
            None
        }
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn exists(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `key` -> `value`, overwriting any existing value for `key`.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let preds = self.find_predecessors(&key);
        if let Some(existing_idx) = self.nodes[preds[0]].next[0] {
            if self.nodes[existing_idx].key.as_ref() == Some(&key) {
                return std::mem::replace(&mut self.nodes[existing_idx].value, Some(value));
            }
        }
        self.splice_in(key, value, &preds);
        None
    }

    /// Inserts `key` -> `value` only if `key` is not already present.
    ///
    /// Returns `true` if the insertion happened.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        let preds = self.find_predecessors(&key);
        if let Some(existing_idx) = self.nodes[preds[0]].next[0] {
            if self.nodes[existing_idx].key.as_ref() == Some(&key) {
                return false;
            }
        }
        self.splice_in(key, value, &preds);
        true
    }

    /// Updates the value for an existing `key`, leaving the skip-list
    /// structure untouched. Returns `true` if `key` was present.
    pub fn update(&mut self, key: &K, value: V) -> bool {
        let preds = self.find_predecessors(key);
        if let Some(existing_idx) = self.nodes[preds[0]].next[0] {
            if self.nodes[existing_idx].key.as_ref() == Some(key) {
                self.nodes[existing_idx].value = Some(value);
                return true;
            }
        }
        false
    }

    fn splice_in(&mut self, key: K, value: V, preds: &[usize; MAX_LEVEL]) {
        let height = Self::random_height();
        if height > self.level {
            self.level = height;
        }
        let new_idx = self.nodes.len();
        self.nodes.push(Node::new(key, value, height));
        for lvl in 0..height {
            let pred = preds[lvl];
            let next = self.nodes[pred].next[lvl];
            self.nodes[new_idx].next[lvl] = next;
            self.nodes[pred].next[lvl] = Some(new_idx);
        }
        self.len += 1;
    }

    /// Removes `key`, returning its value if it was present.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let preds = self.find_predecessors(key);
        let target_idx = self.nodes[preds[0]].next[0]?;
        if self.nodes[target_idx].key.as_ref() != Some(key) {
            return None;
        }
        let height = self.nodes[target_idx].height();
        for lvl in 0..height {
            let pred = preds[lvl];
            self.nodes[pred].next[lvl] = self.nodes[target_idx].next[lvl];
        }
        self.len -= 1;
        // Shrink level count while the top level has no entries.
        while self.level > 1 && self.nodes[HEAD].next[self.level - 1].is_none() {
            self.level -= 1;
        }
        std::mem::take(&mut self.nodes[target_idx].value)
    }

    /// In-order iteration over all `(key, value)` pairs at level 0.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        SkipListIter {
            list: self,
            cur: self.nodes[HEAD].next[0],
        }
    }

    /// Iterates over entries whose key falls in `[min, max]` inclusive,
    /// in ascending order. Used by range-style ordered-set operations.
    pub fn range<'a>(&'a self, min: &'a K, max: &'a K) -> impl Iterator<Item = (&'a K, &'a V)> {
        self.iter()
            .skip_while(move |(k, _)| *k < min)
            .take_while(move |(k, _)| *k <= max)
    }
}

impl<K: Ord + Clone, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct SkipListIter<'a, K, V> {
    list: &'a SkipList<K, V>,
    cur: Option<usize>,
}

impl<'a, K, V> Iterator for SkipListIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.list.nodes[idx];
        self.cur = node.next[0];
        Some((node.key.as_ref().unwrap(), node.value.as_ref().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut list = SkipList::new();
        assert!(list.insert(5, "five").is_none());
        assert!(list.insert(1, "one").is_none());
        assert!(list.insert(3, "three").is_none());

        assert_eq!(list.get(&5), Some(&"five"));
        assert_eq!(list.get(&1), Some(&"one"));
        assert_eq!(list.get(&3), Some(&"three"));
        assert_eq!(list.get(&99), None);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn insert_overwrites_on_tie() {
        let mut list = SkipList::new();
        list.insert(1, "a");
        let prev = list.insert(1, "b");
        assert_eq!(prev, Some("a"));
        assert_eq!(list.get(&1), Some(&"b"));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn insert_if_absent_respects_existing() {
        let mut list = SkipList::new();
        assert!(list.insert_if_absent(1, "a"));
        assert!(!list.insert_if_absent(1, "b"));
        assert_eq!(list.get(&1), Some(&"a"));
    }

    #[test]
    fn update_only_existing() {
        let mut list = SkipList::new();
        assert!(!list.update(&1, "x"));
        list.insert(1, "a");
        assert!(list.update(&1, "b"));
        assert_eq!(list.get(&1), Some(&"b"));
    }

    #[test]
    fn in_order_traversal() {
        let mut list = SkipList::new();
        for k in [5, 1, 9, 3, 7, 2, 8, 4, 6, 0] {
            list.insert(k, k.to_string());
        }
        let keys: Vec<i32> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        assert_eq!(list.len(), list.iter().count());
    }

    #[test]
    fn delete_restores_baseline_size() {
        let mut list = SkipList::new();
        list.insert(1, "a");
        let baseline = list.len();
        list.insert(2, "b");
        assert_eq!(list.delete(&2), Some("b"));
        assert_eq!(list.len(), baseline);
        assert!(list.get(&2).is_none());
    }

    #[test]
    fn delete_missing_is_noop() {
        let mut list: SkipList<i32, &str> = SkipList::new();
        assert_eq!(list.delete(&42), None);
    }

    #[test]
    fn exists_reflects_state() {
        let mut list = SkipList::new();
        assert!(!list.exists(&1));
        list.insert(1, "a");
        assert!(list.exists(&1));
        list.delete(&1);
        assert!(!list.exists(&1));
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let mut list = SkipList::new();
        for k in 0..20 {
            list.insert(k, k);
        }
        let got: Vec<i32> = list.range(&5, &10).map(|(k, _)| *k).collect();
        assert_eq!(got, (5..=10).collect::<Vec<_>>());
    }

    #[test]
    fn large_insert_stays_ordered_and_sized() {
        let mut list = SkipList::new();
        let mut keys: Vec<i32> = (0..2000).collect();
        // Deterministic shuffle without pulling in a shuffle crate.
        keys.sort_by_key(|k| (*k * 2654435761_i64 as i32) ^ 0x5bd1_e995);
        for k in &keys {
            list.insert(*k, *k);
        }
        assert_eq!(list.len(), 2000);
        let traversal: Vec<i32> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(traversal, (0..2000).collect::<Vec<_>>());
    }
}

/// Property-based tests using `proptest` for skip-list ordering invariants.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Insert(i32),
        Delete(i32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..200i32).prop_map(Op::Insert),
            (0..200i32).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// After any sequence of inserts/deletes, level-0 traversal is
        /// non-decreasing, `len` matches the traversal length, and every
        /// key the reference `BTreeMap` still holds is reachable via `get`.
        #[test]
        fn stays_ordered_and_consistent(ops in prop::collection::vec(op_strategy(), 0..300)) {
            let mut list: SkipList<i32, i32> = SkipList::new();
            let mut model = std::collections::BTreeMap::new();
            for op in ops {
                match op {
                    Op::Insert(k) => {
                        list.insert(k, k * 10);
                        model.insert(k, k * 10);
                    }
                    Op::Delete(k) => {
                        list.delete(&k);
                        model.remove(&k);
                    }
                }
            }

            let traversal: Vec<(i32, i32)> = list.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(traversal.len(), list.len());
            prop_assert_eq!(traversal.len(), model.len());
            let mut prev: Option<i32> = None;
            for &(k, v) in &traversal {
                if let Some(p) = prev {
                    prop_assert!(p < k);
                }
                prev = Some(k);
                prop_assert_eq!(model.get(&k).copied(), Some(v));
            }
        }
    }
}
