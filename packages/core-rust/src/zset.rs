//! Ordered-set value: a skip list ordered by `(score, member)` paired with a
//! member -> score map for O(1) score lookups.

use std::collections::HashMap;

use bytes::Bytes;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::skiplist::SkipList;

/// Sort key used by the ordered index: score first, then member bytes to
/// break ties deterministically (matches the reference server's behavior of
/// ordering equal-score members lexicographically).
type RankKey = (OrderedFloat<f64>, Bytes);

/// A Redis-style sorted set: unique members, each carrying a floating-point
/// score, kept in score order.
#[derive(Clone)]
pub struct OrderedSet {
    by_rank: SkipList<RankKey, ()>,
    by_member: HashMap<Bytes, f64>,
}

impl OrderedSet {
    /// Creates an empty ordered set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_rank: SkipList::new(),
            by_member: HashMap::new(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_member.len()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_member.is_empty()
    }

    fn rank_key(member: &Bytes, score: f64) -> RankKey {
        (OrderedFloat(score), member.clone())
    }

    /// Adds or updates `member` with `score`.
    ///
    /// Returns `true` if `member` is new to the set.
    pub fn add(&mut self, member: Bytes, score: f64) -> bool {
        if let Some(&old_score) = self.by_member.get(&member) {
            self.by_rank.delete(&Self::rank_key(&member, old_score));
            self.by_rank.insert(Self::rank_key(&member, score), ());
            self.by_member.insert(member, score);
            false
        } else {
            self.by_rank.insert(Self::rank_key(&member, score), ());
            self.by_member.insert(member, score);
            true
        }
    }

    /// Adds `delta` to `member`'s current score (defaulting to `0.0` if the
    /// member is new), returning the resulting score.
    pub fn incr_by(&mut self, member: Bytes, delta: f64) -> f64 {
        let new_score = self.by_member.get(&member).copied().unwrap_or(0.0) + delta;
        self.add(member, new_score);
        new_score
    }

    /// Returns `member`'s current score, if present.
    #[must_use]
    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.by_member.get(member).copied()
    }

    /// Removes `member`, returning its score if it was present.
    pub fn remove(&mut self, member: &Bytes) -> Option<f64> {
        let score = self.by_member.remove(member)?;
        self.by_rank.delete(&Self::rank_key(member, score));
        Some(score)
    }

    /// Zero-based rank of `member` in ascending score order, if present.
    #[must_use]
    pub fn rank(&self, member: &Bytes) -> Option<usize> {
        let score = *self.by_member.get(member)?;
        let key = Self::rank_key(member, score);
        Some(
            self.by_rank
                .iter()
                .take_while(|(k, _)| **k < key)
                .count(),
        )
    }

    /// Iterates all members in ascending score order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.by_rank.iter().map(|((score, member), _)| (member, score.0))
    }

    /// Iterates members with score in `[min, max]` inclusive, ascending.
    pub fn range_by_score(&self, min: f64, max: f64) -> impl Iterator<Item = (&Bytes, f64)> {
        self.iter().filter(move |(_, score)| *score >= min && *score <= max)
    }

    /// Returns up to `count` members starting at zero-based rank `start`,
    /// ascending by score. Used by `ZRANGE`.
    #[must_use]
    pub fn range_by_rank(&self, start: usize, stop_inclusive: usize) -> Vec<(Bytes, f64)> {
        self.iter()
            .skip(start)
            .take(stop_inclusive.saturating_sub(start).saturating_add(1))
            .map(|(member, score)| (member.clone(), score))
            .collect()
    }
}

impl Default for OrderedSet {
    fn default() -> Self {
        Self::new()
    }
}

// Ordered sets are persisted by flattening to a member/score vector; the
// skip-list index itself is never serialized and gets rebuilt on load.
impl Serialize for OrderedSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let entries: Vec<(Bytes, f64)> = self.iter().map(|(m, s)| (m.clone(), s)).collect();
        entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OrderedSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<(Bytes, f64)>::deserialize(deserializer)?;
        let mut set = OrderedSet::new();
        for (member, score) in entries {
            set.add(member, score);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn add_and_score() {
        let mut set = OrderedSet::new();
        assert!(set.add(b("alice"), 10.0));
        assert!(!set.add(b("alice"), 20.0));
        assert_eq!(set.score(&b("alice")), Some(20.0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ascending_order_by_score() {
        let mut set = OrderedSet::new();
        set.add(b("c"), 3.0);
        set.add(b("a"), 1.0);
        set.add(b("b"), 2.0);
        let members: Vec<Bytes> = set.iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(members, vec![b("a"), b("b"), b("c")]);
    }

    #[test]
    fn ties_break_lexicographically() {
        let mut set = OrderedSet::new();
        set.add(b("zebra"), 1.0);
        set.add(b("apple"), 1.0);
        let members: Vec<Bytes> = set.iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(members, vec![b("apple"), b("zebra")]);
    }

    #[test]
    fn incr_by_defaults_to_zero() {
        let mut set = OrderedSet::new();
        assert_eq!(set.incr_by(b("x"), 5.0), 5.0);
        assert_eq!(set.incr_by(b("x"), -2.0), 3.0);
    }

    #[test]
    fn remove_clears_both_indexes() {
        let mut set = OrderedSet::new();
        set.add(b("a"), 1.0);
        assert_eq!(set.remove(&b("a")), Some(1.0));
        assert_eq!(set.score(&b("a")), None);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn rank_is_zero_based_ascending() {
        let mut set = OrderedSet::new();
        set.add(b("a"), 1.0);
        set.add(b("b"), 2.0);
        set.add(b("c"), 3.0);
        assert_eq!(set.rank(&b("a")), Some(0));
        assert_eq!(set.rank(&b("c")), Some(2));
        assert_eq!(set.rank(&b("missing")), None);
    }

    #[test]
    fn range_by_rank_is_inclusive() {
        let mut set = OrderedSet::new();
        for i in 0..10 {
            set.add(Bytes::from(i.to_string()), i as f64);
        }
        let got = set.range_by_rank(2, 4);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].1, 2.0);
        assert_eq!(got[2].1, 4.0);
    }
}
