// crates/bpsec-policy-core/src/runtime/index.rs
// ============================================================================
// Module: EID Prefix Index
// Description: Ordered map from rule EID strings to rank-sorted rule lists.
// Purpose: Prune best-match candidates to rules whose EID can match a query.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! One [`PrefixIndex`] exists per EID field. Each key is the EID string a
//! rule was filtered on; its list holds every rule using that string, sorted
//! descending by `(score, position)`. [`PrefixIndex::visit_matching`] walks
//! exactly the keys that can satisfy [`crate::core::eid_match`] against a
//! query, letting the visitor stop early.
//!
//! Renumbering after a removal decrements positions above the hole, which
//! preserves relative order, so lists never need re-sorting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ops::Bound;
use std::ops::ControlFlow;

use crate::core::EID_WILDCARD;
use crate::core::RuleHandle;

// ============================================================================
// SECTION: Prefix Index
// ============================================================================

/// Rule lists keyed by EID string.
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    /// Rank-sorted rule handles per EID.
    nodes: BTreeMap<String, Vec<RuleHandle>>,
}

impl PrefixIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when no key is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handles indexed under an exact key, highest rank first.
    #[must_use]
    pub fn handles(&self, key: &str) -> Option<&[RuleHandle]> {
        self.nodes.get(key).map(Vec::as_slice)
    }

    /// Inserts a handle under `key`, keeping the list sorted descending by
    /// `rank_of`. A new rule with a rank equal to existing entries lands
    /// ahead of them.
    pub fn insert(
        &mut self,
        key: &str,
        handle: RuleHandle,
        rank: (u16, usize),
        rank_of: impl Fn(RuleHandle) -> Option<(u16, usize)>,
    ) {
        let list = self.nodes.entry(key.to_string()).or_default();
        let at = list
            .iter()
            .position(|existing| rank_of(*existing).is_none_or(|other| other <= rank))
            .unwrap_or(list.len());
        list.insert(at, handle);
    }

    /// Removes the first occurrence of `handle` under `key`; empty nodes are
    /// dropped. Returns whether the handle was present.
    pub fn remove(&mut self, key: &str, handle: RuleHandle) -> bool {
        let Some(list) = self.nodes.get_mut(key) else {
            return false;
        };
        let Some(offset) = list.iter().position(|existing| *existing == handle) else {
            return false;
        };
        list.remove(offset);
        if list.is_empty() {
            self.nodes.remove(key);
        }
        true
    }

    /// Drops every key.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Visits every node whose key can wildcard-match `query`.
    ///
    /// A key matches when the two strings agree up to the first wildcard in
    /// either, or are equal. For a concrete query that is the exact key plus
    /// every key beginning `query[..i] + '*'`. A wildcard at offset `j` in the
    /// query additionally admits every key beginning `query[..j]`.
    pub fn visit_matching<F>(&self, query: &str, mut visit: F)
    where
        F: FnMut(&[RuleHandle]) -> ControlFlow<()>,
    {
        let wildcard_at = query.find(EID_WILDCARD);
        let limit = wildcard_at.unwrap_or(query.len());
        for end in (0..=limit).filter(|end| query.is_char_boundary(*end)) {
            if Some(end) == wildcard_at {
                if self.visit_prefix(&query[..end], &mut visit).is_break() {
                    return;
                }
                continue;
            }
            let mut prefix = String::with_capacity(end + 1);
            prefix.push_str(&query[..end]);
            prefix.push(EID_WILDCARD);
            if self.visit_prefix(&prefix, &mut visit).is_break() {
                return;
            }
        }
        if wildcard_at.is_none()
            && let Some(list) = self.nodes.get(query)
        {
            let _ = visit(list);
        }
    }

    /// Visits every node whose key starts with `prefix`.
    fn visit_prefix<F>(&self, prefix: &str, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&[RuleHandle]) -> ControlFlow<()>,
    {
        let range = self
            .nodes
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix));
        for (_, list) in range {
            visit(list)?;
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;

    use super::PrefixIndex;
    use crate::core::arena::Arena;
    use crate::core::RuleHandle;

    fn handles(count: usize) -> Vec<RuleHandle> {
        let mut arena = Arena::new();
        (0..count).filter_map(|value| arena.insert(value)).map(RuleHandle).collect()
    }

    fn visited_keys(index: &PrefixIndex, query: &str) -> usize {
        let mut nodes = 0;
        index.visit_matching(query, |_| {
            nodes += 1;
            ControlFlow::Continue(())
        });
        nodes
    }

    #[test]
    fn concrete_query_visits_exact_and_wildcard_prefix_keys() {
        let ids = handles(5);
        let mut index = PrefixIndex::new();
        for (key, handle) in ["ipn:2.1", "ipn:2.*", "ipn:*", "*", "ipn:3.1"].iter().zip(&ids) {
            index.insert(key, *handle, (0, 0), |_| None);
        }
        assert_eq!(visited_keys(&index, "ipn:2.1"), 4);
        assert_eq!(visited_keys(&index, "dtn:none"), 1);
    }

    #[test]
    fn wildcard_query_visits_every_key_under_its_prefix() {
        let ids = handles(4);
        let mut index = PrefixIndex::new();
        for (key, handle) in ["ipn:2.1", "ipn:2.7", "ipn:3.1", "dtn://a"].iter().zip(&ids) {
            index.insert(key, *handle, (0, 0), |_| None);
        }
        assert_eq!(visited_keys(&index, "ipn:2.*"), 2);
        assert_eq!(visited_keys(&index, "*"), 4);
    }

    #[test]
    fn insert_keeps_descending_rank_and_remove_drops_empty_nodes() {
        let ids = handles(3);
        let ranks = [(2_u16, 0_usize), (4, 1), (2, 2)];
        let rank_of = |handle: RuleHandle| {
            ids.iter().position(|candidate| *candidate == handle).map(|offset| ranks[offset])
        };
        let mut index = PrefixIndex::new();
        for (handle, rank) in ids.iter().zip(ranks) {
            index.insert("ipn:1.1", *handle, rank, rank_of);
        }
        assert_eq!(index.handles("ipn:1.1"), Some(&[ids[1], ids[2], ids[0]][..]));
        for handle in &ids {
            assert!(index.remove("ipn:1.1", *handle));
        }
        assert!(index.is_empty());
        assert!(!index.remove("ipn:1.1", ids[0]));
    }
}
