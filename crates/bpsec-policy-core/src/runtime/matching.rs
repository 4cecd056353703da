// crates/bpsec-policy-core/src/runtime/matching.rs
// ============================================================================
// Module: Rule Matching
// Description: Filter predicate, exhaustive match, and indexed best match.
// Purpose: Select the rule governing a security operation.
// Dependencies: crate::{core, interfaces, runtime::engine}
// ============================================================================

//! ## Overview
//! [`PolicyEngine::matches`] is the single acceptance predicate; both search
//! paths use it. [`PolicyEngine::get_all_match`] scans every rule and is
//! meant for administrative queries. [`PolicyEngine::get_best_match`] is the
//! bundle-processing path: the prefix indices only prune candidates, and
//! every candidate still has to pass `matches`.
//!
//! Ordering: higher score wins; among equal scores the higher position (the
//! more recently inserted rule) wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ops::ControlFlow;

use crate::core::EidField;
use crate::core::RoleMask;
use crate::core::Rule;
use crate::core::RuleHandle;
use crate::core::SearchTag;
use crate::core::UNIVERSAL_WILDCARD;
use crate::core::eid_match;
use crate::interfaces::SecurityContextCatalog;
use crate::runtime::engine::PolicyEngine;

// ============================================================================
// SECTION: Matching
// ============================================================================

impl PolicyEngine {
    /// Returns true when `rule` satisfies every criterion `tag` supplies.
    ///
    /// Criteria are checked cheapest first: roles, block type, security
    /// context id, event set name, service, then EIDs. A criterion absent
    /// from either side never disqualifies.
    #[must_use]
    pub fn matches(&self, rule: &Rule, tag: &SearchTag<'_>) -> bool {
        let filter = rule.filter();
        let roles = filter.roles();
        if !roles.is_empty() && !tag.roles.is_empty() && !roles.intersects(tag.roles) {
            return false;
        }
        if let (Some(required), Some(actual)) = (filter.block_type(), tag.block_type)
            && required != actual
        {
            return false;
        }
        if let (Some(required), Some(actual)) = (filter.sc_id(), tag.effective_sc_id())
            && required != actual
        {
            return false;
        }
        if let Some(name) = tag.event_set {
            let uses = self
                .event_set(rule.event_set())
                .is_some_and(|set| set.name().as_str() == name);
            if !uses {
                return false;
            }
        }
        if let Some(service) = tag.service
            && filter.service() != Some(service)
        {
            return false;
        }
        for field in EidField::ALL {
            let (Some(criterion), Some(query)) = (filter.eid(field), tag.eid(field)) else {
                continue;
            };
            if !eid_match(self.interner.resolve(criterion.handle), Some(query)) {
                return false;
            }
        }
        true
    }

    /// Every matching rule, highest `(score, position)` first.
    #[must_use]
    pub fn get_all_match(&self, tag: &SearchTag<'_>) -> Vec<&Rule> {
        let mut found: Vec<&Rule> =
            self.list_rules().filter(|rule| self.matches(rule, tag)).collect();
        found.sort_by(|left, right| right.rank().cmp(&left.rank()));
        found
    }

    /// First entry of [`PolicyEngine::get_all_match`].
    #[must_use]
    pub fn find_best_match(&self, tag: &SearchTag<'_>) -> Option<&Rule> {
        self.list_rules().filter(|rule| self.matches(rule, tag)).max_by_key(|rule| rule.rank())
    }

    /// Best matching rule via the prefix indices.
    ///
    /// A field the tag omits is searched with the universal wildcard key, so
    /// every rule indexed on that field is a candidate.
    #[must_use]
    pub fn get_best_match(&self, tag: &SearchTag<'_>) -> Option<&Rule> {
        self.best_match_handle(tag).and_then(|handle| self.rule(handle))
    }

    /// Index walk behind [`PolicyEngine::get_best_match`].
    fn best_match_handle(&self, tag: &SearchTag<'_>) -> Option<RuleHandle> {
        let mut best: Option<((u16, usize), RuleHandle)> = None;
        for field in EidField::ALL {
            let key = tag.eid(field).unwrap_or(UNIVERSAL_WILDCARD);
            self.indices[field.offset()].visit_matching(key, |handles| {
                for handle in handles {
                    let Some(rule) = self.rule(*handle) else {
                        continue;
                    };
                    if best.is_some_and(|(rank, _)| rank >= rule.rank()) {
                        break;
                    }
                    if self.matches(rule, tag) {
                        best = Some((rule.rank(), *handle));
                        break;
                    }
                }
                ControlFlow::Continue(())
            });
        }
        best.map(|(_, handle)| handle)
    }

    /// Best rule for an outbound security operation.
    ///
    /// The tag's role is forced to security source and its security context
    /// id is ignored; the tag must name a service. A rule is returned only
    /// when it names a security context the catalog supports for that
    /// service.
    #[must_use]
    pub fn sender_rule(
        &self,
        tag: SearchTag<'_>,
        catalog: &dyn SecurityContextCatalog,
    ) -> Option<&Rule> {
        let service = tag.service?;
        let tag = SearchTag {
            roles: RoleMask::SOURCE,
            sc_id: None,
            ..tag
        };
        let rule = self.get_best_match(&tag)?;
        let sc_id = rule.filter().sc_id()?;
        catalog.supports(sc_id, service).then_some(rule)
    }

    /// Best rule for an inbound security operation; an empty role defaults to
    /// verifier or acceptor.
    #[must_use]
    pub fn receiver_rule(&self, tag: SearchTag<'_>) -> Option<&Rule> {
        let roles = if tag.roles.is_empty() {
            RoleMask::VERIFIER.union(RoleMask::ACCEPTOR)
        } else {
            tag.roles
        };
        self.get_best_match(&SearchTag {
            roles,
            ..tag
        })
    }
}
