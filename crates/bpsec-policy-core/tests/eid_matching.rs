// crates/bpsec-policy-core/tests/eid_matching.rs
// ============================================================================
// Module: EID Matching and Score Property Tests
// Description: Property tests for wildcard comparison and specificity scores.
// Purpose: Detect ordering and prefix bugs across wide input ranges.
// ============================================================================

//! Property-based tests for wildcard EID matching and filter scoring.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use bpsec_policy_core::BlockType;
use bpsec_policy_core::EidInterner;
use bpsec_policy_core::Filter;
use bpsec_policy_core::FilterSpec;
use bpsec_policy_core::SCORE_FULL;
use bpsec_policy_core::SCORE_PARTIAL;
use bpsec_policy_core::ScId;
use bpsec_policy_core::SecurityService;
use bpsec_policy_core::eid_match;
use proptest::prelude::*;

fn score(spec: &FilterSpec) -> u16 {
    let mut interner = EidInterner::new();
    let filter = Filter::build(spec, &mut interner).unwrap();
    assert_eq!(filter.score(), filter.compute_score());
    filter.score()
}

#[test]
fn absent_eids_never_match() {
    assert!(!eid_match(None, Some("ipn:1.1")));
    assert!(!eid_match(Some("*"), None));
    assert!(!eid_match(None, None));
}

#[test]
fn wildcard_covers_the_empty_suffix() {
    assert!(eid_match(Some("ipn:2.*"), Some("ipn:2.")));
    assert!(eid_match(Some("ipn:2.1"), Some("ipn:2.*")));
    assert!(!eid_match(Some("ipn:2.1"), Some("ipn:2.10")));
    assert!(!eid_match(Some("ipn:2.*"), Some("ipn:3.1")));
}

#[test]
fn service_never_contributes_to_score() {
    let base = FilterSpec {
        bundle_source: Some("ipn:1.1".to_string()),
        ..FilterSpec::default()
    };
    let with_service = FilterSpec {
        service: Some(SecurityService::Confidentiality),
        ..base.clone()
    };
    assert_eq!(score(&base), score(&with_service));

    let with_block_and_context = FilterSpec {
        block_type: Some(BlockType::PAYLOAD),
        sc_id: Some(ScId::new(2)),
        ..base.clone()
    };
    assert_eq!(score(&with_block_and_context), score(&base) + 2 * SCORE_FULL);

    let unsupported_context = FilterSpec {
        sc_id: Some(ScId::UNSUPPORTED),
        ..base.clone()
    };
    assert_eq!(score(&unsupported_context), score(&base));
}

proptest! {
    #[test]
    fn wildcard_matches_every_extension_of_its_prefix(prefix in "[a-z:.0-9]{0,12}", suffix in "[a-z:.0-9]{0,12}") {
        let pattern = format!("{prefix}*");
        let candidate = format!("{prefix}{suffix}");
        prop_assert!(eid_match(Some(&pattern), Some(&candidate)));
        prop_assert!(eid_match(Some(&candidate), Some(&pattern)));
    }

    #[test]
    fn wildcard_rejects_strings_without_its_prefix(prefix in "[a-z0-9]{1,8}", other in "[a-z0-9]{1,12}") {
        prop_assume!(!other.starts_with(&prefix));
        let pattern = format!("{prefix}*");
        prop_assert!(!eid_match(Some(&pattern), Some(&other)));
    }

    #[test]
    fn concrete_eids_match_only_themselves(first in "[a-z0-9]{1,8}", second in "[a-z0-9]{1,8}") {
        prop_assert_eq!(eid_match(Some(&first), Some(&second)), first == second);
    }

    #[test]
    fn each_eid_adds_full_or_partial_score(
        src in prop::option::of("[a-z]{1,6}"),
        dst in prop::option::of("[a-z]{1,6}"),
        wildcard in any::<bool>(),
        extra in "[a-z]{1,6}",
    ) {
        let base = FilterSpec {
            bundle_source: src,
            bundle_destination: dst,
            ..FilterSpec::default()
        };
        prop_assume!(base.bundle_source.is_some() || base.bundle_destination.is_some());
        let eid = if wildcard { format!("{extra}*") } else { extra };
        let extended = FilterSpec {
            security_source: Some(eid),
            ..base.clone()
        };
        let increment = if wildcard { SCORE_PARTIAL } else { SCORE_FULL };
        prop_assert_eq!(score(&extended), score(&base) + increment);
    }
}
