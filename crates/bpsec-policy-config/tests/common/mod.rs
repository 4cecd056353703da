// crates/bpsec-policy-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for bpsec-policy-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use bpsec_policy_config::BpsecPolicyConfig;

/// Parses a TOML string into a `BpsecPolicyConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<BpsecPolicyConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<BpsecPolicyConfig, toml::de::Error> {
    config_from_toml("")
}

/// A complete policy file with one shared set and two rules.
pub const POLICY_TOML: &str = r#"
[engine]
max_rules = 16

[[event_sets]]
name = "bib-policy"
description = "integrity failures"

[[event_sets.events]]
event = "sop_corrupted_at_verifier"
actions = ["remove_sop", "report_reason_code"]
reason_code = 15

[[event_sets.events]]
event = "sop_misconf_at_verifier"
actions = ["do_not_forward"]

[[rules]]
id = 1
description = "bib from node 1"
bundle_source = "ipn:1.*"
security_source = "ipn:1.1"
block_type = 1
roles = ["verifier", "a"]
sc_id = 1
service = "integrity"
event_set = "bib-policy"

[[rules.sc_params]]
name = "key_file"
value = "hmac.key"

[[rules]]
id = 2
bundle_destination = "ipn:3.1"
service = "confidentiality"

[[rules.events]]
event = "sop_processed"
actions = ["report_reason_code"]
"#;
