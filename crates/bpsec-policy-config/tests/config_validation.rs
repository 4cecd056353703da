// crates/bpsec-policy-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate engine, store, audit, and declarative policy sections.
// Purpose: Ensure malformed configuration fails closed at load time.
// =============================================================================

//! Config validation tests for bpsec-policy-config.

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

use std::path::PathBuf;

use bpsec_policy_config::AuditSinkKind;
use bpsec_policy_config::BpsecPolicyConfig;
use bpsec_policy_config::ConfigError;
use bpsec_policy_config::StoreKind;
use bpsec_policy_core::MAX_RULES;
use bpsec_policy_store_sqlite::SqliteStoreMode;

mod common;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}

fn from_toml(text: &str) -> Result<(), ConfigError> {
    BpsecPolicyConfig::from_toml(text).map(|_| ())
}

#[test]
fn defaults_are_memory_store_without_audit() {
    let config = common::minimal_config().unwrap();
    assert_eq!(config.engine.max_rules, MAX_RULES);
    assert!(!config.engine.reject_unsupported_actions);
    assert_eq!(config.store.kind, StoreKind::Memory);
    assert_eq!(config.store.journal_mode, SqliteStoreMode::Wal);
    assert_eq!(config.audit.sink, AuditSinkKind::Disabled);
    config.validate().unwrap();
}

#[test]
fn full_policy_file_parses() {
    let config = BpsecPolicyConfig::from_toml(common::POLICY_TOML).unwrap();
    assert_eq!(config.event_sets.len(), 1);
    assert_eq!(config.event_sets[0].events.len(), 2);
    assert_eq!(config.rules.len(), 2);
    assert_eq!(config.rules[0].sc_params[0].name, "key_file");
    assert!(config.rules[1].event_set.is_none());
}

#[test]
fn max_rules_must_be_in_range() -> TestResult {
    let mut config = common::minimal_config().unwrap();
    config.engine.max_rules = 0;
    assert_invalid(config.validate(), "engine.max_rules")?;
    config.engine.max_rules = MAX_RULES + 1;
    assert_invalid(config.validate(), "engine.max_rules")
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().unwrap();
    config.store.path = Some(PathBuf::from("policy.db"));
    assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().unwrap();
    config.store.kind = StoreKind::Sqlite;
    assert_invalid(config.validate(), "sqlite store requires path")?;
    config.store.path = Some(PathBuf::from("  "));
    assert_invalid(config.validate(), "store.path must be non-empty")
}

#[test]
fn file_audit_requires_path_and_others_reject_it() -> TestResult {
    assert_invalid(from_toml("[audit]\nsink = \"file\"\n"), "file audit sink requires path")?;
    assert_invalid(
        from_toml("[audit]\nsink = \"stderr\"\npath = \"audit.jsonl\"\n"),
        "only the file audit sink accepts path",
    )
}

#[test]
fn unknown_store_kind_is_a_parse_error() {
    let err = from_toml("[store]\nkind = \"postgres\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn unknown_names_are_rejected() -> TestResult {
    let base = r#"
[[rules]]
id = 1
bundle_source = "ipn:1.1"
"#;
    assert_invalid(
        from_toml(&format!("{base}roles = [\"auditor\"]\nevent_set = \"s\"\n")),
        "unknown role auditor",
    )?;
    assert_invalid(
        from_toml(&format!(
            "{base}event_set = \"s\"\n[[rules.sc_params]]\nname = \"nonce\"\nvalue = \"x\"\n"
        )),
        "unknown sc parameter nonce",
    )?;
    assert_invalid(
        from_toml(&format!(
            "{base}[[rules.events]]\nevent = \"sop_lost\"\nactions = [\"remove_sop\"]\n"
        )),
        "unknown event sop_lost",
    )?;
    assert_invalid(
        from_toml(&format!(
            "{base}[[rules.events]]\nevent = \"sop_processed\"\nactions = [\"drop\"]\n"
        )),
        "unknown action drop",
    )
}

#[test]
fn rule_needs_exactly_one_event_source() -> TestResult {
    let base = "[[rules]]\nid = 3\nbundle_destination = \"ipn:2.*\"\n";
    assert_invalid(from_toml(base), "requires event_set or events")?;
    assert_invalid(
        from_toml(&format!(
            "{base}event_set = \"s\"\n[[rules.events]]\nevent = \"sop_processed\"\nactions = \
             [\"report_reason_code\"]\n"
        )),
        "sets both event_set and events",
    )
}

#[test]
fn rule_without_eid_is_rejected() -> TestResult {
    assert_invalid(
        from_toml("[[rules]]\nid = 4\nblock_type = 1\nevent_set = \"s\"\n"),
        "requires at least one eid",
    )
}

#[test]
fn duplicates_are_rejected() -> TestResult {
    assert_invalid(
        from_toml("[[event_sets]]\nname = \"a\"\n[[event_sets]]\nname = \"a\"\n"),
        "duplicate event set name a",
    )?;
    let rule = "[[rules]]\nid = 9\nbundle_source = \"ipn:1.1\"\nevent_set = \"a\"\n";
    assert_invalid(from_toml(&format!("{rule}{rule}")), "duplicate rule id 9")?;
    assert_invalid(
        from_toml(
            "[[event_sets]]\nname = \"b\"\n[[event_sets.events]]\nevent = \
             \"sop_verified\"\nactions = [\"report_reason_code\"]\n[[event_sets.events]]\nevent \
             = \"sop_verified\"\nactions = [\"report_reason_code\"]\n",
        ),
        "binds event sop_verified more than once",
    )
}

#[test]
fn event_without_actions_is_rejected() -> TestResult {
    assert_invalid(
        from_toml("[[event_sets]]\nname = \"c\"\n[[event_sets.events]]\nevent = \"sop_verified\"\n"),
        "has no actions",
    )
}

#[test]
fn rule_count_is_bounded_by_engine_limit() -> TestResult {
    let mut text = String::from("[engine]\nmax_rules = 1\n");
    for id in 1..=2 {
        text.push_str(&format!(
            "[[rules]]\nid = {id}\nbundle_source = \"ipn:{id}.1\"\nevent_set = \"s\"\n"
        ));
    }
    assert_invalid(from_toml(&text), "exceed engine.max_rules")
}
