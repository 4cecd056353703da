// crates/bpsec-policy-config/src/config.rs
// ============================================================================
// Module: BPSec Policy Configuration
// Description: Configuration loading, validation, and engine bootstrap.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: bpsec-policy-core, bpsec-policy-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. A loaded configuration can
//! build a ready [`PolicyEngine`]: the store and audit sink are opened, any
//! persisted state is restored, and declarative event sets and rules that the
//! store does not already hold are applied on top.
//!
//! Names are parsed during validation so that a typo in an event, action,
//! role, or parameter name is reported at load time rather than at
//! bootstrap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use bpsec_policy_core::Action;
use bpsec_policy_core::ActionMask;
use bpsec_policy_core::ActionParam;
use bpsec_policy_core::BlockType;
use bpsec_policy_core::Event;
use bpsec_policy_core::EventId;
use bpsec_policy_core::EventSetName;
use bpsec_policy_core::FileAuditSink;
use bpsec_policy_core::FilterSpec;
use bpsec_policy_core::InMemoryPolicyStore;
use bpsec_policy_core::MAX_RULES;
use bpsec_policy_core::NoopAuditSink;
use bpsec_policy_core::PolicyAuditSink;
use bpsec_policy_core::PolicyEngine;
use bpsec_policy_core::PolicyEngineConfig;
use bpsec_policy_core::PolicyError;
use bpsec_policy_core::RoleMask;
use bpsec_policy_core::RuleEventSet;
use bpsec_policy_core::RuleId;
use bpsec_policy_core::RuleSpec;
use bpsec_policy_core::ScId;
use bpsec_policy_core::ScParam;
use bpsec_policy_core::SecurityService;
use bpsec_policy_core::SharedPolicyStore;
use bpsec_policy_core::StderrAuditSink;
use bpsec_policy_store_sqlite::SqlitePolicyStore;
use bpsec_policy_store_sqlite::SqliteStoreConfig;
use bpsec_policy_store_sqlite::SqliteStoreMode;
use bpsec_policy_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "bpsec-policy.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "BPSEC_POLICY_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// BPSec policy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BpsecPolicyConfig {
    /// Engine limits and strictness.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Policy record store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Declarative shared event sets.
    #[serde(default)]
    pub event_sets: Vec<EventSetConfig>,
    /// Declarative rules.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl BpsecPolicyConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.store.validate()?;
        self.audit.validate()?;

        let mut names = BTreeSet::new();
        for set in &self.event_sets {
            set.validate()?;
            if !names.insert(set.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate event set name {}",
                    set.name
                )));
            }
        }

        if self.rules.len() > self.engine.max_rules {
            return Err(ConfigError::Invalid(format!(
                "{} rules exceed engine.max_rules {}",
                self.rules.len(),
                self.engine.max_rules
            )));
        }
        let mut ids = BTreeSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !ids.insert(rule.id) {
                return Err(ConfigError::Invalid(format!("duplicate rule id {}", rule.id)));
            }
        }
        Ok(())
    }

    /// Builds an engine: opens the store and audit sink, restores persisted
    /// state, then applies declarative event sets and rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the store or audit sink cannot be opened
    /// or a declarative entry is rejected by the engine.
    pub fn build_engine(&self) -> Result<PolicyEngine, ConfigError> {
        let store = self.store.open()?;
        let audit = self.audit.open()?;
        let mut engine = PolicyEngine::open(self.engine.engine_config(), store, audit)
            .map_err(ConfigError::from)?;
        self.apply(&mut engine)?;
        Ok(engine)
    }

    /// Applies declarative entries that `engine` does not already hold.
    ///
    /// Event sets are matched by name and rules by id; persisted state wins
    /// over the file for entries present in both.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Policy`] when the engine rejects an entry.
    pub fn apply(&self, engine: &mut PolicyEngine) -> Result<ApplySummary, ConfigError> {
        let mut summary = ApplySummary::default();
        for set in &self.event_sets {
            if engine.get_event_set(&set.name).is_some() {
                continue;
            }
            engine.add_event_set(EventSetName::new(set.name.clone()), set.description.clone())?;
            for entry in &set.events {
                let event = entry.create(engine)?;
                engine.add_event(&set.name, event)?;
            }
            summary.event_sets += 1;
        }
        for rule in &self.rules {
            if engine.get_by_id(RuleId::new(rule.id)).is_some() {
                continue;
            }
            let spec = rule.to_spec(engine)?;
            engine.insert_rule(spec)?;
            summary.rules += 1;
        }
        Ok(summary)
    }
}

/// Counts of declarative entries applied by [`BpsecPolicyConfig::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplySummary {
    /// Event sets created.
    pub event_sets: usize,
    /// Rules inserted.
    pub rules: usize,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Engine limits and strictness.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of rules held.
    #[serde(default = "default_max_rules")]
    pub max_rules: usize,
    /// Reject configuration of reserved actions.
    #[serde(default)]
    pub reject_unsupported_actions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rules: default_max_rules(),
            reject_unsupported_actions: false,
        }
    }
}

impl EngineConfig {
    /// Validates engine limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rules == 0 || self.max_rules > MAX_RULES {
            return Err(ConfigError::Invalid(format!(
                "engine.max_rules must be between 1 and {MAX_RULES}"
            )));
        }
        Ok(())
    }

    /// Returns the core engine configuration.
    #[must_use]
    pub const fn engine_config(&self) -> PolicyEngineConfig {
        PolicyEngineConfig {
            max_rules: self.max_rules,
            reject_unsupported_actions: self.reject_unsupported_actions,
        }
    }
}

/// Default rule capacity.
const fn default_max_rules() -> usize {
    MAX_RULES
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Policy record store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Use the in-memory store; nothing survives a restart.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Policy record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend.
    #[serde(default)]
    pub kind: StoreKind,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: None,
            busy_timeout_ms: DEFAULT_STORE_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            StoreKind::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreKind::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }

    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the `SQLite` store cannot be opened.
    pub fn open(&self) -> Result<SharedPolicyStore, ConfigError> {
        match (self.kind, &self.path) {
            (StoreKind::Sqlite, Some(path)) => {
                let store = SqlitePolicyStore::new(SqliteStoreConfig {
                    path: path.clone(),
                    busy_timeout_ms: self.busy_timeout_ms,
                    journal_mode: self.journal_mode,
                    sync_mode: self.sync_mode,
                })
                .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(SharedPolicyStore::from_store(store))
            }
            (StoreKind::Sqlite, None) => {
                Err(ConfigError::Invalid("sqlite store requires path".to_string()))
            }
            (StoreKind::Memory, _) => Ok(SharedPolicyStore::from_store(InMemoryPolicyStore::new())),
        }
    }
}

/// Returns the default busy timeout for `SQLite` stores.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Discard audit events.
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
}

/// Audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("only the file audit sink accepts path".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn open(&self) -> Result<Arc<dyn PolicyAuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::Disabled, _) => Ok(Arc::new(NoopAuditSink)),
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Flags override parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FlagsOverrideConfig {
    /// Bits to replace.
    pub mask: u8,
    /// Replacement values.
    pub value: u8,
}

/// Event binding inside an event set.
#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    /// Event name (aliases accepted).
    pub event: String,
    /// Action names.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Reason code for `report_reason_code`.
    #[serde(default)]
    pub reason_code: Option<u8>,
    /// Target block flags override for `override_target_bpcf`.
    #[serde(default)]
    pub target_bpcf: Option<FlagsOverrideConfig>,
    /// Security block flags override for `override_sop_bpcf`.
    #[serde(default)]
    pub sop_bpcf: Option<FlagsOverrideConfig>,
}

impl EventConfig {
    /// Parses the event name.
    fn event_id(&self) -> Result<EventId, ConfigError> {
        EventId::from_name(&self.event)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown event {}", self.event)))
    }

    /// Parses the action names into a mask.
    fn action_mask(&self) -> Result<ActionMask, ConfigError> {
        if self.actions.is_empty() {
            return Err(ConfigError::Invalid(format!("event {} has no actions", self.event)));
        }
        let mut actions = Vec::with_capacity(self.actions.len());
        for name in &self.actions {
            let action = Action::from_name(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown action {name}")))?;
            actions.push(action);
        }
        Ok(ActionMask::from_actions(&actions))
    }

    /// Returns the configured action parameters.
    fn params(&self) -> Vec<ActionParam> {
        let mut params = Vec::new();
        if let Some(code) = self.reason_code {
            params.push(ActionParam::ReasonCode {
                code,
            });
        }
        if let Some(flags) = self.target_bpcf {
            params.push(ActionParam::TargetFlagsOverride {
                mask: flags.mask,
                value: flags.value,
            });
        }
        if let Some(flags) = self.sop_bpcf {
            params.push(ActionParam::SopFlagsOverride {
                mask: flags.mask,
                value: flags.value,
            });
        }
        params
    }

    /// Validates names.
    fn validate(&self) -> Result<(), ConfigError> {
        self.event_id()?;
        self.action_mask()?;
        Ok(())
    }

    /// Creates the event through the engine so strict mode applies.
    fn create(&self, engine: &PolicyEngine) -> Result<Event, ConfigError> {
        let event = engine.create_event(self.event_id()?, self.action_mask()?, &self.params())?;
        Ok(event)
    }
}

/// Validates a list of event bindings, rejecting repeated event names.
fn validate_events(owner: &str, events: &[EventConfig]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for entry in events {
        entry.validate()?;
        if !seen.insert(entry.event_id()?) {
            return Err(ConfigError::Invalid(format!(
                "{owner} binds event {} more than once",
                entry.event
            )));
        }
    }
    Ok(())
}

/// Shared event set declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSetConfig {
    /// Event set name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Event bindings.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

impl EventSetConfig {
    /// Validates the declaration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("event set name must be non-empty".to_string()));
        }
        validate_events(&format!("event set {}", self.name), &self.events)
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Security context parameter declared by name.
#[derive(Debug, Clone, Deserialize)]
pub struct ScParamConfig {
    /// Parameter name (`key_file`, `iv`, `salt`, `icv`, `intsig`, `bek`, `bekicv`).
    pub name: String,
    /// Parameter value.
    pub value: String,
}

/// Rule declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// User-assigned rule id.
    pub id: u16,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Bundle source EID criterion.
    #[serde(default)]
    pub bundle_source: Option<String>,
    /// Bundle destination EID criterion.
    #[serde(default)]
    pub bundle_destination: Option<String>,
    /// Security source EID criterion.
    #[serde(default)]
    pub security_source: Option<String>,
    /// Target block type criterion.
    #[serde(default)]
    pub block_type: Option<u64>,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Security context id criterion.
    #[serde(default)]
    pub sc_id: Option<i16>,
    /// Security service criterion.
    #[serde(default)]
    pub service: Option<SecurityService>,
    /// Security context parameters.
    #[serde(default)]
    pub sc_params: Vec<ScParamConfig>,
    /// Shared event set name.
    #[serde(default)]
    pub event_set: Option<String>,
    /// Anonymous event set bindings, used when `event_set` is absent.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

impl RuleConfig {
    /// Parses role names into a mask.
    fn role_mask(&self) -> Result<RoleMask, ConfigError> {
        self.roles.iter().try_fold(RoleMask::NONE, |mask, name| {
            RoleMask::from_name(name)
                .map(|role| mask.union(role))
                .ok_or_else(|| ConfigError::Invalid(format!("unknown role {name}")))
        })
    }

    /// Parses security context parameters.
    fn parameters(&self) -> Result<Vec<ScParam>, ConfigError> {
        self.sc_params
            .iter()
            .map(|param| {
                ScParam::named(&param.name, param.value.as_bytes()).ok_or_else(|| {
                    ConfigError::Invalid(format!("unknown sc parameter {}", param.name))
                })
            })
            .collect()
    }

    /// Returns the filter criteria.
    fn filter(&self) -> Result<FilterSpec, ConfigError> {
        Ok(FilterSpec {
            bundle_source: self.bundle_source.clone(),
            bundle_destination: self.bundle_destination.clone(),
            security_source: self.security_source.clone(),
            block_type: self.block_type.map(BlockType::new),
            roles: self.role_mask()?,
            sc_id: self.sc_id.map(ScId::new),
            service: self.service,
        })
    }

    /// Validates the declaration.
    fn validate(&self) -> Result<(), ConfigError> {
        let subject = format!("rule {}", self.id);
        if self.bundle_source.is_none()
            && self.bundle_destination.is_none()
            && self.security_source.is_none()
        {
            return Err(ConfigError::Invalid(format!("{subject} requires at least one eid")));
        }
        match (&self.event_set, self.events.is_empty()) {
            (Some(_), false) => {
                return Err(ConfigError::Invalid(format!(
                    "{subject} sets both event_set and events"
                )));
            }
            (None, true) => {
                return Err(ConfigError::Invalid(format!(
                    "{subject} requires event_set or events"
                )));
            }
            _ => {}
        }
        self.role_mask()?;
        self.parameters()?;
        validate_events(&subject, &self.events)
    }

    /// Builds the engine rule specification.
    fn to_spec(&self, engine: &PolicyEngine) -> Result<RuleSpec, ConfigError> {
        let event_set = match &self.event_set {
            Some(name) => RuleEventSet::Named(EventSetName::new(name.clone())),
            None => RuleEventSet::Anonymous {
                events: self
                    .events
                    .iter()
                    .map(|entry| entry.create(engine))
                    .collect::<Result<Vec<_>, _>>()?,
            },
        };
        Ok(RuleSpec {
            id: RuleId::new(self.id),
            description: self.description.clone(),
            filter: self.filter()?,
            sc_params: self.parameters()?,
            event_set,
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading, validation, or bootstrap errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening resources.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The engine rejected a declarative entry.
    #[error("policy rejected config: {0}")]
    Policy(#[from] PolicyError),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("store.path", "   ").is_err());
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let path = format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let err = validate_path_string("store.path", &path).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }

    #[test]
    fn validate_path_accepts_component_at_max() {
        let path = PathBuf::from(format!("./{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH)));
        assert!(validate_path(&path).is_ok());
    }

    #[test]
    fn explicit_path_wins_over_defaults() {
        let path = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom.toml"));
    }
}
