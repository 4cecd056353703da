// crates/bpsec-policy-core/src/runtime/engine.rs
// ============================================================================
// Module: BPSec Policy Engine
// Description: Rule and event set storage with transactional persistence.
// Purpose: Own all policy state behind one explicit engine context.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! [`PolicyEngine`] owns the EID interner, the rule and event set arenas, the
//! position-ordered rule collection, and one [`PrefixIndex`] per EID field.
//! Every administrative mutation validates first, then writes its records
//! inside one store transaction, then applies the in-memory change; a failed
//! transaction leaves memory untouched.
//!
//! Invariants:
//! - `rules[order[i]].position == i` for every `i`.
//! - A named event set's reference count equals the number of rules using it.
//! - Anonymous event sets are owned by exactly one rule and never appear in
//!   the name index.
//!
//! Rule matching lives in [`crate::runtime::matching`]; the action
//! dispatcher in [`crate::runtime::dispatch`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::core::ActionMask;
use crate::core::ActionParam;
use crate::core::EidCriterion;
use crate::core::EidField;
use crate::core::EidInterner;
use crate::core::Event;
use crate::core::EventId;
use crate::core::EventSet;
use crate::core::EventSetHandle;
use crate::core::EventSetName;
use crate::core::Filter;
use crate::core::FilterSpec;
use crate::core::MAX_RULE_DESC_LEN;
use crate::core::MAX_RULES;
use crate::core::MAX_SC_PARAM_LEN;
use crate::core::PolicyError;
use crate::core::Rule;
use crate::core::RuleEventSet;
use crate::core::RuleFlags;
use crate::core::RuleHandle;
use crate::core::RuleId;
use crate::core::RuleRecord;
use crate::core::RuleRecordEventSet;
use crate::core::RuleSpec;
use crate::core::ScParam;
use crate::core::arena::Arena;
use crate::core::codec;
use crate::core::is_wildcard_eid;
use crate::core::validate_user_name;
use crate::interfaces::PolicyStore;
use crate::interfaces::RecordId;
use crate::interfaces::RecordList;
use crate::interfaces::SharedPolicyStore;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::audit::PolicyAuditSink;
use crate::runtime::audit::PolicyChangeEvent;
use crate::runtime::audit::PolicyChangeEventParams;
use crate::runtime::audit::PolicyRestoreEvent;
use crate::runtime::index::PrefixIndex;
use crate::runtime::store::InMemoryPolicyStore;
use crate::runtime::telemetry::OperationOutcome;
use crate::runtime::telemetry::PolicyOperation;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Policy engine limits and strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEngineConfig {
    /// Maximum number of rules held.
    pub max_rules: usize,
    /// Reject configuration of reserved actions instead of accepting it.
    pub reject_unsupported_actions: bool,
}

impl Default for PolicyEngineConfig {
    fn default() -> Self {
        Self {
            max_rules: MAX_RULES,
            reject_unsupported_actions: false,
        }
    }
}

/// Counts reported by [`PolicyEngine::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreSummary {
    /// Event sets restored into the name index.
    pub event_sets: usize,
    /// Rules restored.
    pub rules: usize,
    /// Records skipped because they failed to decode or resolve.
    pub skipped: usize,
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Name index entry for a shared event set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NamedEventSet {
    /// Arena handle.
    pub(crate) handle: EventSetHandle,
    /// Persisted record address.
    pub(crate) record: Option<RecordId>,
}

/// Policy engine context.
pub struct PolicyEngine {
    /// Limits and strictness.
    pub(crate) config: PolicyEngineConfig,
    /// Interned EID strings.
    pub(crate) interner: EidInterner,
    /// Rule storage.
    pub(crate) rules: Arena<Rule>,
    /// Rule handles in position order.
    pub(crate) order: Vec<RuleHandle>,
    /// Event set storage, named and anonymous.
    pub(crate) event_sets: Arena<EventSet>,
    /// Shared event sets by name.
    pub(crate) names: BTreeMap<EventSetName, NamedEventSet>,
    /// Prefix indices in [`EidField::ALL`] order.
    pub(crate) indices: [PrefixIndex; 3],
    /// Backing record store.
    store: SharedPolicyStore,
    /// Audit sink.
    pub(crate) audit: Arc<dyn PolicyAuditSink>,
}

impl fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("config", &self.config)
            .field("rules", &self.order.len())
            .field("event_sets", &self.names.len())
            .finish_non_exhaustive()
    }
}

impl PolicyEngine {
    /// Creates an empty engine over `store` without restoring from it.
    #[must_use]
    pub fn new(config: PolicyEngineConfig, store: SharedPolicyStore) -> Self {
        Self {
            config,
            interner: EidInterner::new(),
            rules: Arena::new(),
            order: Vec::new(),
            event_sets: Arena::new(),
            names: BTreeMap::new(),
            indices: [PrefixIndex::new(), PrefixIndex::new(), PrefixIndex::new()],
            store,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Creates an empty engine backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory(config: PolicyEngineConfig) -> Self {
        Self::new(config, SharedPolicyStore::from_store(InMemoryPolicyStore::new()))
    }

    /// Creates an engine over `store` and restores its persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when the store cannot be read.
    pub fn open(
        config: PolicyEngineConfig,
        store: SharedPolicyStore,
        audit: Arc<dyn PolicyAuditSink>,
    ) -> Result<Self, PolicyError> {
        let mut engine = Self::new(config, store).with_audit(audit);
        engine.restore()?;
        Ok(engine)
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn PolicyAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Engine limits and strictness.
    #[must_use]
    pub const fn config(&self) -> &PolicyEngineConfig {
        &self.config
    }

    /// Backing record store.
    #[must_use]
    pub const fn store(&self) -> &SharedPolicyStore {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Rule queries
    // ------------------------------------------------------------------------

    /// Number of rules held.
    #[must_use]
    pub fn rules_len(&self) -> usize {
        self.order.len()
    }

    /// Resolves a rule handle.
    #[must_use]
    pub fn rule(&self, handle: RuleHandle) -> Option<&Rule> {
        self.rules.get(handle.0)
    }

    /// Finds a rule by id. Linear in the number of rules; administrative
    /// lookups only.
    #[must_use]
    pub fn get_by_id(&self, id: RuleId) -> Option<&Rule> {
        self.handle_by_id(id).and_then(|handle| self.rule(handle))
    }

    /// Finds a rule handle by id.
    #[must_use]
    pub fn handle_by_id(&self, id: RuleId) -> Option<RuleHandle> {
        self.order
            .iter()
            .copied()
            .find(|handle| self.rule(*handle).is_some_and(|rule| rule.id() == id))
    }

    /// Rules in position order.
    pub fn list_rules(&self) -> impl Iterator<Item = &Rule> {
        self.order.iter().filter_map(|handle| self.rule(*handle))
    }

    /// Reconstructs the filter input of a rule.
    #[must_use]
    pub fn rule_filter_spec(&self, rule: &Rule) -> FilterSpec {
        rule.filter().to_spec(&self.interner)
    }

    /// Event set a rule uses, named or anonymous.
    #[must_use]
    pub fn rule_event_set(&self, rule: &Rule) -> Option<&EventSet> {
        self.event_set(rule.event_set())
    }

    // ------------------------------------------------------------------------
    // Event set queries
    // ------------------------------------------------------------------------

    /// Resolves an event set handle.
    #[must_use]
    pub fn event_set(&self, handle: EventSetHandle) -> Option<&EventSet> {
        self.event_sets.get(handle.0)
    }

    /// Finds a shared event set by name.
    #[must_use]
    pub fn get_event_set(&self, name: &str) -> Option<&EventSet> {
        self.names.get(name).and_then(|entry| self.event_set(entry.handle))
    }

    /// Shared event sets in name order.
    pub fn list_event_sets(&self) -> impl Iterator<Item = &EventSet> {
        self.names.values().filter_map(|entry| self.event_set(entry.handle))
    }

    /// Finds an event binding in a shared event set.
    #[must_use]
    pub fn get_event(&self, set: &str, id: EventId) -> Option<&Event> {
        self.get_event_set(set).and_then(|set| set.event(id))
    }

    // ------------------------------------------------------------------------
    // Event set mutations
    // ------------------------------------------------------------------------

    /// Creates an event, enforcing the engine's strictness.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Conflict`] when an action is illegal for the
    /// event (or reserved in strict mode) and [`PolicyError::InvalidArgument`]
    /// for an empty request or mismatched parameters. Nothing is created.
    pub fn create_event(
        &self,
        id: EventId,
        actions: ActionMask,
        params: &[ActionParam],
    ) -> Result<Event, PolicyError> {
        let event = if self.config.reject_unsupported_actions {
            Event::new_strict(id, actions, params)
        } else {
            Event::new(id, actions, params)
        };
        event.map_err(PolicyError::from)
    }

    /// Creates a shared event set.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidArgument`] for a bad name or description,
    /// [`PolicyError::Conflict`] when the name exists, or
    /// [`PolicyError::System`] when persistence fails.
    pub fn add_event_set(
        &mut self,
        name: EventSetName,
        description: Option<String>,
    ) -> Result<EventSetHandle, PolicyError> {
        let subject = name.to_string();
        let result = self.add_event_set_inner(name, description);
        self.audit_result(PolicyOperation::AddEventSet, subject, &result, |_| {
            OperationOutcome::Applied
        });
        result
    }

    /// Creates a shared event set.
    fn add_event_set_inner(
        &mut self,
        name: EventSetName,
        description: Option<String>,
    ) -> Result<EventSetHandle, PolicyError> {
        validate_user_name(&name)?;
        if self.names.contains_key(&name) {
            return Err(PolicyError::Conflict(format!("event set {name} already exists")));
        }
        let set = EventSet::new(name.clone(), description)?;
        let bytes = codec::encode_event_set(&set)?;
        let record = self.transact(|store| Ok(store.append(RecordList::EventSets, &bytes)?))?;
        let handle = EventSetHandle(
            self.event_sets
                .insert(set)
                .ok_or_else(|| PolicyError::System("event set arena exhausted".to_string()))?,
        );
        self.names.insert(
            name,
            NamedEventSet {
                handle,
                record: Some(record),
            },
        );
        Ok(handle)
    }

    /// Deletes a shared event set. Returns `false` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Conflict`] while rules reference the set, or
    /// [`PolicyError::System`] when persistence fails.
    pub fn delete_event_set(&mut self, name: &str) -> Result<bool, PolicyError> {
        let result = self.delete_event_set_inner(name);
        self.audit_result(PolicyOperation::DeleteEventSet, name.to_string(), &result, |deleted| {
            if *deleted { OperationOutcome::Applied } else { OperationOutcome::Unchanged }
        });
        result
    }

    /// Deletes a shared event set.
    fn delete_event_set_inner(&mut self, name: &str) -> Result<bool, PolicyError> {
        let Some(entry) = self.names.get(name).copied() else {
            return Ok(false);
        };
        let set = self.named_set(entry)?;
        if set.rule_count() > 0 {
            return Err(PolicyError::Conflict(format!(
                "event set {name} is used by {} rules",
                set.rule_count()
            )));
        }
        if let Some(record) = entry.record {
            self.transact(|store| Ok(store.remove(RecordList::EventSets, record)?))?;
        }
        self.names.remove(name);
        self.event_sets.remove(entry.handle.0);
        Ok(true)
    }

    /// Adds an event binding to a shared event set and rewrites its record.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] when the set does not exist,
    /// [`PolicyError::Conflict`] when the event is already configured (or
    /// uses a reserved action in strict mode), or [`PolicyError::System`]
    /// when persistence fails.
    pub fn add_event(&mut self, set: &str, event: Event) -> Result<(), PolicyError> {
        let subject = format!("{set}/{}", event.id().name());
        let result = self.add_event_inner(set, event);
        self.audit_result(PolicyOperation::AddEvent, subject, &result, |_| {
            OperationOutcome::Applied
        });
        result
    }

    /// Adds an event binding to a shared event set.
    fn add_event_inner(&mut self, set: &str, event: Event) -> Result<(), PolicyError> {
        self.check_strict(&event)?;
        let entry = self.named_entry(set)?;
        let mut updated = self.named_set(entry)?.clone();
        updated.add_event(event)?;
        self.replace_named_set(set, entry, updated)
    }

    /// Clears an event binding from a shared event set. Returns `false` when
    /// the event was not configured.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] when the set does not exist, or
    /// [`PolicyError::System`] when persistence fails.
    pub fn clear_event(&mut self, set: &str, id: EventId) -> Result<bool, PolicyError> {
        let subject = format!("{set}/{}", id.name());
        let result = self.clear_event_inner(set, id);
        self.audit_result(PolicyOperation::ClearEvent, subject, &result, |cleared| {
            if *cleared { OperationOutcome::Applied } else { OperationOutcome::Unchanged }
        });
        result
    }

    /// Clears an event binding from a shared event set.
    fn clear_event_inner(&mut self, set: &str, id: EventId) -> Result<bool, PolicyError> {
        let entry = self.named_entry(set)?;
        let mut updated = self.named_set(entry)?.clone();
        if updated.clear_event(id).is_none() {
            return Ok(false);
        }
        self.replace_named_set(set, entry, updated)?;
        Ok(true)
    }

    /// Persists a rewritten shared set (delete then append) and swaps it in.
    fn replace_named_set(
        &mut self,
        name: &str,
        entry: NamedEventSet,
        updated: EventSet,
    ) -> Result<(), PolicyError> {
        let bytes = codec::encode_event_set(&updated)?;
        let record = self.transact(|store| rewrite(store, entry.record, &bytes))?;
        self.commit_named_set(name, entry.handle, updated, record)
    }

    /// Installs an updated shared set and its new record address.
    fn commit_named_set(
        &mut self,
        name: &str,
        handle: EventSetHandle,
        updated: EventSet,
        record: RecordId,
    ) -> Result<(), PolicyError> {
        let slot = self
            .event_sets
            .get_mut(handle.0)
            .ok_or_else(|| PolicyError::System(format!("event set {name} has a stale handle")))?;
        *slot = updated;
        if let Some(entry) = self.names.get_mut(name) {
            entry.record = Some(record);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Rule mutations
    // ------------------------------------------------------------------------

    /// Inserts a rule at the end of the ordered collection and indexes it.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidArgument`] for a filter without EIDs or
    /// oversized fields, [`PolicyError::Conflict`] for a duplicate id, a full
    /// rule store, or a bad anonymous event, [`PolicyError::NotFound`] for an
    /// unknown named event set, or [`PolicyError::System`] when persistence
    /// fails.
    pub fn insert_rule(&mut self, spec: RuleSpec) -> Result<RuleHandle, PolicyError> {
        let subject = spec.id.to_string();
        let result = self.insert_rule_inner(spec);
        self.audit_result(PolicyOperation::InsertRule, subject, &result, |_| {
            OperationOutcome::Applied
        });
        result
    }

    /// Inserts a rule.
    fn insert_rule_inner(&mut self, spec: RuleSpec) -> Result<RuleHandle, PolicyError> {
        if self.order.len() >= self.config.max_rules {
            return Err(PolicyError::Conflict(format!(
                "rule store is full ({} rules)",
                self.config.max_rules
            )));
        }
        if self.handle_by_id(spec.id).is_some() {
            return Err(PolicyError::Conflict(format!("rule {} already exists", spec.id)));
        }
        if spec.description.len() > MAX_RULE_DESC_LEN {
            return Err(PolicyError::InvalidArgument(format!(
                "rule description exceeds {MAX_RULE_DESC_LEN} bytes"
            )));
        }
        validate_sc_params(&spec.sc_params)?;
        let filter = Filter::build(&spec.filter, &mut self.interner)
            .ok_or_else(|| PolicyError::System("EID interner exhausted".to_string()))?;
        if !filter.is_valid() {
            return Err(PolicyError::InvalidArgument(
                "rule filter requires at least one EID".to_string(),
            ));
        }

        let (flags, binding) = match spec.event_set {
            RuleEventSet::Named(name) => {
                let entry = self.named_entry(name.as_str())?;
                let mut updated = self.named_set(entry)?.clone();
                updated.acquire()?;
                (RuleFlags::default(), SetBinding::Named(name, entry, updated))
            }
            RuleEventSet::Anonymous {
                events,
            } => {
                let mut set = EventSet::new(EventSetName::anonymous(spec.id), None)?;
                for event in events {
                    self.check_strict(&event)?;
                    set.add_event(event)?;
                }
                set.acquire()?;
                (RuleFlags::ANONYMOUS_EVENT_SET, SetBinding::Anonymous(set))
            }
        };

        let record = RuleRecord {
            id: spec.id,
            description: spec.description.clone(),
            flags,
            roles: filter.roles(),
            eids: self.filter_eids(&filter)?,
            block_type: filter.block_type(),
            sc_id: filter.sc_id(),
            service: filter.service(),
            score: filter.score(),
            sc_params: spec.sc_params.clone(),
            event_set: match &binding {
                SetBinding::Named(name, ..) => RuleRecordEventSet::Named(name.clone()),
                SetBinding::Anonymous(set) => RuleRecordEventSet::Anonymous(set.clone()),
            },
        };
        let rule_bytes = codec::encode_rule(&record)?;
        let set_bytes = match &binding {
            SetBinding::Named(_, _, updated) => Some(codec::encode_event_set(updated)?),
            SetBinding::Anonymous(_) => None,
        };
        let set_record = match &binding {
            SetBinding::Named(_, entry, _) => entry.record,
            SetBinding::Anonymous(_) => None,
        };
        let (rule_record, rewritten) = self.transact(|store| {
            let rule_record = store.append(RecordList::Rules, &rule_bytes)?;
            let rewritten = match &set_bytes {
                Some(bytes) => Some(rewrite(store, set_record, bytes)?),
                None => None,
            };
            Ok((rule_record, rewritten))
        })?;

        let set_handle = match binding {
            SetBinding::Named(name, entry, updated) => {
                if let Some(record) = rewritten {
                    self.commit_named_set(name.as_str(), entry.handle, updated, record)?;
                }
                entry.handle
            }
            SetBinding::Anonymous(set) => EventSetHandle(
                self.event_sets
                    .insert(set)
                    .ok_or_else(|| PolicyError::System("event set arena exhausted".to_string()))?,
            ),
        };
        let handle = RuleHandle(
            self.rules
                .insert(Rule {
                    id: spec.id,
                    description: spec.description,
                    position: self.order.len(),
                    flags,
                    filter,
                    sc_params: spec.sc_params,
                    event_set: set_handle,
                    record: Some(rule_record),
                })
                .ok_or_else(|| PolicyError::System("rule arena exhausted".to_string()))?,
        );
        self.order.push(handle);
        self.index_rule(handle)?;
        Ok(handle)
    }

    /// Removes a rule by id. Returns `false` when no such rule exists.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when persistence fails.
    pub fn remove_by_id(&mut self, id: RuleId) -> Result<bool, PolicyError> {
        match self.handle_by_id(id) {
            Some(handle) => self.remove_rule(handle),
            None => {
                let result = Ok(false);
                self.audit_result(PolicyOperation::RemoveRule, id.to_string(), &result, |_| {
                    OperationOutcome::Unchanged
                });
                result
            }
        }
    }

    /// Removes a rule, renumbers every later rule, and destroys its anonymous
    /// event set. Returns `false` for a stale handle.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when persistence fails.
    pub fn remove_rule(&mut self, handle: RuleHandle) -> Result<bool, PolicyError> {
        let subject = self.rule(handle).map_or_else(String::new, |rule| rule.id().to_string());
        let result = self.remove_rule_inner(handle);
        self.audit_result(PolicyOperation::RemoveRule, subject, &result, |removed| {
            if *removed { OperationOutcome::Applied } else { OperationOutcome::Unchanged }
        });
        result
    }

    /// Removes a rule.
    fn remove_rule_inner(&mut self, handle: RuleHandle) -> Result<bool, PolicyError> {
        let Some(rule) = self.rule(handle) else {
            return Ok(false);
        };
        let position = rule.position();
        let rule_record = rule.record;
        let owns_set = rule.owns_event_set();
        let set_handle = rule.event_set();
        let named = if owns_set {
            None
        } else {
            let set = self.event_set(set_handle).ok_or_else(|| {
                PolicyError::System(format!("rule {} has a stale event set handle", rule.id()))
            })?;
            let entry = self.names.get(set.name().as_str()).copied();
            let mut updated = set.clone();
            updated.release();
            let bytes = codec::encode_event_set(&updated)?;
            Some((updated, entry, bytes))
        };

        let rewritten = self.transact(|store| {
            if let Some(record) = rule_record {
                store.remove(RecordList::Rules, record)?;
            }
            match &named {
                Some((_, Some(entry), bytes)) => Ok(Some(rewrite(store, entry.record, bytes)?)),
                _ => Ok(None),
            }
        })?;

        self.unindex_rule(handle)?;
        for later in self.order.iter().skip(position + 1) {
            if let Some(rule) = self.rules.get_mut(later.0) {
                rule.position -= 1;
            }
        }
        if position < self.order.len() {
            self.order.remove(position);
        }
        match named {
            Some((updated, Some(_), _)) => {
                if let Some(record) = rewritten {
                    let name = updated.name().to_string();
                    self.commit_named_set(&name, set_handle, updated, record)?;
                }
            }
            Some((updated, None, _)) => {
                if let Some(slot) = self.event_sets.get_mut(set_handle.0) {
                    *slot = updated;
                }
            }
            None => {
                self.event_sets.remove(set_handle.0);
            }
        }
        self.rules.remove(handle.0);
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------------

    /// Rebuilds all in-memory state from the store: event sets first, then
    /// rules. Records that fail to decode or resolve are skipped and counted;
    /// positions and reference counts are recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when the store cannot be read.
    pub fn restore(&mut self) -> Result<RestoreSummary, PolicyError> {
        let set_records = self.store.records(RecordList::EventSets)?;
        let rule_records = self.store.records(RecordList::Rules)?;
        self.clear();

        let mut summary = RestoreSummary::default();
        for stored in set_records {
            match self.restore_event_set(&stored.bytes, stored.declared_len, stored.id) {
                Ok(()) => summary.event_sets += 1,
                Err(_) => summary.skipped += 1,
            }
        }
        for stored in rule_records {
            match self.restore_rule(&stored.bytes, stored.declared_len, stored.id) {
                Ok(()) => summary.rules += 1,
                Err(_) => summary.skipped += 1,
            }
        }
        self.audit.record_restore(&PolicyRestoreEvent::new(
            summary.event_sets,
            summary.rules,
            summary.skipped,
        ));
        Ok(summary)
    }

    /// Restores one event set record.
    fn restore_event_set(
        &mut self,
        bytes: &[u8],
        declared: usize,
        record: RecordId,
    ) -> Result<(), PolicyError> {
        let mut set = codec::decode_event_set(bytes, declared)?;
        validate_user_name(set.name()).map_err(|err| PolicyError::Corruption(err.to_string()))?;
        if self.names.contains_key(set.name()) {
            return Err(PolicyError::Corruption(format!("duplicate event set {}", set.name())));
        }
        set.reset_rule_count();
        let name = set.name().clone();
        let handle = EventSetHandle(
            self.event_sets
                .insert(set)
                .ok_or_else(|| PolicyError::System("event set arena exhausted".to_string()))?,
        );
        self.names.insert(
            name,
            NamedEventSet {
                handle,
                record: Some(record),
            },
        );
        Ok(())
    }

    /// Restores one rule record.
    fn restore_rule(
        &mut self,
        bytes: &[u8],
        declared: usize,
        record: RecordId,
    ) -> Result<(), PolicyError> {
        let decoded = codec::decode_rule(bytes, declared)?;
        if self.order.len() >= self.config.max_rules {
            return Err(PolicyError::Conflict("rule store is full".to_string()));
        }
        if self.handle_by_id(decoded.id).is_some() {
            return Err(PolicyError::Corruption(format!("duplicate rule {}", decoded.id)));
        }
        let mut eids = [None; 3];
        for field in EidField::ALL {
            if let Some(eid) = decoded.eids[field.offset()].as_deref() {
                let handle = self
                    .interner
                    .intern(eid)
                    .ok_or_else(|| PolicyError::System("EID interner exhausted".to_string()))?;
                eids[field.offset()] = Some(EidCriterion {
                    handle,
                    len: eid.len(),
                    wildcard: is_wildcard_eid(eid),
                });
            }
        }
        let filter = Filter::from_parts(
            decoded.roles,
            eids,
            decoded.block_type,
            decoded.sc_id,
            decoded.service,
        );
        if !filter.is_valid() || filter.score() != decoded.score {
            return Err(PolicyError::Corruption(format!(
                "rule {} filter does not match its recorded score",
                decoded.id
            )));
        }
        let (flags, set_handle) = match decoded.event_set {
            RuleRecordEventSet::Named(name) => {
                let entry = self.names.get(name.as_str()).copied().ok_or_else(|| {
                    PolicyError::Corruption(format!("rule {} uses unknown event set", decoded.id))
                })?;
                let set = self.event_sets.get_mut(entry.handle.0).ok_or_else(|| {
                    PolicyError::System(format!("event set {name} has a stale handle"))
                })?;
                set.acquire()?;
                (RuleFlags::default(), entry.handle)
            }
            RuleRecordEventSet::Anonymous(mut set) => {
                set.reset_rule_count();
                set.acquire()?;
                let handle = self
                    .event_sets
                    .insert(set)
                    .ok_or_else(|| PolicyError::System("event set arena exhausted".to_string()))?;
                (RuleFlags::ANONYMOUS_EVENT_SET, EventSetHandle(handle))
            }
        };
        let handle = RuleHandle(
            self.rules
                .insert(Rule {
                    id: decoded.id,
                    description: decoded.description,
                    position: self.order.len(),
                    flags,
                    filter,
                    sc_params: decoded.sc_params,
                    event_set: set_handle,
                    record: Some(record),
                })
                .ok_or_else(|| PolicyError::System("rule arena exhausted".to_string()))?,
        );
        self.order.push(handle);
        self.index_rule(handle)
    }

    /// Drops all in-memory state, including interned EIDs.
    pub fn clear(&mut self) {
        for index in &mut self.indices {
            index.clear();
        }
        self.order.clear();
        self.rules.clear();
        self.names.clear();
        self.event_sets.clear();
        self.interner.clear();
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Looks up a shared set's name entry.
    fn named_entry(&self, name: &str) -> Result<NamedEventSet, PolicyError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| PolicyError::NotFound(format!("event set {name}")))
    }

    /// Resolves a shared set's name entry.
    fn named_set(&self, entry: NamedEventSet) -> Result<&EventSet, PolicyError> {
        self.event_set(entry.handle)
            .ok_or_else(|| PolicyError::System("event set has a stale handle".to_string()))
    }

    /// Rejects reserved actions in strict mode.
    fn check_strict(&self, event: &Event) -> Result<(), PolicyError> {
        let reserved = event.actions().intersection(ActionMask::RESERVED);
        if self.config.reject_unsupported_actions && !reserved.is_empty() {
            return Err(PolicyError::Conflict(format!(
                "event {} enables unsupported actions {:#04x}",
                event.id().name(),
                reserved.bits()
            )));
        }
        Ok(())
    }

    /// Resolves a filter's EID criteria back to strings.
    fn filter_eids(&self, filter: &Filter) -> Result<[Option<String>; 3], PolicyError> {
        let mut eids = [None, None, None];
        for field in EidField::ALL {
            if let Some(criterion) = filter.eid(field) {
                let eid = self
                    .interner
                    .resolve(criterion.handle)
                    .ok_or_else(|| PolicyError::System("dangling EID handle".to_string()))?;
                eids[field.offset()] = Some(eid.to_string());
            }
        }
        Ok(eids)
    }

    /// Inserts a rule into every index its filter participates in.
    fn index_rule(&mut self, handle: RuleHandle) -> Result<(), PolicyError> {
        let rule = self
            .rules
            .get(handle.0)
            .ok_or_else(|| PolicyError::System("rule has a stale handle".to_string()))?;
        let rank = rule.rank();
        let rules = &self.rules;
        for field in EidField::ALL {
            let Some(criterion) = rule.filter().eid(field) else {
                continue;
            };
            let key = self
                .interner
                .resolve(criterion.handle)
                .ok_or_else(|| PolicyError::System("dangling EID handle".to_string()))?;
            self.indices[field.offset()].insert(key, handle, rank, |other| {
                rules.get(other.0).map(Rule::rank)
            });
        }
        Ok(())
    }

    /// Removes a rule from every index its filter participates in.
    fn unindex_rule(&mut self, handle: RuleHandle) -> Result<(), PolicyError> {
        let rule = self
            .rules
            .get(handle.0)
            .ok_or_else(|| PolicyError::System("rule has a stale handle".to_string()))?;
        for field in EidField::ALL {
            let Some(criterion) = rule.filter().eid(field) else {
                continue;
            };
            let key = self
                .interner
                .resolve(criterion.handle)
                .ok_or_else(|| PolicyError::System("dangling EID handle".to_string()))?;
            self.indices[field.offset()].remove(key, handle);
        }
        Ok(())
    }

    /// Runs `work` inside one store transaction, cancelling on failure.
    fn transact<T>(
        &self,
        work: impl FnOnce(&SharedPolicyStore) -> Result<T, PolicyError>,
    ) -> Result<T, PolicyError> {
        self.store.begin()?;
        let value = match work(&self.store) {
            Ok(value) => value,
            Err(err) => return Err(self.cancel_after(err)),
        };
        if let Err(err) = self.store.commit() {
            return Err(self.cancel_after(err.into()));
        }
        Ok(value)
    }

    /// Rolls back the open transaction after `err`. A failed rollback is a
    /// system error carrying both causes.
    fn cancel_after(&self, err: PolicyError) -> PolicyError {
        match self.store.cancel() {
            Ok(()) => err,
            Err(rollback) => {
                PolicyError::System(format!("{err}; rollback failed: {rollback}"))
            }
        }
    }

    /// Emits a change audit record for an operation result.
    fn audit_result<T>(
        &self,
        operation: PolicyOperation,
        subject: String,
        result: &Result<T, PolicyError>,
        outcome: impl FnOnce(&T) -> OperationOutcome,
    ) {
        let (outcome, error_kind, detail) = match result {
            Ok(value) => (outcome(value), None, None),
            Err(err) => (OperationOutcome::from_error(err), Some(err.kind()), Some(err.to_string())),
        };
        self.audit.record_change(&PolicyChangeEvent::new(PolicyChangeEventParams {
            operation,
            subject,
            outcome,
            error_kind,
            detail,
        }));
    }
}

/// Event set a rule being inserted will use.
enum SetBinding {
    /// Shared set with its updated (acquired) copy.
    Named(EventSetName, NamedEventSet, EventSet),
    /// New anonymous set.
    Anonymous(EventSet),
}

/// Replaces a record: removes the old address if any, appends the new bytes.
fn rewrite(
    store: &SharedPolicyStore,
    old: Option<RecordId>,
    bytes: &[u8],
) -> Result<RecordId, PolicyError> {
    if let Some(old) = old {
        store.remove(RecordList::EventSets, old)?;
    }
    Ok(store.append(RecordList::EventSets, bytes)?)
}

/// Validates security context parameters.
fn validate_sc_params(params: &[ScParam]) -> Result<(), PolicyError> {
    for param in params {
        if param.id == 0 {
            return Err(PolicyError::InvalidArgument(
                "security context parameter id 0 is reserved".to_string(),
            ));
        }
        if param.value.len() > MAX_SC_PARAM_LEN {
            return Err(PolicyError::InvalidArgument(format!(
                "security context parameter {} exceeds {MAX_SC_PARAM_LEN} bytes",
                param.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Shared Engine
// ============================================================================

/// Thread-safe engine handle: shared readers, exclusive writers.
#[derive(Debug, Clone)]
pub struct SharedPolicyEngine {
    /// Engine protected by a read-write lock.
    inner: Arc<RwLock<PolicyEngine>>,
}

impl SharedPolicyEngine {
    /// Wraps an engine for shared use.
    #[must_use]
    pub fn new(engine: PolicyEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Acquires a shared read guard.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when the lock is poisoned.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, PolicyEngine>, PolicyError> {
        self.inner.read().map_err(|_| PolicyError::System("policy engine lock poisoned".to_string()))
    }

    /// Acquires an exclusive write guard.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::System`] when the lock is poisoned.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, PolicyEngine>, PolicyError> {
        self.inner
            .write()
            .map_err(|_| PolicyError::System("policy engine lock poisoned".to_string()))
    }
}
