// crates/bpsec-policy-core/src/core/event_set.rs
// ============================================================================
// Module: Event Sets
// Description: Named, reference-counted collections of event bindings.
// Purpose: Hold the per-event action configuration that rules point at.
// Dependencies: crate::core::{error, event, identifiers}
// ============================================================================

//! ## Overview
//! An [`EventSet`] maps each configured [`EventId`] to one [`Event`]. The
//! mask mirrors the event list exactly; duplicates are rejected rather than
//! merged. The reference count tracks how many rules use the set and blocks
//! deletion while non-zero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::error::PolicyError;
use crate::core::event::Event;
use crate::core::event::EventId;
use crate::core::event::EventMask;
use crate::core::identifiers::EventSetName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum event set name length in bytes.
pub const MAX_EVENT_SET_NAME_LEN: usize = 32;
/// Maximum event set description length in bytes.
pub const MAX_EVENT_SET_DESC_LEN: usize = 100;

// ============================================================================
// SECTION: Event Set
// ============================================================================

/// Named event set.
///
/// # Invariants
/// - `mask` has exactly the bits of the ids in `events`.
/// - `events` holds at most one entry per event id, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSet {
    /// Unique name.
    name: EventSetName,
    /// Optional description.
    description: Option<String>,
    /// Configured events.
    mask: EventMask,
    /// Event bindings in insertion order.
    events: Vec<Event>,
    /// Number of rules referencing this set.
    rule_count: u16,
}

impl EventSet {
    /// Creates an empty event set after validating its name and description.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidArgument`] when the name is empty or too
    /// long, or the description is too long.
    pub fn new(name: EventSetName, description: Option<String>) -> Result<Self, PolicyError> {
        validate_name(&name)?;
        if let Some(description) = &description
            && description.len() > MAX_EVENT_SET_DESC_LEN
        {
            return Err(PolicyError::InvalidArgument(format!(
                "event set description exceeds {MAX_EVENT_SET_DESC_LEN} bytes"
            )));
        }
        Ok(Self {
            name,
            description: description.filter(|text| !text.is_empty()),
            mask: EventMask::default(),
            events: Vec::new(),
            rule_count: 0,
        })
    }

    /// Event set name.
    #[must_use]
    pub const fn name(&self) -> &EventSetName {
        &self.name
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Configured events mask.
    #[must_use]
    pub const fn mask(&self) -> EventMask {
        self.mask
    }

    /// Event bindings in insertion order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of rules referencing this set.
    #[must_use]
    pub const fn rule_count(&self) -> u16 {
        self.rule_count
    }

    /// Returns the binding for an event id.
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&Event> {
        if !self.mask.contains(id) {
            return None;
        }
        self.events.iter().find(|event| event.id() == id)
    }

    /// Adds an event binding.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Conflict`] when the event id is already
    /// configured; the set is left unchanged.
    pub fn add_event(&mut self, event: Event) -> Result<(), PolicyError> {
        if self.mask.contains(event.id()) {
            return Err(PolicyError::Conflict(format!(
                "event {} already configured in event set {}",
                event.id().name(),
                self.name
            )));
        }
        self.mask.insert(event.id());
        self.events.push(event);
        Ok(())
    }

    /// Clears an event binding, returning it when present.
    pub fn clear_event(&mut self, id: EventId) -> Option<Event> {
        self.mask.remove(id);
        let offset = self.events.iter().position(|event| event.id() == id)?;
        Some(self.events.remove(offset))
    }

    /// Increments the reference count.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Conflict`] when the count would overflow.
    pub(crate) fn acquire(&mut self) -> Result<(), PolicyError> {
        self.rule_count = self.rule_count.checked_add(1).ok_or_else(|| {
            PolicyError::Conflict(format!("event set {} reference count overflow", self.name))
        })?;
        Ok(())
    }

    /// Decrements the reference count, saturating at zero.
    pub(crate) const fn release(&mut self) {
        self.rule_count = self.rule_count.saturating_sub(1);
    }

    /// Resets the reference count (used while restoring from a store).
    pub(crate) const fn reset_rule_count(&mut self) {
        self.rule_count = 0;
    }

    /// Overrides the persisted reference count while decoding.
    pub(crate) const fn set_rule_count(&mut self, rule_count: u16) {
        self.rule_count = rule_count;
    }
}

/// Validates an administrator-supplied event set name.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidArgument`] for empty, overlong, or reserved
/// names.
pub fn validate_user_name(name: &EventSetName) -> Result<(), PolicyError> {
    validate_name(name)?;
    if name.is_reserved() {
        return Err(PolicyError::InvalidArgument(format!(
            "event set name {name} uses the reserved anonymous prefix"
        )));
    }
    Ok(())
}

/// Validates length limits shared by named and anonymous sets.
fn validate_name(name: &EventSetName) -> Result<(), PolicyError> {
    if name.as_str().is_empty() {
        return Err(PolicyError::InvalidArgument("event set name is empty".to_string()));
    }
    if name.as_str().len() > MAX_EVENT_SET_NAME_LEN {
        return Err(PolicyError::InvalidArgument(format!(
            "event set name exceeds {MAX_EVENT_SET_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::EventSet;
    use crate::core::error::PolicyError;
    use crate::core::event::ActionMask;
    use crate::core::event::Event;
    use crate::core::event::EventId;
    use crate::core::identifiers::EventSetName;

    fn report(id: EventId) -> Event {
        Event::new(id, ActionMask::REPORT_REASON_CODE, &[]).unwrap()
    }

    #[test]
    fn duplicate_event_is_rejected_without_change() {
        let mut set = EventSet::new(EventSetName::new("default"), None).unwrap();
        set.add_event(report(EventId::SopVerified)).unwrap();
        let mask = set.mask();
        let err = set.add_event(report(EventId::SopVerified)).unwrap_err();
        assert!(matches!(err, PolicyError::Conflict(_)));
        assert_eq!(set.mask(), mask);
        assert_eq!(set.events().len(), 1);
    }

    #[test]
    fn clear_event_removes_bit_and_binding() {
        let mut set = EventSet::new(EventSetName::new("default"), None).unwrap();
        set.add_event(report(EventId::SopProcessed)).unwrap();
        assert!(set.clear_event(EventId::SopProcessed).is_some());
        assert!(set.mask().is_empty());
        assert!(set.clear_event(EventId::SopProcessed).is_none());
        assert!(set.event(EventId::SopProcessed).is_none());
    }

    #[test]
    fn name_limits_are_enforced() {
        assert!(EventSet::new(EventSetName::new(""), None).is_err());
        assert!(EventSet::new(EventSetName::new("x".repeat(33)), None).is_err());
        assert!(super::validate_user_name(&EventSetName::new("~rule-1")).is_err());
    }
}
