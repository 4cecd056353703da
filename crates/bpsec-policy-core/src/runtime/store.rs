// crates/bpsec-policy-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Policy Store
// Description: Transactional in-memory record lists for tests and demos.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryPolicyStore`] keeps committed record lists plus one pending copy
//! while a transaction is open. Commit swaps the pending copy in; cancel
//! drops it. Clones share state, so a test can hand one clone to an engine
//! and inspect or corrupt records through another.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::interfaces::PolicyStore;
use crate::interfaces::RecordId;
use crate::interfaces::RecordList;
use crate::interfaces::StoreError;
use crate::interfaces::StoredRecord;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Record lists keyed by list, each in append order.
type Lists = BTreeMap<RecordList, Vec<(RecordId, Vec<u8>)>>;

/// Mutex-protected store state.
#[derive(Debug, Default)]
struct State {
    /// Committed lists.
    committed: Lists,
    /// Working copy of an open transaction.
    pending: Option<Lists>,
    /// Next record id to hand out.
    next_id: u64,
}

/// In-memory policy store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPolicyStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<State>>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("policy store mutex poisoned".to_string()))
    }

    /// Replaces the bytes of a committed record, keeping its address.
    ///
    /// Intended for tests that need to simulate on-disk corruption.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the record does not exist.
    pub fn overwrite(
        &self,
        list: RecordList,
        id: RecordId,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let entry = state
            .committed
            .get_mut(&list)
            .and_then(|records| records.iter_mut().find(|(record, _)| *record == id))
            .ok_or_else(|| StoreError::Invalid(format!("record {id} not found")))?;
        entry.1 = bytes;
        Ok(())
    }

    /// Returns true while a transaction is open.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the state lock is poisoned.
    pub fn in_transaction(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.pending.is_some())
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn begin(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.pending.is_some() {
            return Err(StoreError::Invalid("transaction already open".to_string()));
        }
        state.pending = Some(state.committed.clone());
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let pending = state
            .pending
            .take()
            .ok_or_else(|| StoreError::Invalid("no open transaction".to_string()))?;
        state.committed = pending;
        Ok(())
    }

    fn cancel(&self) -> Result<(), StoreError> {
        self.lock()?.pending = None;
        Ok(())
    }

    fn append(&self, list: RecordList, bytes: &[u8]) -> Result<RecordId, StoreError> {
        let mut state = self.lock()?;
        let id = RecordId::new(state.next_id);
        let pending = state
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::Invalid("append outside transaction".to_string()))?;
        pending.entry(list).or_default().push((id, bytes.to_vec()));
        state.next_id += 1;
        Ok(id)
    }

    fn remove(&self, list: RecordList, id: RecordId) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let pending = state
            .pending
            .as_mut()
            .ok_or_else(|| StoreError::Invalid("remove outside transaction".to_string()))?;
        if let Some(records) = pending.get_mut(&list) {
            records.retain(|(record, _)| *record != id);
        }
        Ok(())
    }

    fn records(&self, list: RecordList) -> Result<Vec<StoredRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .committed
            .get(&list)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, bytes)| StoredRecord {
                        id: *id,
                        declared_len: bytes.len(),
                        bytes: bytes.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::InMemoryPolicyStore;
    use crate::interfaces::PolicyStore;
    use crate::interfaces::RecordList;

    #[test]
    fn cancel_discards_pending_appends() {
        let store = InMemoryPolicyStore::new();
        store.begin().unwrap();
        store.append(RecordList::Rules, b"rule").unwrap();
        store.cancel().unwrap();
        assert!(store.records(RecordList::Rules).unwrap().is_empty());
        assert!(!store.in_transaction().unwrap());
    }

    #[test]
    fn commit_publishes_records_in_append_order() {
        let store = InMemoryPolicyStore::new();
        store.begin().unwrap();
        let first = store.append(RecordList::EventSets, b"a").unwrap();
        store.append(RecordList::EventSets, b"bb").unwrap();
        store.commit().unwrap();
        let records = store.records(RecordList::EventSets).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[1].declared_len, 2);
        assert!(store.append(RecordList::Rules, b"x").is_err());
    }
}
