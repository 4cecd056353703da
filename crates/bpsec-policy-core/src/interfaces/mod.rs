// crates/bpsec-policy-core/src/interfaces/mod.rs
// ============================================================================
// Module: BPSec Policy Interfaces
// Description: Collaborator contracts for persistence and bundle mutation.
// Purpose: Keep the engine independent of storage and bundle processing.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The engine talks to two collaborators:
//! - [`PolicyStore`]: transactional, ordered lists of opaque byte records,
//!   one list for rules and one for event sets.
//! - [`BundleMutator`]: the bundle being transmitted or acquired; used only
//!   by the dispatcher to carry out optional processing actions.
//!
//! [`SecurityContextCatalog`] answers which services a security context
//! supports, for sender-side rule lookups.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::BlockNumber;
use crate::core::BlockType;
use crate::core::PolicyError;
use crate::core::ScId;
use crate::core::SecurityService;

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Persistent record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordList {
    /// Serialized rules.
    Rules,
    /// Serialized event sets.
    EventSets,
}

impl RecordList {
    /// Stable label used by stores.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::EventSets => "event_sets",
        }
    }
}

/// Address of a persisted record within its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    /// Creates a record id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Persisted record with its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Record address.
    pub id: RecordId,
    /// Declared record length in bytes.
    pub declared_len: usize,
    /// Record bytes.
    pub bytes: Vec<u8>,
}

/// Policy store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("policy store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("policy store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("policy store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store request or data is invalid.
    #[error("policy store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("policy store error: {0}")]
    Store(String),
}

impl From<StoreError> for PolicyError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Corrupt(message) => Self::Corruption(message),
            other => Self::System(other.to_string()),
        }
    }
}

/// Transactional record store backing the policy engine.
///
/// Mutations happen between [`PolicyStore::begin`] and either
/// [`PolicyStore::commit`] or [`PolicyStore::cancel`]. Appends keep list
/// order; [`PolicyStore::records`] yields records in append order.
pub trait PolicyStore {
    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a transaction is already open or the
    /// store cannot start one.
    fn begin(&self) -> Result<(), StoreError>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no transaction is open or commit fails.
    fn commit(&self) -> Result<(), StoreError>;

    /// Discards the open transaction. Cancelling with no open transaction is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when rollback fails.
    fn cancel(&self) -> Result<(), StoreError>;

    /// Appends a record to a list inside the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no transaction is open or the write fails.
    fn append(&self, list: RecordList, bytes: &[u8]) -> Result<RecordId, StoreError>;

    /// Removes a record from a list inside the open transaction. Removing an
    /// absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when no transaction is open or the delete fails.
    fn remove(&self, list: RecordList, id: RecordId) -> Result<(), StoreError>;

    /// Returns every committed record of a list in append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the list cannot be read.
    fn records(&self, list: RecordList) -> Result<Vec<StoredRecord>, StoreError>;
}

/// Shared policy store wrapper.
#[derive(Clone)]
pub struct SharedPolicyStore {
    /// Inner store implementation.
    inner: Arc<dyn PolicyStore + Send + Sync>,
}

impl SharedPolicyStore {
    /// Wraps a store in an `Arc` for shared use.
    #[must_use]
    pub fn from_store(store: impl PolicyStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(inner: Arc<dyn PolicyStore + Send + Sync>) -> Self {
        Self {
            inner,
        }
    }
}

impl fmt::Debug for SharedPolicyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPolicyStore").finish_non_exhaustive()
    }
}

impl PolicyStore for SharedPolicyStore {
    fn begin(&self) -> Result<(), StoreError> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<(), StoreError> {
        self.inner.commit()
    }

    fn cancel(&self) -> Result<(), StoreError> {
        self.inner.cancel()
    }

    fn append(&self, list: RecordList, bytes: &[u8]) -> Result<RecordId, StoreError> {
        self.inner.append(list, bytes)
    }

    fn remove(&self, list: RecordList, id: RecordId) -> Result<(), StoreError> {
        self.inner.remove(list, id)
    }

    fn records(&self, list: RecordList) -> Result<Vec<StoredRecord>, StoreError> {
        self.inner.records(list)
    }
}

// ============================================================================
// SECTION: Bundle Mutator
// ============================================================================

/// Bundle collaborator errors.
#[derive(Debug, Error)]
pub enum MutatorError {
    /// The bundle could not be modified.
    #[error("bundle mutation failed: {0}")]
    Failed(String),
    /// The status report could not be sent.
    #[error("status report failed: {0}")]
    Report(String),
}

impl From<MutatorError> for PolicyError {
    fn from(error: MutatorError) -> Self {
        Self::System(error.to_string())
    }
}

/// Bundle being processed by the dispatcher.
///
/// Sender-side implementations wrap an outbound bundle; receiver-side
/// implementations wrap an inbound acquisition work area. Methods returning
/// `bool` report whether the referenced block was found.
pub trait BundleMutator {
    /// Bundle source EID, if readable.
    fn bundle_source(&self) -> Option<String>;

    /// Bundle destination EID, if readable.
    fn bundle_destination(&self) -> Option<String>;

    /// Block type of an extension block by number.
    fn block_type(&self, number: BlockNumber) -> Option<BlockType>;

    /// Deletes a block from the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the bundle cannot be modified.
    fn delete_block(&mut self, number: BlockNumber) -> Result<bool, MutatorError>;

    /// Drops `target` from the security block's target list.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the bundle cannot be modified.
    fn detach_target(
        &mut self,
        security_block: BlockNumber,
        target: BlockNumber,
    ) -> Result<bool, MutatorError>;

    /// Security blocks that list `target` among their targets.
    fn security_blocks_targeting(&self, target: BlockNumber) -> Vec<BlockNumber>;

    /// Marks the bundle corrupt so it is abandoned.
    fn mark_corrupt(&mut self);

    /// Suspends forwarding of the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the bundle cannot be suspended.
    fn suspend(&mut self) -> Result<(), MutatorError>;

    /// Sends a bundle status report with the given reason code.
    ///
    /// # Errors
    ///
    /// Returns [`MutatorError`] when the report cannot be sent.
    fn send_status_report(&mut self, reason_code: u8) -> Result<(), MutatorError>;
}

// ============================================================================
// SECTION: Security Context Catalog
// ============================================================================

/// Registry of security contexts known to the node.
pub trait SecurityContextCatalog {
    /// Returns true when the context exists and offers the service.
    fn supports(&self, sc_id: ScId, service: SecurityService) -> bool;
}
