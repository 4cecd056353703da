// crates/bpsec-policy-core/src/core/codec.rs
// ============================================================================
// Module: Policy Record Codec
// Description: Flat byte encoding of rules and event sets.
// Purpose: Serialize policy state into fixed-size store records and back.
// Dependencies: crate::core::{event, event_set, filter, identifiers, rule}, thiserror
// ============================================================================

//! ## Overview
//! Records are built with two primitives: [`RecordWriter::write`] and
//! [`RecordReader::read`]. Each fails when fewer bytes remain than requested
//! and otherwise copies and decrements the remaining count. Writers are sized
//! up front from the value being encoded, so an encoder that disagrees with
//! its size function fails instead of growing the buffer.
//!
//! A decoded record whose consumed byte count differs from its declared
//! length is rejected as corrupt. Integers are little-endian.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::error::PolicyError;
use crate::core::event::ActionMask;
use crate::core::event::ActionParam;
use crate::core::event::Event;
use crate::core::event::EventId;
use crate::core::event_set::EventSet;
use crate::core::filter::EidField;
use crate::core::filter::FilterFlags;
use crate::core::filter::RoleMask;
use crate::core::identifiers::BlockType;
use crate::core::identifiers::EventSetName;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScId;
use crate::core::identifiers::SecurityService;
use crate::core::rule::RuleFlags;
use crate::core::rule::ScParam;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Write exceeded the record's remaining capacity.
    #[error("record overflow: {needed} bytes needed, {remaining} remaining")]
    Overflow {
        /// Bytes requested.
        needed: usize,
        /// Bytes remaining.
        remaining: usize,
    },
    /// Read exceeded the record's remaining bytes.
    #[error("record underflow: {needed} bytes needed, {remaining} remaining")]
    Underflow {
        /// Bytes requested.
        needed: usize,
        /// Bytes remaining.
        remaining: usize,
    },
    /// Consumed length differs from declared length.
    #[error("record length mismatch: declared {declared}, consumed {consumed}")]
    LengthMismatch {
        /// Declared record length.
        declared: usize,
        /// Bytes consumed while decoding.
        consumed: usize,
    },
    /// Field value is out of range or inconsistent.
    #[error("invalid record field: {0}")]
    Invalid(String),
}

impl From<CodecError> for PolicyError {
    fn from(error: CodecError) -> Self {
        Self::Corruption(error.to_string())
    }
}

// ============================================================================
// SECTION: Cursor Primitives
// ============================================================================

/// Fixed-capacity record writer.
#[derive(Debug)]
pub struct RecordWriter {
    /// Bytes written so far.
    buffer: Vec<u8>,
    /// Bytes still available.
    remaining: usize,
}

impl RecordWriter {
    /// Creates a writer with a fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            remaining: capacity,
        }
    }

    /// Copies `bytes` into the record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Overflow`] when fewer than `bytes.len()` bytes
    /// remain; nothing is written in that case.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if self.remaining < bytes.len() {
            return Err(CodecError::Overflow {
                needed: bytes.len(),
                remaining: self.remaining,
            });
        }
        self.buffer.extend_from_slice(bytes);
        self.remaining -= bytes.len();
        Ok(())
    }

    /// Bytes still available.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Finishes the record; unused capacity is an encoder bug.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthMismatch`] when capacity was left unused.
    pub fn finish(self) -> Result<Vec<u8>, CodecError> {
        if self.remaining != 0 {
            return Err(CodecError::LengthMismatch {
                declared: self.buffer.len() + self.remaining,
                consumed: self.buffer.len(),
            });
        }
        Ok(self.buffer)
    }

    /// Writes one byte.
    fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.write(&[value])
    }

    /// Writes a little-endian `u16`.
    fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.write(&value.to_le_bytes())
    }

    /// Writes a little-endian `i16`.
    fn put_i16(&mut self, value: i16) -> Result<(), CodecError> {
        self.write(&value.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    fn put_u64(&mut self, value: u64) -> Result<(), CodecError> {
        self.write(&value.to_le_bytes())
    }

    /// Writes a `u8` length prefix and the bytes.
    fn put_short_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let len = u8::try_from(bytes.len())
            .map_err(|_| CodecError::Invalid(format!("field of {} bytes", bytes.len())))?;
        self.put_u8(len)?;
        self.write(bytes)
    }

    /// Writes a `u16` length prefix and the bytes.
    fn put_long_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| CodecError::Invalid(format!("field of {} bytes", bytes.len())))?;
        self.put_u16(len)?;
        self.write(bytes)
    }
}

/// Bounded record reader.
#[derive(Debug)]
pub struct RecordReader<'a> {
    /// Unread bytes.
    cursor: &'a [u8],
    /// Bytes consumed so far.
    consumed: usize,
}

impl<'a> RecordReader<'a> {
    /// Creates a reader over a record.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: bytes,
            consumed: 0,
        }
    }

    /// Reads exactly `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Underflow`] when fewer than `length` bytes remain.
    pub fn read(&mut self, length: usize) -> Result<&'a [u8], CodecError> {
        if self.cursor.len() < length {
            return Err(CodecError::Underflow {
                needed: length,
                remaining: self.cursor.len(),
            });
        }
        let (head, tail) = self.cursor.split_at(length);
        self.cursor = tail;
        self.consumed += length;
        Ok(head)
    }

    /// Bytes still unread.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.cursor.len()
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.consumed
    }

    /// Reads a fixed-size array.
    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    /// Reads one byte.
    fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    /// Reads a little-endian `u16`.
    fn get_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    /// Reads a little-endian `i16`.
    fn get_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    /// Reads a little-endian `u64`.
    fn get_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    /// Reads a `u8`-prefixed byte string.
    fn get_short_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.get_u8()?;
        self.read(usize::from(len))
    }

    /// Reads a `u16`-prefixed byte string.
    fn get_long_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.get_u16()?;
        self.read(usize::from(len))
    }

    /// Reads a `u8`-prefixed UTF-8 string.
    fn get_short_string(&mut self) -> Result<String, CodecError> {
        utf8(self.get_short_bytes()?)
    }

    /// Reads a `u16`-prefixed UTF-8 string.
    fn get_long_string(&mut self) -> Result<String, CodecError> {
        utf8(self.get_long_bytes()?)
    }
}

/// Decodes UTF-8 record text.
fn utf8(bytes: &[u8]) -> Result<String, CodecError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CodecError::Invalid("string field is not utf-8".to_string()))
}

/// Checks that a whole record was consumed.
fn expect_consumed(reader: &RecordReader<'_>, declared: usize) -> Result<(), CodecError> {
    if reader.consumed() != declared || reader.remaining() != 0 {
        return Err(CodecError::LengthMismatch {
            declared,
            consumed: reader.consumed(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Event Set Records
// ============================================================================

/// Parameter kind tag: reason code.
const PARAM_REASON_CODE: u8 = 1;
/// Parameter kind tag: target flags override.
const PARAM_TARGET_FLAGS: u8 = 2;
/// Parameter kind tag: security block flags override.
const PARAM_SOP_FLAGS: u8 = 3;

/// Encoded size of one action parameter.
const fn param_size(param: &ActionParam) -> usize {
    match param {
        ActionParam::ReasonCode {
            ..
        } => 2,
        ActionParam::TargetFlagsOverride {
            ..
        }
        | ActionParam::SopFlagsOverride {
            ..
        } => 3,
    }
}

/// Encoded size of an event set record.
#[must_use]
pub fn event_set_record_size(set: &EventSet) -> usize {
    let events: usize = set
        .events()
        .iter()
        .map(|event| 4 + event.params().iter().map(param_size).sum::<usize>())
        .sum();
    1 + set.name().as_str().len()
        + 1
        + set.description().map_or(0, str::len)
        + 2
        + 2
        + 1
        + events
}

/// Encodes an event set into a fixed-size record.
///
/// # Errors
///
/// Returns [`CodecError`] when a field exceeds its encodable range.
pub fn encode_event_set(set: &EventSet) -> Result<Vec<u8>, CodecError> {
    let mut writer = RecordWriter::with_capacity(event_set_record_size(set));
    write_event_set(&mut writer, set)?;
    writer.finish()
}

/// Writes event set fields.
fn write_event_set(writer: &mut RecordWriter, set: &EventSet) -> Result<(), CodecError> {
    writer.put_short_bytes(set.name().as_str().as_bytes())?;
    writer.put_short_bytes(set.description().unwrap_or_default().as_bytes())?;
    writer.put_u16(set.mask().bits())?;
    writer.put_u16(set.rule_count())?;
    let count = u8::try_from(set.events().len())
        .map_err(|_| CodecError::Invalid("too many events".to_string()))?;
    writer.put_u8(count)?;
    for event in set.events() {
        writer.put_u16(event.id().bit())?;
        writer.put_u8(event.actions().bits())?;
        let params = u8::try_from(event.params().len())
            .map_err(|_| CodecError::Invalid("too many action parameters".to_string()))?;
        writer.put_u8(params)?;
        for param in event.params() {
            match *param {
                ActionParam::ReasonCode {
                    code,
                } => {
                    writer.put_u8(PARAM_REASON_CODE)?;
                    writer.put_u8(code)?;
                }
                ActionParam::TargetFlagsOverride {
                    mask,
                    value,
                } => {
                    writer.put_u8(PARAM_TARGET_FLAGS)?;
                    writer.put_u8(mask)?;
                    writer.put_u8(value)?;
                }
                ActionParam::SopFlagsOverride {
                    mask,
                    value,
                } => {
                    writer.put_u8(PARAM_SOP_FLAGS)?;
                    writer.put_u8(mask)?;
                    writer.put_u8(value)?;
                }
            }
        }
    }
    Ok(())
}

/// Decodes an event set record of `declared` bytes.
///
/// # Errors
///
/// Returns [`CodecError`] when the record is truncated, inconsistent, or its
/// consumed length differs from `declared`.
pub fn decode_event_set(bytes: &[u8], declared: usize) -> Result<EventSet, CodecError> {
    let mut reader = RecordReader::new(bytes);
    let set = read_event_set(&mut reader)?;
    expect_consumed(&reader, declared)?;
    Ok(set)
}

/// Reads event set fields.
fn read_event_set(reader: &mut RecordReader<'_>) -> Result<EventSet, CodecError> {
    let name = reader.get_short_string()?;
    let description = reader.get_short_string()?;
    let mask = reader.get_u16()?;
    let rule_count = reader.get_u16()?;
    let count = reader.get_u8()?;
    let mut set = EventSet::new(EventSetName::new(name), Some(description))
        .map_err(|err| CodecError::Invalid(err.to_string()))?;
    for _ in 0..count {
        let bit = reader.get_u16()?;
        let id = EventId::from_bit(bit)
            .ok_or_else(|| CodecError::Invalid(format!("unknown event bit {bit:#06x}")))?;
        let actions = ActionMask::from_bits(reader.get_u8()?);
        let param_count = reader.get_u8()?;
        let mut params = Vec::with_capacity(usize::from(param_count));
        for _ in 0..param_count {
            params.push(read_param(reader)?);
        }
        let event = Event::new(id, actions, &params).map_err(|rejection| {
            CodecError::Invalid(format!("event {}: {}", id.name(), PolicyError::from(rejection)))
        })?;
        set.add_event(event).map_err(|err| CodecError::Invalid(err.to_string()))?;
    }
    if set.mask().bits() != mask {
        return Err(CodecError::Invalid(format!(
            "event set mask {mask:#06x} disagrees with events {:#06x}",
            set.mask().bits()
        )));
    }
    set.set_rule_count(rule_count);
    Ok(set)
}

/// Reads one action parameter.
fn read_param(reader: &mut RecordReader<'_>) -> Result<ActionParam, CodecError> {
    match reader.get_u8()? {
        PARAM_REASON_CODE => Ok(ActionParam::ReasonCode {
            code: reader.get_u8()?,
        }),
        PARAM_TARGET_FLAGS => Ok(ActionParam::TargetFlagsOverride {
            mask: reader.get_u8()?,
            value: reader.get_u8()?,
        }),
        PARAM_SOP_FLAGS => Ok(ActionParam::SopFlagsOverride {
            mask: reader.get_u8()?,
            value: reader.get_u8()?,
        }),
        other => Err(CodecError::Invalid(format!("unknown action parameter kind {other}"))),
    }
}

// ============================================================================
// SECTION: Rule Records
// ============================================================================

/// Event set reference carried by a rule record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleRecordEventSet {
    /// Shared set referenced by name.
    Named(EventSetName),
    /// Anonymous set embedded in the rule record.
    Anonymous(EventSet),
}

/// Plain-data form of a rule as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    /// Caller-supplied identifier.
    pub id: RuleId,
    /// Human description.
    pub description: String,
    /// Administrative flags.
    pub flags: RuleFlags,
    /// Role bits.
    pub roles: RoleMask,
    /// EID criteria in [`EidField::ALL`] order.
    pub eids: [Option<String>; 3],
    /// Block type criterion.
    pub block_type: Option<BlockType>,
    /// Security context id criterion.
    pub sc_id: Option<ScId>,
    /// Security service.
    pub service: Option<SecurityService>,
    /// Cached score.
    pub score: u16,
    /// Security context parameters.
    pub sc_params: Vec<ScParam>,
    /// Event set reference.
    pub event_set: RuleRecordEventSet,
}

impl RuleRecord {
    /// Filter flags implied by the record's criteria.
    #[must_use]
    pub fn filter_flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::from_bits(self.roles.bits());
        for field in EidField::ALL {
            if self.eids[field.offset()].is_some() {
                flags.insert(field.flag());
            }
        }
        if self.block_type.is_some() {
            flags.insert(FilterFlags::USE_BLOCK_TYPE);
        }
        if self.sc_id.is_some() {
            flags.insert(FilterFlags::USE_SC_ID);
        }
        flags
    }
}

/// Encoded size of a rule record.
#[must_use]
pub fn rule_record_size(record: &RuleRecord) -> usize {
    let eids: usize = record.eids.iter().flatten().map(|eid| 2 + eid.len()).sum();
    let params: usize = record.sc_params.iter().map(|param| 4 + param.value.len()).sum();
    let event_set = match &record.event_set {
        RuleRecordEventSet::Named(name) => 1 + name.as_str().len(),
        RuleRecordEventSet::Anonymous(set) => 2 + event_set_record_size(set),
    };
    2 + 1
        + record.description.len()
        + 1
        + 1
        + 2
        + eids
        + if record.block_type.is_some() { 8 } else { 0 }
        + if record.sc_id.is_some() { 2 } else { 0 }
        + 1
        + 2
        + params
        + event_set
}

/// Encodes a rule into a fixed-size record.
///
/// # Errors
///
/// Returns [`CodecError`] when a field exceeds its encodable range.
pub fn encode_rule(record: &RuleRecord) -> Result<Vec<u8>, CodecError> {
    let mut writer = RecordWriter::with_capacity(rule_record_size(record));
    writer.put_u16(record.id.get())?;
    writer.put_short_bytes(record.description.as_bytes())?;
    writer.put_u8(record.flags.bits())?;
    writer.put_u8(record.filter_flags().bits())?;
    writer.put_u16(record.score)?;
    for eid in record.eids.iter().flatten() {
        writer.put_long_bytes(eid.as_bytes())?;
    }
    if let Some(block_type) = record.block_type {
        writer.put_u64(block_type.get())?;
    }
    if let Some(sc_id) = record.sc_id {
        writer.put_i16(sc_id.get())?;
    }
    writer.put_u8(record.service.map_or(0, SecurityService::code))?;
    let count = u16::try_from(record.sc_params.len())
        .map_err(|_| CodecError::Invalid("too many security context parameters".to_string()))?;
    writer.put_u16(count)?;
    for param in &record.sc_params {
        writer.put_u16(param.id)?;
        writer.put_long_bytes(&param.value)?;
    }
    match &record.event_set {
        RuleRecordEventSet::Named(name) => writer.put_short_bytes(name.as_str().as_bytes())?,
        RuleRecordEventSet::Anonymous(set) => {
            let len = u16::try_from(event_set_record_size(set))
                .map_err(|_| CodecError::Invalid("anonymous event set too large".to_string()))?;
            writer.put_u16(len)?;
            write_event_set(&mut writer, set)?;
        }
    }
    writer.finish()
}

/// Decodes a rule record of `declared` bytes.
///
/// # Errors
///
/// Returns [`CodecError`] when the record is truncated, inconsistent, or its
/// consumed length differs from `declared`.
pub fn decode_rule(bytes: &[u8], declared: usize) -> Result<RuleRecord, CodecError> {
    let mut reader = RecordReader::new(bytes);
    let id = RuleId::new(reader.get_u16()?);
    let description = reader.get_short_string()?;
    let flags = RuleFlags::from_bits(reader.get_u8()?);
    let filter_flags = FilterFlags::from_bits(reader.get_u8()?);
    let score = reader.get_u16()?;
    let mut eids: [Option<String>; 3] = [None, None, None];
    for field in EidField::ALL {
        if filter_flags.contains(field.flag()) {
            eids[field.offset()] = Some(reader.get_long_string()?);
        }
    }
    let block_type = if filter_flags.contains(FilterFlags::USE_BLOCK_TYPE) {
        Some(BlockType::new(reader.get_u64()?))
    } else {
        None
    };
    let sc_id = if filter_flags.contains(FilterFlags::USE_SC_ID) {
        Some(ScId::new(reader.get_i16()?))
    } else {
        None
    };
    let service = SecurityService::from_code(reader.get_u8()?);
    let count = reader.get_u16()?;
    let mut sc_params = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let param_id = reader.get_u16()?;
        let value = reader.get_long_bytes()?.to_vec();
        sc_params.push(ScParam::new(param_id, value));
    }
    let event_set = if flags.contains(RuleFlags::ANONYMOUS_EVENT_SET) {
        let len = usize::from(reader.get_u16()?);
        let start = reader.consumed();
        let set = read_event_set(&mut reader)?;
        if reader.consumed() - start != len {
            return Err(CodecError::LengthMismatch {
                declared: len,
                consumed: reader.consumed() - start,
            });
        }
        RuleRecordEventSet::Anonymous(set)
    } else {
        RuleRecordEventSet::Named(EventSetName::new(reader.get_short_string()?))
    };
    expect_consumed(&reader, declared)?;
    Ok(RuleRecord {
        id,
        description,
        flags,
        roles: filter_flags.roles(),
        eids,
        block_type,
        sc_id,
        service,
        score,
        sc_params,
        event_set,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::CodecError;
    use super::RecordReader;
    use super::RecordWriter;
    use super::decode_event_set;
    use super::encode_event_set;
    use crate::core::event::ActionMask;
    use crate::core::event::ActionParam;
    use crate::core::event::Event;
    use crate::core::event::EventId;
    use crate::core::event_set::EventSet;
    use crate::core::identifiers::EventSetName;

    #[test]
    fn write_fails_when_capacity_is_short() {
        let mut writer = RecordWriter::with_capacity(3);
        writer.write(&[1, 2]).unwrap();
        let err = writer.write(&[3, 4]).unwrap_err();
        assert_eq!(
            err,
            CodecError::Overflow {
                needed: 2,
                remaining: 1,
            }
        );
        assert_eq!(writer.remaining(), 1);
    }

    #[test]
    fn read_fails_when_bytes_are_short() {
        let bytes = [9_u8, 8, 7];
        let mut reader = RecordReader::new(&bytes);
        assert_eq!(reader.read(2).unwrap(), &[9, 8]);
        assert!(matches!(reader.read(2), Err(CodecError::Underflow { .. })));
        assert_eq!(reader.consumed(), 2);
    }

    #[test]
    fn event_set_record_rejects_trailing_bytes() {
        let mut set = EventSet::new(EventSetName::new("alerts"), Some("ops".to_string())).unwrap();
        let params = [ActionParam::ReasonCode {
            code: 15,
        }];
        set.add_event(
            Event::new(EventId::SopCorruptedAtAcceptor, ActionMask::REPORT_REASON_CODE, &params)
                .unwrap(),
        )
        .unwrap();
        let mut bytes = encode_event_set(&set).unwrap();
        let declared = bytes.len();
        assert_eq!(decode_event_set(&bytes, declared).unwrap(), set);
        bytes.push(0);
        assert!(matches!(
            decode_event_set(&bytes, declared + 1),
            Err(CodecError::LengthMismatch { .. })
        ));
    }
}
