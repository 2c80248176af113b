//! Module: group
//! Responsibility: the finalized group shape, the pull contract over groups, and
//! the key/distinct/value schema both engines bind.
//! Does not own: accumulation; engines fold records into groups.
//! Boundary: width limits are enforced here, once, at preparation.

use crate::{
    error::{ErrorOrigin, GroupError},
    field::{FieldId, FieldList},
};
use std::{ops::Range, sync::Arc};

/// Maximum combined width of key and distinct fields, in bytes.
pub const MAX_KEY_WIDTH: usize = 255;

/// Maximum width of value fields, in bytes.
pub const MAX_VALUE_WIDTH: usize = 255;

/// Width of one finalized distinct count (big-endian `u64`).
pub const DISTINCT_COUNT_WIDTH: usize = 8;

///
/// GroupView
///
/// Borrowed (key, distinct, value) triple for one finalized group. The
/// distinct buffer holds one big-endian `u64` count per distinct field.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GroupView<'a> {
    key: &'a [u8],
    distinct: &'a [u8],
    value: &'a [u8],
}

impl<'a> GroupView<'a> {
    #[must_use]
    pub(crate) const fn new(key: &'a [u8], distinct: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            key,
            distinct,
            value,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'a [u8] {
        self.key
    }

    #[must_use]
    pub const fn distinct(&self) -> &'a [u8] {
        self.distinct
    }

    #[must_use]
    pub const fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Distinct count of the `index`th distinct field.
    #[must_use]
    pub fn distinct_count(&self, index: usize) -> Option<u64> {
        let start = index.checked_mul(DISTINCT_COUNT_WIDTH)?;
        let end = start.checked_add(DISTINCT_COUNT_WIDTH)?;
        let slot = self.distinct.get(start..end)?;

        slot.try_into().ok().map(u64::from_be_bytes)
    }

    /// Copy this view into owned buffers.
    #[must_use]
    pub fn to_owned_group(&self) -> OwnedGroup {
        OwnedGroup {
            key: self.key.to_vec(),
            distinct: self.distinct.to_vec(),
            value: self.value.to_vec(),
        }
    }
}

///
/// OwnedGroup
///
/// Owned copy of one finalized group, for callers that outlive an iterator step.
///

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OwnedGroup {
    pub key: Vec<u8>,
    pub distinct: Vec<u8>,
    pub value: Vec<u8>,
}

impl OwnedGroup {
    #[must_use]
    pub fn view(&self) -> GroupView<'_> {
        GroupView::new(&self.key, &self.distinct, &self.value)
    }
}

///
/// GroupIterator
///
/// Pull interface over finalized groups. A returned view borrows the
/// iterator and is invalidated by the next call. Dropping the iterator
/// releases its resources.
///

pub trait GroupIterator {
    /// Restart from the first group.
    fn reset(&mut self) -> Result<(), GroupError>;

    /// Advance to the next group, or `None` when exhausted.
    fn next_group(&mut self) -> Result<Option<GroupView<'_>>, GroupError>;
}

///
/// GroupFields
///
/// Key, distinct, and value field lists bound to one engine. Absent optional
/// lists are stored empty.
///

#[derive(Clone, Debug)]
pub(crate) struct GroupFields {
    pub(crate) key: Arc<FieldList>,
    pub(crate) distinct: Arc<FieldList>,
    pub(crate) value: Arc<FieldList>,
}

impl GroupFields {
    pub(crate) fn new(
        key: Arc<FieldList>,
        distinct: Option<Arc<FieldList>>,
        value: Option<Arc<FieldList>>,
    ) -> Self {
        let empty = || Arc::new(FieldList::new());

        Self {
            key,
            distinct: distinct.unwrap_or_else(empty),
            value: value.unwrap_or_else(empty),
        }
    }

    /// Check schema invariants and derive the buffer layout. A known field
    /// may not be both a key field and a distinct field, since its count
    /// would always be one.
    pub(crate) fn layout(&self, origin: ErrorOrigin) -> Result<GroupLayout, GroupError> {
        if self.key.is_empty() {
            return Err(GroupError::configuration(
                origin,
                "key field list must contain at least one field",
            ));
        }
        if self.distinct.is_empty() && self.value.is_empty() {
            return Err(GroupError::configuration(
                origin,
                "at least one distinct or value field is required",
            ));
        }

        if let Some(shared) = self.known_distinct_in_key() {
            return Err(GroupError::configuration(
                origin,
                format!("distinct field {shared:?} is also a key field"),
            ));
        }

        let key_width = self.key.buffer_size();
        let distinct_width = self.distinct.buffer_size();
        let combined = key_width + distinct_width;
        if combined > MAX_KEY_WIDTH {
            return Err(GroupError::configuration(
                origin,
                format!(
                    "key plus distinct width {combined} exceeds the maximum of {MAX_KEY_WIDTH} bytes"
                ),
            ));
        }
        let value_width = self.value.buffer_size();
        if value_width > MAX_VALUE_WIDTH {
            return Err(GroupError::configuration(
                origin,
                format!("value width {value_width} exceeds the maximum of {MAX_VALUE_WIDTH} bytes"),
            ));
        }

        Ok(GroupLayout {
            key_width,
            distinct_width,
            distinct_ranges: self.distinct.ranges().collect(),
            value_width,
        })
    }

    fn known_distinct_in_key(&self) -> Option<FieldId> {
        self.distinct
            .entries()
            .map(|entry| entry.id())
            .filter(|id| matches!(id, FieldId::Known(_)))
            .find(|id| self.key.entries().any(|key| key.id() == *id))
    }
}

///
/// GroupLayout
///
/// Validated buffer widths for one bound schema.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct GroupLayout {
    pub(crate) key_width: usize,
    pub(crate) distinct_width: usize,
    pub(crate) distinct_ranges: Vec<Range<usize>>,
    pub(crate) value_width: usize,
}

impl GroupLayout {
    #[must_use]
    pub(crate) const fn distinct_fields(&self) -> usize {
        self.distinct_ranges.len()
    }

    /// Width of the finalized distinct-count buffer.
    #[must_use]
    pub(crate) const fn count_width(&self) -> usize {
        self.distinct_fields() * DISTINCT_COUNT_WIDTH
    }

    /// Width of one finalized (key, counts, value) record.
    #[must_use]
    pub(crate) const fn finalized_width(&self) -> usize {
        self.key_width + self.count_width() + self.value_width
    }

    pub(crate) fn distinct_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.distinct_ranges.iter().cloned()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorClass, field::CallerField};
    use flowbin_primitives::{FlowRecord, KnownField};

    struct Opaque(usize);

    impl CallerField for Opaque {
        fn width(&self) -> usize {
            self.0
        }

        fn extract(&self, _: &FlowRecord, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn merge(&self, _: &mut [u8], _: &[u8]) {}
    }

    fn list_of_width(width: usize) -> Arc<FieldList> {
        let mut list = FieldList::new();
        list.add_caller_field(Opaque(width), None).expect("field");
        Arc::new(list)
    }

    fn sum_bytes() -> Arc<FieldList> {
        let mut list = FieldList::new();
        list.add_known_field(KnownField::SumBytes, None);
        Arc::new(list)
    }

    #[test]
    fn key_plus_distinct_at_the_limit_is_accepted() {
        let fields = GroupFields::new(list_of_width(200), Some(list_of_width(55)), None);
        let layout = fields.layout(ErrorOrigin::HashEngine).expect("at limit");

        assert_eq!(layout.key_width + layout.distinct_width, MAX_KEY_WIDTH);
        assert_eq!(layout.count_width(), DISTINCT_COUNT_WIDTH);
    }

    #[test]
    fn one_byte_past_the_key_limit_is_rejected() {
        let fields = GroupFields::new(list_of_width(200), Some(list_of_width(56)), None);
        let err = fields
            .layout(ErrorOrigin::HashEngine)
            .expect_err("past limit");

        assert_eq!(err.class, ErrorClass::Configuration);
    }

    #[test]
    fn value_width_is_bounded_separately() {
        let at_limit = GroupFields::new(list_of_width(4), None, Some(list_of_width(255)));
        let past_limit = GroupFields::new(list_of_width(4), None, Some(list_of_width(256)));

        assert!(at_limit.layout(ErrorOrigin::PresortedEngine).is_ok());
        assert!(past_limit.layout(ErrorOrigin::PresortedEngine).is_err());
    }

    #[test]
    fn key_only_and_keyless_schemas_are_rejected() {
        let key_only = GroupFields::new(list_of_width(4), None, None);
        let keyless = GroupFields::new(Arc::new(FieldList::new()), None, Some(sum_bytes()));
        let empty_lists = GroupFields::new(
            list_of_width(4),
            Some(Arc::new(FieldList::new())),
            Some(Arc::new(FieldList::new())),
        );

        assert!(key_only.layout(ErrorOrigin::HashEngine).is_err());
        assert!(keyless.layout(ErrorOrigin::HashEngine).is_err());
        assert!(empty_lists.layout(ErrorOrigin::HashEngine).is_err());
    }

    #[test]
    fn distinct_field_repeating_a_key_field_is_rejected() {
        let mut key = FieldList::new();
        key.add_known_field(KnownField::SipV4, None);
        key.add_known_field(KnownField::Dport, None);
        let mut distinct = FieldList::new();
        distinct.add_known_field(KnownField::Dport, None);

        let fields = GroupFields::new(Arc::new(key), Some(Arc::new(distinct)), None);
        let err = fields
            .layout(ErrorOrigin::HashEngine)
            .expect_err("dport in key and distinct");

        assert_eq!(err.class, ErrorClass::Configuration);
        assert!(err.message.contains("Dport"));
    }

    #[test]
    fn caller_fields_may_appear_in_key_and_distinct() {
        let fields = GroupFields::new(list_of_width(2), Some(list_of_width(2)), None);

        assert!(fields.layout(ErrorOrigin::HashEngine).is_ok());
    }

    #[test]
    fn distinct_count_reads_each_slot() {
        let mut distinct = Vec::new();
        distinct.extend_from_slice(&3u64.to_be_bytes());
        distinct.extend_from_slice(&7u64.to_be_bytes());
        let view = GroupView::new(&[1], &distinct, &[]);

        assert_eq!(view.distinct_count(0), Some(3));
        assert_eq!(view.distinct_count(1), Some(7));
        assert_eq!(view.distinct_count(2), None);
        assert_eq!(view.to_owned_group().view(), view);
    }
}
