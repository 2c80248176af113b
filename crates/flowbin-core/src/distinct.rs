//! Module: distinct
//! Responsibility: per-group unique-value tracking for distinct fields.
//! Does not own: extraction; callers hand over raw field bytes.
//! Boundary: one `DistinctSet` per distinct field per open group.

use crate::group::DISTINCT_COUNT_WIDTH;
use std::{collections::BTreeSet, mem::size_of, ops::Range};

/// Estimated bookkeeping bytes for one retained distinct value, beyond its width.
pub(crate) const DISTINCT_VALUE_OVERHEAD: usize = size_of::<Box<[u8]>>() + 2 * size_of::<usize>();

///
/// DistinctSet
///
/// Ordered set of raw field values observed for one group. Ordering keeps
/// spill encoding deterministic.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct DistinctSet {
    values: BTreeSet<Box<[u8]>>,
}

impl DistinctSet {
    /// Insert one value and return true if it was newly observed.
    pub(crate) fn insert(&mut self, value: &[u8]) -> bool {
        if self.values.contains(value) {
            return false;
        }

        self.values.insert(Box::from(value))
    }

    /// Insert one already-owned value and return true if it was newly observed.
    pub(crate) fn insert_owned(&mut self, value: Box<[u8]>) -> bool {
        self.values.insert(value)
    }

    /// Move every value of `other` into this set.
    pub(crate) fn absorb(&mut self, other: Self) {
        if self.values.is_empty() {
            self.values = other.values;
            return;
        }
        self.values.extend(other.values);
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.values.iter().map(AsRef::as_ref)
    }
}

///
/// GroupDistinct
///
/// Distinct sets for every distinct field of one group, in field order.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct GroupDistinct {
    sets: Vec<DistinctSet>,
}

impl GroupDistinct {
    pub(crate) fn with_fields(count: usize) -> Self {
        Self {
            sets: vec![DistinctSet::default(); count],
        }
    }

    /// Record each field slice of `buffer` and return estimated bytes newly retained.
    pub(crate) fn observe(
        &mut self,
        ranges: impl Iterator<Item = Range<usize>>,
        buffer: &[u8],
    ) -> usize {
        let mut retained = 0usize;
        for (set, range) in self.sets.iter_mut().zip(ranges) {
            let width = range.len();
            if set.insert(&buffer[range]) {
                retained = retained.saturating_add(width + DISTINCT_VALUE_OVERHEAD);
            }
        }

        retained
    }

    /// Union another group's sets into this one, field by field.
    pub(crate) fn absorb(&mut self, other: Self) {
        for (set, incoming) in self.sets.iter_mut().zip(other.sets) {
            set.absorb(incoming);
        }
    }

    /// Write one big-endian `u64` count per field into `out`.
    pub(crate) fn write_counts(&self, out: &mut [u8]) {
        for (set, slot) in self.sets.iter().zip(out.chunks_exact_mut(DISTINCT_COUNT_WIDTH)) {
            slot.copy_from_slice(&(set.len() as u64).to_be_bytes());
        }
    }

    pub(crate) fn sets(&self) -> &[DistinctSet] {
        &self.sets
    }

    pub(crate) fn sets_mut(&mut self) -> &mut [DistinctSet] {
        &mut self.sets
    }

    /// Empty every set, keeping one slot per field.
    pub(crate) fn clear(&mut self) {
        for set in &mut self.sets {
            *set = DistinctSet::default();
        }
    }
}

///
/// TESTS
///
