//! Module: unique::table
//! Responsibility: the in-memory hash table of open groups and its memory estimate.
//! Does not own: spill policy; the engine decides when the estimate is too high.
//! Boundary: keyed by key bytes only; distinct values live in per-group sets.

use crate::{
    distinct::GroupDistinct,
    group::{GroupFields, GroupLayout},
    unique::run::RunEntry,
};
use flowbin_primitives::FlowRecord;
use std::{
    collections::{HashMap, hash_map},
    mem::size_of,
};
use xxhash_rust::xxh3::Xxh3Builder;

/// Estimated fixed bytes per resident group beyond its key and value buffers.
pub(crate) const GROUP_OVERHEAD: usize =
    size_of::<Box<[u8]>>() + size_of::<GroupBin>() + 2 * size_of::<usize>();

///
/// GroupBin
///
/// Accumulated state of one open group.
///

#[derive(Debug)]
pub(crate) struct GroupBin {
    pub(crate) value: Box<[u8]>,
    pub(crate) distinct: GroupDistinct,

    /// Finalized distinct counts; filled by `GroupTable::finalize`.
    pub(crate) counts: Box<[u8]>,
}

///
/// Scratch
///
/// Reusable per-record extraction buffers sized from one layout.
///

#[derive(Debug)]
pub(crate) struct Scratch {
    key: Vec<u8>,
    distinct: Vec<u8>,
    value: Vec<u8>,
}

impl Scratch {
    pub(crate) fn new(layout: &GroupLayout) -> Self {
        Self {
            key: vec![0; layout.key_width],
            distinct: vec![0; layout.distinct_width],
            value: vec![0; layout.value_width],
        }
    }
}

///
/// GroupTable
///

#[derive(Debug, Default)]
pub(crate) struct GroupTable {
    bins: HashMap<Box<[u8]>, GroupBin, Xxh3Builder>,
    estimated_bytes: usize,
}

impl GroupTable {
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.bins.len()
    }

    #[must_use]
    pub(crate) const fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    /// Fold one record into its group, creating the group on first sight.
    pub(crate) fn add_record(
        &mut self,
        fields: &GroupFields,
        layout: &GroupLayout,
        record: &FlowRecord,
        scratch: &mut Scratch,
    ) {
        fields.key.record_to_buffer(record, &mut scratch.key);

        if !self.bins.contains_key(scratch.key.as_slice()) {
            let mut value = vec![0; layout.value_width].into_boxed_slice();
            fields.value.initialize_buffer(&mut value);
            self.bins.insert(
                Box::from(scratch.key.as_slice()),
                GroupBin {
                    value,
                    distinct: GroupDistinct::with_fields(layout.distinct_fields()),
                    counts: Box::default(),
                },
            );
            self.estimated_bytes = self
                .estimated_bytes
                .saturating_add(layout.key_width + layout.value_width + GROUP_OVERHEAD);
        }
        let Some(bin) = self.bins.get_mut(scratch.key.as_slice()) else {
            return;
        };

        fields
            .value
            .accumulate_record(record, &mut bin.value, &mut scratch.value);
        if layout.distinct_fields() > 0 {
            fields.distinct.record_to_buffer(record, &mut scratch.distinct);
            let retained = bin
                .distinct
                .observe(layout.distinct_ranges(), &scratch.distinct);
            self.estimated_bytes = self.estimated_bytes.saturating_add(retained);
        }
    }

    /// Empty the table into entries sorted by the key order.
    pub(crate) fn drain_sorted(&mut self, fields: &GroupFields) -> Vec<RunEntry> {
        let mut entries: Vec<RunEntry> = self
            .bins
            .drain()
            .map(|(key, bin)| RunEntry {
                key: key.into_vec(),
                value: bin.value.into_vec(),
                distinct: bin.distinct,
            })
            .collect();
        entries.sort_unstable_by(|left, right| fields.key.order_buffers(&left.key, &right.key));
        self.estimated_bytes = 0;

        entries
    }

    /// Compute every group's distinct counts and release the sets.
    pub(crate) fn finalize(&mut self, layout: &GroupLayout) {
        for bin in self.bins.values_mut() {
            let mut counts = vec![0; layout.count_width()].into_boxed_slice();
            bin.distinct.write_counts(&mut counts);
            bin.counts = counts;
            bin.distinct = GroupDistinct::default();
        }
    }

    pub(crate) fn bins(&self) -> hash_map::Iter<'_, Box<[u8]>, GroupBin> {
        self.bins.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.bins = HashMap::default();
        self.estimated_bytes = 0;
    }
}
