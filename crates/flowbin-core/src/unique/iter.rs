//! Module: unique::iter
//! Responsibility: the two `GroupIterator` implementations behind the hash engine.
//! Does not own: finalization; both iterate results prepared by the engine.
//! Boundary: iterators borrow the engine, so output cannot change under them.

use crate::{
    error::GroupError,
    group::{GroupIterator, GroupLayout, GroupView, OwnedGroup},
    unique::{
        run::{OutputFile, OutputReader},
        table::{GroupBin, GroupTable},
    },
};
use std::collections::hash_map;

///
/// SortedGroupIter
///
/// Sequential scan over key-ordered groups, held in memory or in the
/// finalized output file.
///

pub(crate) struct SortedGroupIter<'a> {
    source: SortedSource<'a>,
    key_width: usize,
    count_width: usize,
}

enum SortedSource<'a> {
    Memory {
        groups: &'a [OwnedGroup],
        next: usize,
    },
    File(OutputReader),
}

impl<'a> SortedGroupIter<'a> {
    pub(crate) const fn memory(groups: &'a [OwnedGroup], layout: &GroupLayout) -> Self {
        Self {
            source: SortedSource::Memory { groups, next: 0 },
            key_width: layout.key_width,
            count_width: layout.count_width(),
        }
    }

    pub(crate) fn file(output: &OutputFile, layout: &GroupLayout) -> Result<Self, GroupError> {
        Ok(Self {
            source: SortedSource::File(OutputReader::open(output)?),
            key_width: layout.key_width,
            count_width: layout.count_width(),
        })
    }
}

impl GroupIterator for SortedGroupIter<'_> {
    fn reset(&mut self) -> Result<(), GroupError> {
        match &mut self.source {
            SortedSource::Memory { next, .. } => {
                *next = 0;
                Ok(())
            }
            SortedSource::File(reader) => reader.rewind(),
        }
    }

    fn next_group(&mut self) -> Result<Option<GroupView<'_>>, GroupError> {
        match &mut self.source {
            SortedSource::Memory { groups, next } => {
                let Some(group) = groups.get(*next) else {
                    return Ok(None);
                };
                *next += 1;

                Ok(Some(group.view()))
            }
            SortedSource::File(reader) => {
                let key_width = self.key_width;
                let count_end = key_width + self.count_width;
                Ok(reader.next_record()?.map(|record| {
                    GroupView::new(
                        &record[..key_width],
                        &record[key_width..count_end],
                        &record[count_end..],
                    )
                }))
            }
        }
    }
}

///
/// BucketGroupIter
///
/// Scan over hash-table buckets in table order.
///

pub(crate) struct BucketGroupIter<'a> {
    table: &'a GroupTable,
    bins: hash_map::Iter<'a, Box<[u8]>, GroupBin>,
}

impl<'a> BucketGroupIter<'a> {
    pub(crate) fn new(table: &'a GroupTable) -> Self {
        Self {
            table,
            bins: table.bins(),
        }
    }
}

impl GroupIterator for BucketGroupIter<'_> {
    fn reset(&mut self) -> Result<(), GroupError> {
        self.bins = self.table.bins();

        Ok(())
    }

    fn next_group(&mut self) -> Result<Option<GroupView<'_>>, GroupError> {
        Ok(self
            .bins
            .next()
            .map(|(key, bin)| GroupView::new(key, &bin.counts, &bin.value)))
    }
}
