//! Module: unique::spill
//! Responsibility: fold sorted runs into one key-ordered entry stream.
//! Does not own: run encoding (`unique::run`) or pass scheduling (the engine).
//! Boundary: adjacent entries with identical key bytes are folded with the value
//! and distinct merges.

use crate::{
    error::GroupError,
    group::GroupFields,
    merge::KWayMerge,
    unique::run::{EntrySink, RunCursor, RunEntry},
};
use std::sync::Arc;

/// Merge `cursors` into `sink`, one entry per distinct key. Returns the
/// number of entries written.
pub(crate) fn merge_runs<S: EntrySink>(
    fields: &GroupFields,
    cursors: Vec<RunCursor>,
    sink: &mut S,
) -> Result<u64, GroupError> {
    let mut merge = KWayMerge::new(Arc::clone(&fields.key), cursors)?;
    let mut open: Option<RunEntry> = None;
    let mut written = 0u64;

    while let Some(index) = merge.pop() {
        let incoming = merge.cursor_mut(index).take_entry();
        merge.restore(index)?;

        let same_key = open.as_ref().is_some_and(|group| group.key == incoming.key);
        if same_key {
            if let Some(group) = open.as_mut() {
                fields.value.merge_buffers(&mut group.value, &incoming.value);
                group.distinct.absorb(incoming.distinct);
            }
        } else if let Some(done) = open.replace(incoming) {
            sink.accept(&done)?;
            written += 1;
        }
    }
    if let Some(done) = open {
        sink.accept(&done)?;
        written += 1;
    }

    Ok(written)
}
