//! Module: merge
//! Responsibility: comparator-driven k-way merge shared by spill finalization
//! and presorted streaming.
//! Does not own: folding; each engine groups adjacent identical keys itself.
//! Boundary: ordering comes from the bound key `FieldList`, with raw key bytes
//! breaking comparator ties.

mod kway;

pub(crate) use kway::{KWayMerge, MergeCursor};
