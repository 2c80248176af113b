//! Core grouping engines for flowbin: binary field-list schemas over flow
//! records, a hash grouping engine that spills sorted runs and merges them
//! when memory runs short, and a streaming engine for presorted input.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod error;
pub mod field;
pub mod group;
pub mod obs;

mod distinct;
mod merge;
mod presorted;
mod unique;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use presorted::{PresortedStreamEngine, ReadRecordFn};
pub use unique::HashGroupingEngine;

///
/// Prelude
///
/// Engine entry points plus the vocabulary needed to configure them.
///

pub mod prelude {
    pub use crate::{
        HashGroupingEngine, PresortedStreamEngine,
        config::GroupingConfig,
        error::GroupError,
        field::{CallerField, FieldEntry, FieldId, FieldList},
        group::{GroupIterator, GroupView},
    };
    pub use flowbin_primitives::{FlowRecord, FlowSource, KnownField};
}
