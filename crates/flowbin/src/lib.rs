//! ## Crate layout
//! - `core`: field lists, the hash and presorted grouping engines, config, and observability.
//! - `primitives`: the flow record, flow sources, and the known-field registry.
//! - `error`: public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module carries everything needed to configure and drive an engine.

pub use flowbin_core as core;
pub use flowbin_primitives as primitives;

pub mod error;

pub use error::{Error, ErrorKind, ErrorOrigin};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        HashGroupingEngine, PresortedStreamEngine, ReadRecordFn,
        config::GroupingConfig,
        field::{CallerField, FieldContext, FieldEntry, FieldId, FieldList},
        group::{DISTINCT_COUNT_WIDTH, GroupIterator, GroupView, MAX_KEY_WIDTH, MAX_VALUE_WIDTH},
        obs::{GroupingStats, MetricsEvent, MetricsSink},
    };
    pub use crate::primitives::{FlowRecord, FlowSource, IterSource, KnownField};
}
