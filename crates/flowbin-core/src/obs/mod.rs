//! Observability: grouping counters and the sink boundary engines report through.
//!
//! Engines never log counters themselves; every counter update flows through
//! `MetricsEvent` so caller sinks and `GroupingStats` see the same stream.

pub(crate) mod sink;


pub use sink::{EngineKind, GroupingStats, MetricsEvent, MetricsSink};
