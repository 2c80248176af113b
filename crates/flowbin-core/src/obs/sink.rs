//! Metrics sink boundary.
//!
//! Each engine owns one `MetricsRecorder`. The recorder folds every event into
//! the engine-local `GroupingStats` and forwards it to an optional caller sink.

use std::{fmt, sync::Arc};

///
/// EngineKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EngineKind {
    Hash,
    Presorted,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    RecordsAdded {
        engine: EngineKind,
        records: u64,
    },
    Spill {
        entries: u64,
        bytes: u64,
    },
    MergePass {
        runs: u64,
        groups: u64,
    },
    GroupsEmitted {
        engine: EngineKind,
        groups: u64,
    },
}

///
/// MetricsSink
///
/// Caller-installed receiver for grouping events. Called synchronously on the
/// engine's thread.
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

///
/// GroupingStats
///
/// Point-in-time counters for one engine instance.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GroupingStats {
    pub records_added: u64,
    pub spills: u64,
    pub spilled_entries: u64,
    pub spilled_bytes: u64,
    pub merge_passes: u64,
    pub merged_runs: u64,
    pub groups_emitted: u64,
}

impl GroupingStats {
    /// Fold one event into the counters.
    pub fn apply(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::RecordsAdded { records, .. } => {
                self.records_added = self.records_added.saturating_add(records);
            }
            MetricsEvent::Spill { entries, bytes } => {
                self.spills = self.spills.saturating_add(1);
                self.spilled_entries = self.spilled_entries.saturating_add(entries);
                self.spilled_bytes = self.spilled_bytes.saturating_add(bytes);
            }
            MetricsEvent::MergePass { runs, .. } => {
                self.merge_passes = self.merge_passes.saturating_add(1);
                self.merged_runs = self.merged_runs.saturating_add(runs);
            }
            MetricsEvent::GroupsEmitted { groups, .. } => {
                self.groups_emitted = self.groups_emitted.saturating_add(groups);
            }
        }
    }
}

///
/// MetricsRecorder
///

#[derive(Default)]
pub(crate) struct MetricsRecorder {
    stats: GroupingStats,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl MetricsRecorder {
    pub(crate) fn set_sink(&mut self, sink: Option<Arc<dyn MetricsSink>>) {
        self.sink = sink;
    }

    #[must_use]
    pub(crate) const fn stats(&self) -> GroupingStats {
        self.stats
    }

    pub(crate) fn record(&mut self, event: MetricsEvent) {
        self.stats.apply(event);
        if let Some(sink) = &self.sink {
            sink.record(event);
        }
    }
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("stats", &self.stats)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
