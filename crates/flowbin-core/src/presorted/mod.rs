//! Module: presorted
//! Responsibility: streaming grouping over record sources already sorted by the key.
//! Does not own: source opening or sortedness checks; unsorted input yields
//! repeated groups for one key rather than an error.
//! Boundary: memory is bounded by the distinct values of the one open group.

mod cursor;


use crate::{
    distinct::GroupDistinct,
    error::{ErrorOrigin, GroupError},
    field::FieldList,
    group::{GroupFields, GroupLayout, GroupView},
    merge::{KWayMerge, MergeCursor},
    obs::{EngineKind, GroupingStats, MetricsEvent, MetricsSink, sink::MetricsRecorder},
    presorted::cursor::SourceCursor,
};
use flowbin_primitives::{FlowRecord, FlowSource};
use std::{fmt, io, mem, ops::ControlFlow, sync::Arc};

/// Replacement for `FlowSource::read_record`: `Ok(true)` for a record,
/// `Ok(false)` at end of stream.
pub type ReadRecordFn =
    Arc<dyn Fn(&mut dyn FlowSource, &mut FlowRecord) -> io::Result<bool> + Send + Sync>;

///
/// Phase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Configuring,
    Processed,
    Failed,
    Destroyed,
}

///
/// PresortedStreamEngine
///
/// Merges pre-sorted sources by key and emits each group to a callback as
/// soon as a larger key appears. `process` runs once.
///

pub struct PresortedStreamEngine {
    fields: Option<GroupFields>,
    sources: Vec<Box<dyn FlowSource>>,
    read: Option<ReadRecordFn>,
    phase: Phase,
    metrics: MetricsRecorder,
}

impl PresortedStreamEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: None,
            sources: Vec::new(),
            read: None,
            phase: Phase::Configuring,
            metrics: MetricsRecorder::default(),
        }
    }

    /// Bind the key list and the optional distinct and value lists.
    pub fn set_fields(
        &mut self,
        key: Arc<FieldList>,
        distinct: Option<Arc<FieldList>>,
        value: Option<Arc<FieldList>>,
    ) -> Result<(), GroupError> {
        self.ensure_configuring("set_fields")?;
        self.fields = Some(GroupFields::new(key, distinct, value));

        Ok(())
    }

    /// Replace the bound sources. Each must be sorted by the key fields,
    /// with raw key bytes ordering keys that the field comparators tie.
    pub fn set_flow_sources(
        &mut self,
        sources: Vec<Box<dyn FlowSource>>,
    ) -> Result<(), GroupError> {
        self.ensure_configuring("set_flow_sources")?;
        self.sources = sources;

        Ok(())
    }

    /// Append one source after those already bound.
    pub fn add_flow_source(&mut self, source: Box<dyn FlowSource>) -> Result<(), GroupError> {
        self.ensure_configuring("add_flow_source")?;
        self.sources.push(source);

        Ok(())
    }

    /// Override how one record is read from one source.
    pub fn set_read_record_fn(&mut self, read: Option<ReadRecordFn>) -> Result<(), GroupError> {
        self.ensure_configuring("set_read_record_fn")?;
        self.read = read;

        Ok(())
    }

    pub fn set_metrics_sink(
        &mut self,
        sink: Option<Arc<dyn MetricsSink>>,
    ) -> Result<(), GroupError> {
        self.ensure_configuring("set_metrics_sink")?;
        self.metrics.set_sink(sink);

        Ok(())
    }

    /// Stream every source, calling `output` once per completed group in
    /// ascending key order. The first `Break` stops processing and is
    /// returned as is.
    pub fn process<B>(
        &mut self,
        mut output: impl FnMut(GroupView<'_>) -> ControlFlow<B>,
    ) -> Result<ControlFlow<B>, GroupError> {
        self.ensure_configuring("process")?;
        let fields = self.fields.clone().ok_or_else(|| {
            GroupError::configuration(
                ErrorOrigin::PresortedEngine,
                "fields must be set before process",
            )
        })?;
        let layout = fields.layout(ErrorOrigin::PresortedEngine)?;
        if self.sources.is_empty() {
            return Err(GroupError::configuration(
                ErrorOrigin::PresortedEngine,
                "at least one flow source is required",
            ));
        }

        self.phase = Phase::Processed;
        let sources = mem::take(&mut self.sources);
        self.stream(&fields, &layout, sources, &mut output)
            .map_err(|err| self.poison(err))
    }

    fn stream<B>(
        &mut self,
        fields: &GroupFields,
        layout: &GroupLayout,
        sources: Vec<Box<dyn FlowSource>>,
        output: &mut impl FnMut(GroupView<'_>) -> ControlFlow<B>,
    ) -> Result<ControlFlow<B>, GroupError> {
        let cursors = sources
            .into_iter()
            .enumerate()
            .map(|(ordinal, source)| {
                SourceCursor::new(ordinal, source, self.read.clone(), Arc::clone(&fields.key))
            })
            .collect();
        let mut merge = KWayMerge::new(Arc::clone(&fields.key), cursors)?;
        let mut group = OpenGroup::new(layout);
        let mut tally = Tally::default();

        while let Some(index) = merge.pop() {
            let cursor = merge.cursor(index);
            if group.open
                && group.key.as_slice() != cursor.key()
                && let ControlFlow::Break(status) = tally.emit(&mut group, output)
            {
                self.finish(tally);
                return Ok(ControlFlow::Break(status));
            }
            if !group.open {
                group.start(cursor.key(), fields);
            }
            group.fold(cursor.record(), fields, layout);
            tally.records += 1;
            merge.restore(index)?;
        }

        let flow = if group.open {
            tally.emit(&mut group, output)
        } else {
            ControlFlow::Continue(())
        };
        self.finish(tally);

        Ok(flow)
    }

    fn finish(&mut self, tally: Tally) {
        log::debug!(
            target: "flowbin::presorted",
            "processed {} records into {} groups",
            tally.records,
            tally.groups
        );
        self.metrics.record(MetricsEvent::RecordsAdded {
            engine: EngineKind::Presorted,
            records: tally.records,
        });
        self.metrics.record(MetricsEvent::GroupsEmitted {
            engine: EngineKind::Presorted,
            groups: tally.groups,
        });
    }

    /// Release bound sources. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.sources.clear();
        self.read = None;
        self.fields = None;
        self.phase = Phase::Destroyed;
    }

    #[must_use]
    pub const fn stats(&self) -> GroupingStats {
        self.metrics.stats()
    }

    /// Whether a resource error left this engine usable only for `destroy`.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    fn poison(&mut self, err: GroupError) -> GroupError {
        if err.is_resource() {
            log::warn!(
                target: "flowbin::engine",
                "presorted engine failed: {}",
                err.display_with_class()
            );
            self.phase = Phase::Failed;
        }

        err
    }

    fn ensure_configuring(&self, op: &str) -> Result<(), GroupError> {
        let message = match self.phase {
            Phase::Configuring => return Ok(()),
            Phase::Processed => format!("{op} rejected: process already ran"),
            Phase::Failed => format!("{op} rejected: engine failed and only destroy is allowed"),
            Phase::Destroyed => format!("{op} rejected: engine was destroyed"),
        };

        Err(GroupError::lifecycle(ErrorOrigin::PresortedEngine, message))
    }
}

impl Default for PresortedStreamEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PresortedStreamEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresortedStreamEngine")
            .field("fields", &self.fields)
            .field("sources", &self.sources.len())
            .field("read", &self.read.is_some())
            .field("phase", &self.phase)
            .field("metrics", &self.metrics)
            .finish()
    }
}

///
/// Tally
///

#[derive(Default)]
struct Tally {
    records: u64,
    groups: u64,
}

impl Tally {
    fn emit<B>(
        &mut self,
        group: &mut OpenGroup,
        output: &mut impl FnMut(GroupView<'_>) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        self.groups += 1;
        log::trace!(target: "flowbin::presorted", "emitting group {}", self.groups);

        output(group.close())
    }
}

///
/// OpenGroup
///
/// The single in-flight group. Buffers are reused across groups.
///

struct OpenGroup {
    open: bool,
    key: Vec<u8>,
    value: Vec<u8>,
    distinct: GroupDistinct,
    counts: Vec<u8>,
    value_scratch: Vec<u8>,
    distinct_scratch: Vec<u8>,
}

impl OpenGroup {
    fn new(layout: &GroupLayout) -> Self {
        Self {
            open: false,
            key: Vec::with_capacity(layout.key_width),
            value: vec![0; layout.value_width],
            distinct: GroupDistinct::with_fields(layout.distinct_fields()),
            counts: vec![0; layout.count_width()],
            value_scratch: vec![0; layout.value_width],
            distinct_scratch: vec![0; layout.distinct_width],
        }
    }

    fn start(&mut self, key: &[u8], fields: &GroupFields) {
        self.key.clear();
        self.key.extend_from_slice(key);
        fields.value.initialize_buffer(&mut self.value);
        self.distinct.clear();
        self.open = true;
    }

    fn fold(&mut self, record: &FlowRecord, fields: &GroupFields, layout: &GroupLayout) {
        fields
            .value
            .accumulate_record(record, &mut self.value, &mut self.value_scratch);
        if layout.distinct_fields() > 0 {
            fields
                .distinct
                .record_to_buffer(record, &mut self.distinct_scratch);
            self.distinct
                .observe(layout.distinct_ranges(), &self.distinct_scratch);
        }
    }

    fn close(&mut self) -> GroupView<'_> {
        self.open = false;
        self.distinct.write_counts(&mut self.counts);

        GroupView::new(&self.key, &self.counts, &self.value)
    }
}
