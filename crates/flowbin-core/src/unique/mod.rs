//! Module: unique
//! Responsibility: hash grouping of arbitrarily ordered records, bounded by spilling
//! sorted runs to disk and merging them at finalization.
//! Does not own: record decoding or the field behaviors it drives.
//! Boundary: the engine owns every temporary file it creates and removes them on destroy.

mod iter;
mod run;
mod spill;
mod table;


use crate::{
    config::GroupingConfig,
    error::{ErrorOrigin, GroupError},
    field::FieldList,
    group::{GroupFields, GroupIterator, GroupLayout, OwnedGroup},
    obs::{EngineKind, GroupingStats, MetricsEvent, MetricsSink, sink::MetricsRecorder},
    unique::{
        iter::{BucketGroupIter, SortedGroupIter},
        run::{
            MemoryRun, OutputFile, OutputWriter, RunCursor, RunDescriptor, RunReader, RunWriter,
            SpillDir, discard,
        },
        spill::merge_runs,
        table::{GroupTable, Scratch},
    },
};
use flowbin_primitives::FlowRecord;
use std::{path::PathBuf, sync::Arc};

///
/// Phase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Configuring,
    Accepting,
    Output,
    Failed,
    Destroyed,
}

///
/// Prepared
///
/// Schema state fixed by `prepare_for_input`.
///

#[derive(Debug)]
struct Prepared {
    fields: GroupFields,
    layout: GroupLayout,
    scratch: Scratch,
}

///
/// GroupOutput
///

#[derive(Debug)]
enum GroupOutput {
    /// Finalized groups left in the hash table, in bucket order.
    Buckets,
    /// Key-ordered groups that never left memory.
    Sorted(Vec<OwnedGroup>),
    /// Key-ordered groups produced by the external merge.
    Merged(OutputFile),
}

///
/// HashGroupingEngine
///
/// Groups records by composite key bytes in an in-memory hash table. When
/// the table's estimated size passes the configured limit, it is written to
/// disk as a sorted run and emptied; finalization merges every run with the
/// resident remainder.
///
/// Lifecycle: configure, `prepare_for_input`, `add_record`*,
/// `prepare_for_output`, `iterator_create`*, `destroy`.
///

#[derive(Debug)]
pub struct HashGroupingEngine {
    config: GroupingConfig,
    fields: Option<GroupFields>,
    phase: Phase,
    prepared: Option<Prepared>,
    table: GroupTable,
    spill_dir: SpillDir,
    runs: Vec<RunDescriptor>,
    output: Option<GroupOutput>,
    records: u64,
    metrics: MetricsRecorder,
}

impl HashGroupingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GroupingConfig::default())
    }

    #[must_use]
    pub fn with_config(config: GroupingConfig) -> Self {
        Self {
            config,
            fields: None,
            phase: Phase::Configuring,
            prepared: None,
            table: GroupTable::default(),
            spill_dir: SpillDir::new(None),
            runs: Vec::new(),
            output: None,
            records: 0,
            metrics: MetricsRecorder::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GroupingConfig {
        &self.config
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

    /// Parent directory for spill runs.
    pub fn set_temp_directory(&mut self, dir: impl Into<PathBuf>) -> Result<(), GroupError> {
        self.ensure_configuring("set_temp_directory")?;
        self.config.temp_dir = Some(dir.into());

        Ok(())
    }

    /// Request key-ordered output even when nothing spills.
    pub fn set_sorted_output(&mut self, sorted: bool) -> Result<(), GroupError> {
        self.ensure_configuring("set_sorted_output")?;
        self.config.sorted_output = sorted;

        Ok(())
    }

    pub fn set_memory_limit(&mut self, bytes: usize) -> Result<(), GroupError> {
        self.ensure_configuring("set_memory_limit")?;
        self.config.memory_limit = bytes;

        Ok(())
    }

    pub fn set_max_merge_fanin(&mut self, fanin: usize) -> Result<(), GroupError> {
        self.ensure_configuring("set_max_merge_fanin")?;
        self.config.max_merge_fanin = fanin;

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

    /// Validate configuration and schema, then start accepting records.
    /// Nothing changes when validation fails.
    pub fn prepare_for_input(&mut self) -> Result<(), GroupError> {
        self.ensure_configuring("prepare_for_input")?;
        let fields = self.fields.clone().ok_or_else(|| {
            GroupError::configuration(
                ErrorOrigin::HashEngine,
                "fields must be set before prepare_for_input",
            )
        })?;
        self.config.validate()?;
        let layout = fields.layout(ErrorOrigin::HashEngine)?;

        self.spill_dir = SpillDir::new(self.config.temp_dir.clone());
        self.prepared = Some(Prepared {
            scratch: Scratch::new(&layout),
            fields,
            layout,
        });
        self.phase = Phase::Accepting;

        Ok(())
    }

    /// Fold one record into its group, spilling when the table grows too large.
    pub fn add_record(&mut self, record: &FlowRecord) -> Result<(), GroupError> {
        self.ensure_phase(Phase::Accepting, "add_record")?;
        let Some(prepared) = self.prepared.as_mut() else {
            return Err(GroupError::lifecycle(
                ErrorOrigin::HashEngine,
                "add_record called without prepared fields",
            ));
        };

        self.table.add_record(
            &prepared.fields,
            &prepared.layout,
            record,
            &mut prepared.scratch,
        );
        self.records += 1;

        if self.table.estimated_bytes() > self.config.memory_limit {
            self.spill().map_err(|err| self.poison(err))?;
        }

        Ok(())
    }

    /// Write the whole table to a new sorted run and empty it.
    fn spill(&mut self) -> Result<(), GroupError> {
        let Some(prepared) = self.prepared.as_ref() else {
            return Ok(());
        };
        let estimated = self.table.estimated_bytes();
        let entries = self.table.drain_sorted(&prepared.fields);

        let mut writer = RunWriter::create(&mut self.spill_dir)?;
        for entry in &entries {
            writer.write_entry(&entry.key, &entry.value, &entry.distinct)?;
        }
        let run = writer.finish()?;

        log::debug!(
            target: "flowbin::spill",
            "spilled {} groups ({} estimated bytes) to {} as run {}",
            run.entries,
            estimated,
            run.path.display(),
            self.runs.len()
        );
        self.metrics.record(MetricsEvent::Spill {
            entries: run.entries,
            bytes: run.bytes,
        });
        self.runs.push(run);

        Ok(())
    }

    /// Stop accepting records and finalize every group.
    pub fn prepare_for_output(&mut self) -> Result<(), GroupError> {
        self.ensure_phase(Phase::Accepting, "prepare_for_output")?;
        self.metrics.record(MetricsEvent::RecordsAdded {
            engine: EngineKind::Hash,
            records: self.records,
        });

        let output = self.finalize().map_err(|err| self.poison(err))?;
        let groups = match &output {
            GroupOutput::Buckets => self.table.len() as u64,
            GroupOutput::Sorted(groups) => groups.len() as u64,
            GroupOutput::Merged(file) => file.groups,
        };
        log::debug!(
            target: "flowbin::output",
            "prepared {groups} groups from {} records ({} runs)",
            self.records,
            self.metrics.stats().spills
        );
        self.metrics.record(MetricsEvent::GroupsEmitted {
            engine: EngineKind::Hash,
            groups,
        });
        self.output = Some(output);
        self.phase = Phase::Output;

        Ok(())
    }

    fn finalize(&mut self) -> Result<GroupOutput, GroupError> {
        let Some(prepared) = self.prepared.as_ref() else {
            return Err(GroupError::lifecycle(
                ErrorOrigin::HashEngine,
                "prepare_for_output called without prepared fields",
            ));
        };
        let fields = prepared.fields.clone();
        let layout = prepared.layout.clone();

        if self.runs.is_empty() {
            if !self.config.sorted_output {
                self.table.finalize(&layout);
                return Ok(GroupOutput::Buckets);
            }

            let mut counts = vec![0; layout.count_width()];
            let groups = self
                .table
                .drain_sorted(&fields)
                .into_iter()
                .map(|entry| {
                    entry.distinct.write_counts(&mut counts);
                    OwnedGroup {
                        key: entry.key,
                        distinct: counts.clone(),
                        value: entry.value,
                    }
                })
                .collect();

            return Ok(GroupOutput::Sorted(groups));
        }

        let remainder = self.table.drain_sorted(&fields);
        let resident = usize::from(!remainder.is_empty());
        let mut runs = std::mem::take(&mut self.runs);
        while runs.len() + resident > self.config.max_merge_fanin {
            let take = self.config.max_merge_fanin.min(runs.len());
            let batch: Vec<RunDescriptor> = runs.drain(..take).collect();
            runs.push(self.merge_pass(&fields, &layout, &batch)?);
        }

        let mut cursors = open_runs(&runs, &layout)?;
        if resident > 0 {
            cursors.push(RunCursor::Memory(MemoryRun::new(remainder)));
        }
        let mut writer = OutputWriter::create(&mut self.spill_dir, &layout)?;
        let groups = merge_runs(&fields, cursors, &mut writer)?;
        let output = writer.finish()?;
        self.metrics.record(MetricsEvent::MergePass {
            runs: (runs.len() + resident) as u64,
            groups,
        });
        for run in &runs {
            discard(&run.path);
        }

        Ok(GroupOutput::Merged(output))
    }

    /// Merge one batch of runs into a single intermediate run.
    fn merge_pass(
        &mut self,
        fields: &GroupFields,
        layout: &GroupLayout,
        batch: &[RunDescriptor],
    ) -> Result<RunDescriptor, GroupError> {
        let cursors = open_runs(batch, layout)?;
        let mut writer = RunWriter::create(&mut self.spill_dir)?;
        let groups = merge_runs(fields, cursors, &mut writer)?;
        let merged = writer.finish()?;
        for run in batch {
            discard(&run.path);
        }

        log::debug!(
            target: "flowbin::merge",
            "merged {} runs into {} ({groups} groups)",
            batch.len(),
            merged.path.display()
        );
        self.metrics.record(MetricsEvent::MergePass {
            runs: batch.len() as u64,
            groups,
        });

        Ok(merged)
    }

    /// Open a pull iterator over the finalized groups. Groups arrive in
    /// ascending key order when sorted output was requested or any spill
    /// happened, and in bucket order otherwise.
    pub fn iterator_create(&self) -> Result<Box<dyn GroupIterator + '_>, GroupError> {
        self.ensure_phase(Phase::Output, "iterator_create")?;
        let (Some(output), Some(prepared)) = (self.output.as_ref(), self.prepared.as_ref()) else {
            return Err(GroupError::lifecycle(
                ErrorOrigin::HashEngine,
                "iterator_create called without finalized output",
            ));
        };

        let iter: Box<dyn GroupIterator + '_> = match output {
            GroupOutput::Buckets => Box::new(BucketGroupIter::new(&self.table)),
            GroupOutput::Sorted(groups) => {
                Box::new(SortedGroupIter::memory(groups, &prepared.layout))
            }
            GroupOutput::Merged(file) => Box::new(SortedGroupIter::file(file, &prepared.layout)?),
        };

        Ok(iter)
    }

    /// Whether iterators yield groups in ascending key order.
    #[must_use]
    pub const fn output_is_sorted(&self) -> bool {
        matches!(
            self.output,
            Some(GroupOutput::Sorted(_) | GroupOutput::Merged(_))
        )
    }

    /// Release every group and temporary file. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.phase == Phase::Destroyed {
            return;
        }
        self.output = None;
        self.table.clear();
        self.runs.clear();
        self.spill_dir.close();
        self.prepared = None;
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
                "hash engine failed: {}",
                err.display_with_class()
            );
            self.phase = Phase::Failed;
        }

        err
    }

    fn ensure_configuring(&self, op: &str) -> Result<(), GroupError> {
        self.ensure_phase(Phase::Configuring, op)
    }

    fn ensure_phase(&self, expected: Phase, op: &str) -> Result<(), GroupError> {
        if self.phase == expected {
            return Ok(());
        }
        let message = match self.phase {
            Phase::Failed => format!("{op} rejected: engine failed and only destroy is allowed"),
            Phase::Destroyed => format!("{op} rejected: engine was destroyed"),
            phase => format!("{op} is not valid while the engine is {phase:?}"),
        };

        Err(GroupError::lifecycle(ErrorOrigin::HashEngine, message))
    }
}

impl Default for HashGroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HashGroupingEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn open_runs(runs: &[RunDescriptor], layout: &GroupLayout) -> Result<Vec<RunCursor>, GroupError> {
    runs.iter()
        .map(|run| RunReader::open(run, layout).map(RunCursor::File))
        .collect()
}
