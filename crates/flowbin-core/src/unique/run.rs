//! Module: unique::run
//! Responsibility: private on-disk encodings for spill runs and the finalized output file.
//! Does not own: merge ordering or folding; see `unique::spill`.
//! Boundary: files live only inside the engine's `SpillDir` and never outlive it.
//!
//! Run entry: key bytes, value bytes, then for each distinct field a
//! big-endian `u32` count followed by that many sorted raw values.
//! Output record: key bytes, big-endian `u64` distinct counts, value bytes.

use crate::{
    distinct::GroupDistinct,
    error::GroupError,
    group::GroupLayout,
    merge::MergeCursor,
};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    mem,
    path::{Path, PathBuf},
    vec,
};
use tempfile::TempDir;

///
/// SpillDir
///
/// Engine-owned temporary directory, created on first use. Dropping it
/// removes every file inside.
///

#[derive(Debug)]
pub(crate) struct SpillDir {
    parent: Option<PathBuf>,
    dir: Option<TempDir>,
    next_seq: u64,
}

impl SpillDir {
    pub(crate) const fn new(parent: Option<PathBuf>) -> Self {
        Self {
            parent,
            dir: None,
            next_seq: 0,
        }
    }

    /// Create a fresh file named after `label` and the next sequence number.
    pub(crate) fn create_file(&mut self, label: &str) -> Result<(PathBuf, File), GroupError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let path = self.ensure_dir()?.join(format!("{label}-{seq:06}.bin"));
        let file = File::create(&path).map_err(|err| {
            GroupError::run_file_io(format!("cannot create '{}'", path.display()), err)
        })?;

        Ok((path, file))
    }

    fn ensure_dir(&mut self) -> Result<&Path, GroupError> {
        if self.dir.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("flowbin-");
            let dir = match &self.parent {
                Some(parent) => builder.tempdir_in(parent),
                None => builder.tempdir(),
            }
            .map_err(|err| GroupError::run_file_io("cannot create spill directory", err))?;
            log::debug!(
                target: "flowbin::spill",
                "created spill directory {}",
                dir.path().display()
            );
            self.dir = Some(dir);
        }

        self.dir
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| GroupError::run_file_corruption("spill directory vanished"))
    }

    #[must_use]
    pub(crate) fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Remove the directory and everything in it.
    pub(crate) fn close(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                log::warn!(target: "flowbin::spill", "failed to remove {}: {err}", path.display());
            }
        }
    }
}

/// Remove one consumed file, logging instead of failing.
pub(crate) fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != io::ErrorKind::NotFound
    {
        log::warn!(target: "flowbin::spill", "failed to remove {}: {err}", path.display());
    }
}

///
/// RunEntry
///
/// One un-finalized group as it travels through spill and merge.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct RunEntry {
    pub(crate) key: Vec<u8>,
    pub(crate) value: Vec<u8>,
    pub(crate) distinct: GroupDistinct,
}

///
/// RunDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RunDescriptor {
    pub(crate) path: PathBuf,
    pub(crate) entries: u64,
    pub(crate) bytes: u64,
}

///
/// EntrySink
///
/// Destination for merged entries, in ascending key order.
///

pub(crate) trait EntrySink {
    fn accept(&mut self, entry: &RunEntry) -> Result<(), GroupError>;
}

///
/// RunWriter
///

pub(crate) struct RunWriter {
    out: BufWriter<File>,
    path: PathBuf,
    entries: u64,
    bytes: u64,
}

impl RunWriter {
    pub(crate) fn create(dir: &mut SpillDir) -> Result<Self, GroupError> {
        let (path, file) = dir.create_file("run")?;

        Ok(Self {
            out: BufWriter::new(file),
            path,
            entries: 0,
            bytes: 0,
        })
    }

    pub(crate) fn write_entry(
        &mut self,
        key: &[u8],
        value: &[u8],
        distinct: &GroupDistinct,
    ) -> Result<(), GroupError> {
        self.put(key)?;
        self.put(value)?;
        for set in distinct.sets() {
            let count = u32::try_from(set.len()).map_err(|_| {
                GroupError::run_file_corruption("distinct set too large for a run entry")
            })?;
            self.put(&count.to_be_bytes())?;
            for raw in set.iter() {
                self.put(raw)?;
            }
        }
        self.entries += 1;

        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), GroupError> {
        self.out.write_all(bytes).map_err(|err| {
            GroupError::run_file_io(format!("write to '{}' failed", self.path.display()), err)
        })?;
        self.bytes += bytes.len() as u64;

        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<RunDescriptor, GroupError> {
        self.out.flush().map_err(|err| {
            GroupError::run_file_io(format!("flush of '{}' failed", self.path.display()), err)
        })?;

        Ok(RunDescriptor {
            path: self.path,
            entries: self.entries,
            bytes: self.bytes,
        })
    }
}

impl EntrySink for RunWriter {
    fn accept(&mut self, entry: &RunEntry) -> Result<(), GroupError> {
        self.write_entry(&entry.key, &entry.value, &entry.distinct)
    }
}

///
/// RunReader
///
/// Cursor over one run file. Reads exactly the recorded entry count, so a
/// short file surfaces as corruption.
///

pub(crate) struct RunReader {
    input: BufReader<File>,
    path: PathBuf,
    remaining: u64,
    key_width: usize,
    value_width: usize,
    distinct_widths: Vec<usize>,
    current: RunEntry,
}

impl RunReader {
    pub(crate) fn open(run: &RunDescriptor, layout: &GroupLayout) -> Result<Self, GroupError> {
        let file = File::open(&run.path).map_err(|err| {
            GroupError::run_file_io(format!("cannot open '{}'", run.path.display()), err)
        })?;

        Ok(Self {
            input: BufReader::new(file),
            path: run.path.clone(),
            remaining: run.entries,
            key_width: layout.key_width,
            value_width: layout.value_width,
            distinct_widths: layout.distinct_ranges().map(|range| range.len()).collect(),
            current: RunEntry::default(),
        })
    }

    pub(crate) fn entry_mut(&mut self) -> &mut RunEntry {
        &mut self.current
    }

    fn read_entry(&mut self) -> Result<(), GroupError> {
        let entry = &mut self.current;
        entry.key.resize(self.key_width, 0);
        read_exact(&mut self.input, &self.path, &mut entry.key)?;
        entry.value.resize(self.value_width, 0);
        read_exact(&mut self.input, &self.path, &mut entry.value)?;

        entry.distinct = GroupDistinct::with_fields(self.distinct_widths.len());
        for (set, width) in entry
            .distinct
            .sets_mut()
            .iter_mut()
            .zip(self.distinct_widths.iter().copied())
        {
            let mut count = [0u8; 4];
            read_exact(&mut self.input, &self.path, &mut count)?;
            for _ in 0..u32::from_be_bytes(count) {
                let mut raw = vec![0u8; width].into_boxed_slice();
                read_exact(&mut self.input, &self.path, &mut raw)?;
                if !set.insert_owned(raw) {
                    return Err(GroupError::run_file_corruption(format!(
                        "duplicate distinct value in '{}'",
                        self.path.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

impl MergeCursor for RunReader {
    fn key(&self) -> &[u8] {
        &self.current.key
    }

    fn advance(&mut self) -> Result<bool, GroupError> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.read_entry()?;
        self.remaining -= 1;

        Ok(true)
    }
}

fn read_exact(input: &mut impl Read, path: &Path, buf: &mut [u8]) -> Result<(), GroupError> {
    input.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            GroupError::run_file_corruption(format!("'{}' is truncated", path.display()))
        } else {
            GroupError::run_file_io(format!("read of '{}' failed", path.display()), err)
        }
    })
}

///
/// MemoryRun
///
/// Sorted in-memory remainder of the hash table, merged alongside run files.
///

pub(crate) struct MemoryRun {
    entries: vec::IntoIter<RunEntry>,
    current: RunEntry,
}

impl MemoryRun {
    pub(crate) fn new(entries: Vec<RunEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
            current: RunEntry::default(),
        }
    }
}

impl MergeCursor for MemoryRun {
    fn key(&self) -> &[u8] {
        &self.current.key
    }

    fn advance(&mut self) -> Result<bool, GroupError> {
        match self.entries.next() {
            Some(next) => {
                self.current = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

///
/// RunCursor
///

pub(crate) enum RunCursor {
    File(RunReader),
    Memory(MemoryRun),
}

impl RunCursor {
    /// Take the current entry, leaving an empty one behind until the next advance.
    pub(crate) fn take_entry(&mut self) -> RunEntry {
        match self {
            Self::File(reader) => mem::take(reader.entry_mut()),
            Self::Memory(run) => mem::take(&mut run.current),
        }
    }
}

impl MergeCursor for RunCursor {
    fn key(&self) -> &[u8] {
        match self {
            Self::File(reader) => reader.key(),
            Self::Memory(run) => run.key(),
        }
    }

    fn advance(&mut self) -> Result<bool, GroupError> {
        match self {
            Self::File(reader) => reader.advance(),
            Self::Memory(run) => run.advance(),
        }
    }
}

///
/// OutputFile
///
/// Finalized, key-ordered groups as fixed-width records.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct OutputFile {
    pub(crate) path: PathBuf,
    pub(crate) groups: u64,
    pub(crate) record_width: usize,
}

///
/// OutputWriter
///

pub(crate) struct OutputWriter {
    out: BufWriter<File>,
    path: PathBuf,
    groups: u64,
    record_width: usize,
    counts: Vec<u8>,
}

impl OutputWriter {
    pub(crate) fn create(dir: &mut SpillDir, layout: &GroupLayout) -> Result<Self, GroupError> {
        let (path, file) = dir.create_file("groups")?;

        Ok(Self {
            out: BufWriter::new(file),
            path,
            groups: 0,
            record_width: layout.finalized_width(),
            counts: vec![0; layout.count_width()],
        })
    }

    pub(crate) fn finish(mut self) -> Result<OutputFile, GroupError> {
        self.out.flush().map_err(|err| {
            GroupError::run_file_io(format!("flush of '{}' failed", self.path.display()), err)
        })?;

        Ok(OutputFile {
            path: self.path,
            groups: self.groups,
            record_width: self.record_width,
        })
    }
}

impl EntrySink for OutputWriter {
    fn accept(&mut self, entry: &RunEntry) -> Result<(), GroupError> {
        entry.distinct.write_counts(&mut self.counts);
        for part in [&entry.key[..], &self.counts[..], &entry.value[..]] {
            self.out.write_all(part).map_err(|err| {
                GroupError::run_file_io(format!("write to '{}' failed", self.path.display()), err)
            })?;
        }
        self.groups += 1;

        Ok(())
    }
}

///
/// OutputReader
///
/// Sequential reader over an `OutputFile`; rewinds with `rewind`.
///

pub(crate) struct OutputReader {
    input: BufReader<File>,
    path: PathBuf,
    groups: u64,
    remaining: u64,
    record: Vec<u8>,
}

impl OutputReader {
    pub(crate) fn open(output: &OutputFile) -> Result<Self, GroupError> {
        let file = File::open(&output.path).map_err(|err| {
            GroupError::run_file_io(format!("cannot open '{}'", output.path.display()), err)
        })?;

        Ok(Self {
            input: BufReader::new(file),
            path: output.path.clone(),
            groups: output.groups,
            remaining: output.groups,
            record: vec![0; output.record_width],
        })
    }

    pub(crate) fn rewind(&mut self) -> Result<(), GroupError> {
        self.input.seek(SeekFrom::Start(0)).map_err(|err| {
            GroupError::run_file_io(format!("seek in '{}' failed", self.path.display()), err)
        })?;
        self.remaining = self.groups;

        Ok(())
    }

    /// Read the next finalized record, or `None` when exhausted.
    pub(crate) fn next_record(&mut self) -> Result<Option<&[u8]>, GroupError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        read_exact(&mut self.input, &self.path, &mut self.record)?;
        self.remaining -= 1;

        Ok(Some(self.record.as_slice()))
    }
}

///
/// TESTS
///
