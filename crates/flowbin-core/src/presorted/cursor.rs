use crate::{
    error::GroupError,
    field::FieldList,
    merge::MergeCursor,
    presorted::ReadRecordFn,
};
use flowbin_primitives::{FlowRecord, FlowSource};
use std::sync::Arc;

///
/// SourceCursor
///
/// One bound flow source positioned on its current record, with that
/// record's key bytes extracted.
///

pub(super) struct SourceCursor {
    ordinal: usize,
    source: Box<dyn FlowSource>,
    read: Option<ReadRecordFn>,
    key_fields: Arc<FieldList>,
    record: FlowRecord,
    key: Vec<u8>,
}

impl SourceCursor {
    pub(super) fn new(
        ordinal: usize,
        source: Box<dyn FlowSource>,
        read: Option<ReadRecordFn>,
        key_fields: Arc<FieldList>,
    ) -> Self {
        let key = vec![0; key_fields.buffer_size()];

        Self {
            ordinal,
            source,
            read,
            key_fields,
            record: FlowRecord::default(),
            key,
        }
    }

    pub(super) const fn record(&self) -> &FlowRecord {
        &self.record
    }
}

impl MergeCursor for SourceCursor {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn advance(&mut self) -> Result<bool, GroupError> {
        let read = match &self.read {
            Some(read) => read(self.source.as_mut(), &mut self.record),
            None => self.source.read_record(&mut self.record),
        };
        let more = read.map_err(|err| {
            GroupError::source_read(format!("flow source {} failed to read", self.ordinal), err)
        })?;
        if more {
            self.key_fields.record_to_buffer(&self.record, &mut self.key);
        }

        Ok(more)
    }
}
