//! Module: field
//! Responsibility: ordered binary schemas over flow records and their per-field behaviors.
//! Does not own: width limits; engines validate combined widths when they prepare.
//! Boundary: engines only touch record bytes through a bound `FieldList`.

mod caller;
mod known;

#[cfg(test)]
mod tests;

pub use caller::CallerField;

use crate::error::FieldError;
use flowbin_primitives::{FlowRecord, KnownField};
use std::{
    any::Any,
    cmp::Ordering,
    fmt,
    ops::Range,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
};

/// Opaque caller value attached to a field and returned through its handle.
pub type FieldContext = Arc<dyn Any + Send + Sync>;

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

///
/// FieldId
///
/// Stable identifier of one field: a known semantic attribute, or a
/// caller-defined field that is opaque to the list.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldId {
    Known(KnownField),
    Caller,
}

///
/// FieldEntry
///
/// Copyable handle to one field of one list. Only the list that issued it
/// accepts it back.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FieldEntry {
    list_id: u64,
    index: usize,
    id: FieldId,
    offset: usize,
    width: usize,
}

impl FieldEntry {
    #[must_use]
    pub const fn id(&self) -> FieldId {
        self.id
    }

    /// Position of this field in addition order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.width
    }
}

///
/// FieldBehavior
///

#[derive(Clone)]
enum FieldBehavior {
    Known(KnownField),
    Caller(Arc<dyn CallerField>),
}

impl FieldBehavior {
    fn extract(&self, record: &FlowRecord, dest: &mut [u8]) {
        match self {
            Self::Known(field) => known::extract(*field, record, dest),
            Self::Caller(field) => field.extract(record, dest),
        }
    }

    fn merge(&self, acc: &mut [u8], other: &[u8]) {
        match self {
            Self::Known(field) => known::merge(field.merge_rule(), acc, other),
            Self::Caller(field) => field.merge(acc, other),
        }
    }

    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        match self {
            Self::Known(_) => left.cmp(right),
            Self::Caller(field) => field.compare(left, right),
        }
    }

    fn seed(&self, dest: &mut [u8]) {
        match self {
            Self::Known(field) => dest.fill(field.merge_rule().seed_octet()),
            Self::Caller(field) => match field.initial_value() {
                Some(initial) => dest.copy_from_slice(initial),
                None => dest.fill(0),
            },
        }
    }
}

impl fmt::Debug for FieldBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(field) => f.debug_tuple("Known").field(field).finish(),
            Self::Caller(field) => f.debug_tuple("Caller").field(&field.width()).finish(),
        }
    }
}

///
/// Field
///

#[derive(Clone)]
struct Field {
    entry: FieldEntry,
    behavior: FieldBehavior,
    context: Option<FieldContext>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("entry", &self.entry)
            .field("behavior", &self.behavior)
            .field("context", &self.context.is_some())
            .finish()
    }
}

///
/// FieldList
///
/// Ordered composition of fields. Offsets are contiguous in addition order
/// and never change. Engines take the list behind an `Arc`, after which it
/// can no longer grow.
///

#[derive(Debug)]
pub struct FieldList {
    id: u64,
    fields: Vec<Field>,
    width: usize,
}

impl FieldList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_LIST_ID.fetch_add(1, AtomicOrdering::Relaxed),
            fields: Vec::new(),
            width: 0,
        }
    }

    /// Append a built-in field with its canonical width and behaviors.
    pub fn add_known_field(
        &mut self,
        field: KnownField,
        context: Option<FieldContext>,
    ) -> FieldEntry {
        self.push(
            FieldId::Known(field),
            field.width(),
            FieldBehavior::Known(field),
            context,
        )
    }

    /// Append a caller-defined field.
    pub fn add_caller_field(
        &mut self,
        field: impl CallerField + 'static,
        context: Option<FieldContext>,
    ) -> Result<FieldEntry, FieldError> {
        let width = field.width();
        if width == 0 {
            return Err(FieldError::ZeroWidth);
        }
        if let Some(initial) = field.initial_value()
            && initial.len() != width
        {
            return Err(FieldError::InitialValueWidth {
                expected: width,
                actual: initial.len(),
            });
        }

        Ok(self.push(
            FieldId::Caller,
            width,
            FieldBehavior::Caller(Arc::new(field)),
            context,
        ))
    }

    fn push(
        &mut self,
        id: FieldId,
        width: usize,
        behavior: FieldBehavior,
        context: Option<FieldContext>,
    ) -> FieldEntry {
        let entry = FieldEntry {
            list_id: self.id,
            index: self.fields.len(),
            id,
            offset: self.width,
            width,
        };
        self.width += width;
        self.fields.push(Field {
            entry,
            behavior,
            context,
        });

        entry
    }

    /// Total composite buffer width in bytes.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate field handles in addition order.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = FieldEntry> + '_ {
        self.fields.iter().map(|field| field.entry)
    }

    /// Return the context attached when `entry` was added.
    pub fn context(&self, entry: &FieldEntry) -> Result<Option<&FieldContext>, FieldError> {
        Ok(self.field(entry)?.context.as_ref())
    }

    /// Borrow one field's slice of a composite buffer.
    pub fn field_bytes<'a>(
        &self,
        buffer: &'a [u8],
        entry: &FieldEntry,
    ) -> Result<&'a [u8], FieldError> {
        let field = self.field(entry)?;
        self.check_buffer(buffer.len())?;

        Ok(&buffer[field.entry.range()])
    }

    /// Copy one field's slice of a composite buffer into `out`.
    pub fn extract_from_buffer(
        &self,
        buffer: &[u8],
        entry: &FieldEntry,
        out: &mut [u8],
    ) -> Result<(), FieldError> {
        let bytes = self.field_bytes(buffer, entry)?;
        if out.len() < bytes.len() {
            return Err(FieldError::BufferTooShort {
                expected: bytes.len(),
                actual: out.len(),
            });
        }
        out[..bytes.len()].copy_from_slice(bytes);

        Ok(())
    }

    fn field(&self, entry: &FieldEntry) -> Result<&Field, FieldError> {
        if entry.list_id != self.id {
            return Err(FieldError::ForeignEntry { index: entry.index });
        }
        self.fields
            .get(entry.index)
            .ok_or(FieldError::ForeignEntry { index: entry.index })
    }

    const fn check_buffer(&self, len: usize) -> Result<(), FieldError> {
        if len < self.width {
            return Err(FieldError::BufferTooShort {
                expected: self.width,
                actual: len,
            });
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Engine-facing buffer operations. Every buffer is exactly
    // `buffer_size()` bytes; engines size them at preparation.
    // ------------------------------------------------------------------

    /// Byte ranges of every field, in addition order.
    pub(crate) fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.fields.iter().map(|field| field.entry.range())
    }

    /// Extract every field of `record` into `dest`.
    pub(crate) fn record_to_buffer(&self, record: &FlowRecord, dest: &mut [u8]) {
        for field in &self.fields {
            field
                .behavior
                .extract(record, &mut dest[field.entry.range()]);
        }
    }

    /// Seed a fresh accumulator with each field's initial value.
    pub(crate) fn initialize_buffer(&self, dest: &mut [u8]) {
        for field in &self.fields {
            field.behavior.seed(&mut dest[field.entry.range()]);
        }
    }

    /// Fold one record into an accumulator, using `scratch` for extraction.
    pub(crate) fn accumulate_record(
        &self,
        record: &FlowRecord,
        acc: &mut [u8],
        scratch: &mut [u8],
    ) {
        for field in &self.fields {
            let range = field.entry.range();
            field.behavior.extract(record, &mut scratch[range.clone()]);
            field.behavior.merge(&mut acc[range.clone()], &scratch[range]);
        }
    }

    /// Fold accumulator `other` into accumulator `acc`.
    pub(crate) fn merge_buffers(&self, acc: &mut [u8], other: &[u8]) {
        for field in &self.fields {
            let range = field.entry.range();
            field.behavior.merge(&mut acc[range.clone()], &other[range]);
        }
    }

    /// Order two composite buffers field by field, in addition order.
    pub(crate) fn compare_buffers(&self, left: &[u8], right: &[u8]) -> Ordering {
        for field in &self.fields {
            let range = field.entry.range();
            let ordering = field.behavior.compare(&left[range.clone()], &right[range]);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    }

    /// Total order over composite buffers: `compare_buffers`, then raw bytes.
    /// Buffers are equal under this order only when their bytes are identical.
    pub(crate) fn order_buffers(&self, left: &[u8], right: &[u8]) -> Ordering {
        self.compare_buffers(left, right).then_with(|| left.cmp(right))
    }
}

impl Default for FieldList {
    fn default() -> Self {
        Self::new()
    }
}
