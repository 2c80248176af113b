use crate::FlowRecord;
use std::io;

///
/// FlowSource
///
/// One already-open stream of flow records. Opening, decoding, and closing
/// the underlying file or socket belong to the implementor.
///

pub trait FlowSource {
    /// Read the next record into `record`.
    ///
    /// Returns `Ok(true)` when a record was read, `Ok(false)` at end of
    /// stream, and `Err` when the stream failed.
    fn read_record(&mut self, record: &mut FlowRecord) -> io::Result<bool>;
}

impl<S: FlowSource + ?Sized> FlowSource for Box<S> {
    fn read_record(&mut self, record: &mut FlowRecord) -> io::Result<bool> {
        (**self).read_record(record)
    }
}

///
/// IterSource
///
/// Adapter exposing any iterator of records as a `FlowSource`.
///

#[derive(Debug)]
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = FlowRecord>,
{
    pub fn new(records: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: records.into_iter(),
        }
    }
}

impl<I> FlowSource for IterSource<I>
where
    I: Iterator<Item = FlowRecord>,
{
    fn read_record(&mut self, record: &mut FlowRecord) -> io::Result<bool> {
        match self.inner.next() {
            Some(next) => {
                *record = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

///
/// TESTS
///
