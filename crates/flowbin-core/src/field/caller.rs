use flowbin_primitives::FlowRecord;
use std::cmp::Ordering;

///
/// CallerField
///
/// Behavior bundle for a field the engines have no built-in knowledge of.
/// Implementations own whatever context they need. Engines trust these
/// behaviors: a merge that is not associative and commutative yields
/// order-dependent results.
///

pub trait CallerField: Send + Sync {
    /// Fixed byte width of this field; must be non-zero.
    fn width(&self) -> usize;

    /// Write this field's value for `record` into `dest` (exactly `width()` bytes).
    fn extract(&self, record: &FlowRecord, dest: &mut [u8]);

    /// Fold `other` into the accumulator `acc`.
    fn merge(&self, acc: &mut [u8], other: &[u8]);

    /// Order two encoded values. Byte order by default.
    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        left.cmp(right)
    }

    /// Value a fresh accumulator starts from; zero-filled when `None`.
    fn initial_value(&self) -> Option<&[u8]> {
        None
    }
}
