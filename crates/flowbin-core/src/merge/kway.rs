use crate::{error::GroupError, field::FieldList};
use std::{cmp::Ordering, sync::Arc};

///
/// MergeCursor
///
/// One sorted input to a k-way merge. A cursor starts before its first
/// entry; `advance` moves to the next one and reports whether it exists.
///

pub(crate) trait MergeCursor {
    /// Key bytes of the current entry. Only valid after `advance` returned true.
    fn key(&self) -> &[u8];

    fn advance(&mut self) -> Result<bool, GroupError>;
}

///
/// KWayMerge
///
/// Index min-heap over cursors, ordered by the key comparator with raw bytes
/// breaking its ties. Identical keys pop in cursor order, so a merge over the
/// same inputs is deterministic.
///
/// Protocol: `pop` the smallest cursor, consume its current entry through
/// `cursor`/`cursor_mut`, then `restore` it to advance and re-queue it.
///

pub(crate) struct KWayMerge<C> {
    fields: Arc<FieldList>,
    cursors: Vec<C>,
    heap: Vec<usize>,
}

impl<C: MergeCursor> KWayMerge<C> {
    /// Prime every cursor and heap the non-empty ones.
    pub(crate) fn new(fields: Arc<FieldList>, mut cursors: Vec<C>) -> Result<Self, GroupError> {
        let mut live = Vec::with_capacity(cursors.len());
        for (index, cursor) in cursors.iter_mut().enumerate() {
            if cursor.advance()? {
                live.push(index);
            }
        }

        let mut merge = Self {
            fields,
            cursors,
            heap: Vec::with_capacity(live.len()),
        };
        for index in live {
            merge.push(index);
        }

        Ok(merge)
    }

    /// Remove and return the cursor holding the smallest key.
    pub(crate) fn pop(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let top = self.heap.swap_remove(0);
        self.sift_down(0);

        Some(top)
    }

    /// Advance a popped cursor and re-queue it unless it is exhausted.
    pub(crate) fn restore(&mut self, index: usize) -> Result<(), GroupError> {
        if self.cursors[index].advance()? {
            self.push(index);
        }

        Ok(())
    }

    pub(crate) fn cursor(&self, index: usize) -> &C {
        &self.cursors[index]
    }

    pub(crate) fn cursor_mut(&mut self, index: usize) -> &mut C {
        &mut self.cursors[index]
    }

    fn push(&mut self, index: usize) {
        self.heap.push(index);
        self.sift_up(self.heap.len() - 1);
    }

    fn precedes(&self, left: usize, right: usize) -> bool {
        match self
            .fields
            .order_buffers(self.cursors[left].key(), self.cursors[right].key())
        {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => left < right,
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.precedes(self.heap[slot], self.heap[parent]) {
                break;
            }
            self.heap.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && self.precedes(self.heap[right], self.heap[left]) {
                smallest = right;
            }
            if !self.precedes(self.heap[smallest], self.heap[slot]) {
                break;
            }
            self.heap.swap(slot, smallest);
            slot = smallest;
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ServiceKey;
    use flowbin_primitives::KnownField;
    use proptest::prelude::*;

    struct VecCursor {
        keys: Vec<[u8; 2]>,
        next: usize,
        current: [u8; 2],
    }

    impl VecCursor {
        fn new(mut keys: Vec<u16>) -> Self {
            keys.sort_unstable();
            Self {
                keys: keys.into_iter().map(u16::to_be_bytes).collect(),
                next: 0,
                current: [0; 2],
            }
        }
    }

    impl MergeCursor for VecCursor {
        fn key(&self) -> &[u8] {
            &self.current
        }

        fn advance(&mut self) -> Result<bool, GroupError> {
            let Some(key) = self.keys.get(self.next) else {
                return Ok(false);
            };
            self.current = *key;
            self.next += 1;

            Ok(true)
        }
    }

    fn port_fields() -> Arc<FieldList> {
        let mut list = FieldList::new();
        list.add_known_field(KnownField::Dport, None);
        Arc::new(list)
    }

    fn drain(merge: &mut KWayMerge<VecCursor>) -> Vec<(u16, usize)> {
        let mut out = Vec::new();
        while let Some(index) = merge.pop() {
            let key = merge.cursor(index).key();
            out.push((u16::from_be_bytes([key[0], key[1]]), index));
            merge.restore(index).expect("restore");
        }

        out
    }

    #[test]
    fn equal_keys_pop_in_cursor_order() {
        let cursors = vec![
            VecCursor::new(vec![5, 9]),
            VecCursor::new(vec![]),
            VecCursor::new(vec![5, 7]),
        ];
        let mut merge = KWayMerge::new(port_fields(), cursors).expect("merge");

        assert_eq!(drain(&mut merge), vec![(5, 0), (5, 2), (7, 2), (9, 0)]);
        assert!(merge.pop().is_none());
    }

    #[test]
    fn comparator_ties_pop_in_byte_order() {
        let mut list = FieldList::new();
        list.add_caller_field(ServiceKey, None).expect("service key");
        // [6, 9] and [6, 1] tie under the comparator
        let cursors = vec![
            VecCursor::new(vec![0x0609]),
            VecCursor::new(vec![0x0601, 0x1101]),
        ];
        let mut merge = KWayMerge::new(Arc::new(list), cursors).expect("merge");

        assert_eq!(drain(&mut merge), vec![(0x0601, 1), (0x0609, 0), (0x1101, 1)]);
    }

    proptest! {
        #[test]
        fn merge_output_is_the_sorted_union(
            inputs in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..20), 0..8)
        ) {
            let mut expected: Vec<u16> = inputs.iter().flatten().copied().collect();
            expected.sort_unstable();
            let cursors = inputs.into_iter().map(VecCursor::new).collect();
            let mut merge = KWayMerge::new(port_fields(), cursors).expect("merge");

            let merged: Vec<u16> = drain(&mut merge).into_iter().map(|(key, _)| key).collect();

            prop_assert_eq!(merged, expected);
        }
    }
}
