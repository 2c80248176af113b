use super::*;
use crate::test_support::ServiceKey;
use std::net::{IpAddr, Ipv4Addr};

// Caller field counting records whose source port is privileged.
struct PrivilegedPorts;

impl CallerField for PrivilegedPorts {
    fn width(&self) -> usize {
        2
    }

    fn extract(&self, record: &FlowRecord, dest: &mut [u8]) {
        let hit = u16::from(record.sport < 1024);
        dest.copy_from_slice(&hit.to_be_bytes());
    }

    fn merge(&self, acc: &mut [u8], other: &[u8]) {
        let sum = u16::from_be_bytes([acc[0], acc[1]])
            .saturating_add(u16::from_be_bytes([other[0], other[1]]));
        acc.copy_from_slice(&sum.to_be_bytes());
    }
}

// Caller key ordering its single byte descending, seeded at 0x7F.
struct Descending;

impl CallerField for Descending {
    fn width(&self) -> usize {
        1
    }

    fn extract(&self, record: &FlowRecord, dest: &mut [u8]) {
        dest[0] = record.proto;
    }

    fn merge(&self, acc: &mut [u8], other: &[u8]) {
        acc[0] = acc[0].max(other[0]);
    }

    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        right.cmp(left)
    }

    fn initial_value(&self) -> Option<&[u8]> {
        Some(&[0x7F])
    }
}

struct Unsized;

impl CallerField for Unsized {
    fn width(&self) -> usize {
        0
    }

    fn extract(&self, _: &FlowRecord, _: &mut [u8]) {}

    fn merge(&self, _: &mut [u8], _: &[u8]) {}
}

struct BadSeed;

impl CallerField for BadSeed {
    fn width(&self) -> usize {
        4
    }

    fn extract(&self, _: &FlowRecord, _: &mut [u8]) {}

    fn merge(&self, _: &mut [u8], _: &[u8]) {}

    fn initial_value(&self) -> Option<&[u8]> {
        Some(&[1, 2])
    }
}

fn record(sip: [u8; 4], sport: u16, bytes: u32, start_ms: i64, elapsed_ms: u32) -> FlowRecord {
    FlowRecord {
        sip: IpAddr::V4(Ipv4Addr::from(sip)),
        sport,
        bytes,
        start_time_ms: start_ms,
        elapsed_ms,
        ..FlowRecord::default()
    }
}

#[test]
fn offsets_are_contiguous_in_addition_order() {
    let mut list = FieldList::new();
    let sip = list.add_known_field(KnownField::SipV4, None);
    let sport = list.add_known_field(KnownField::Sport, None);
    let proto = list.add_known_field(KnownField::Protocol, None);

    assert_eq!((sip.offset(), sip.width()), (0, 4));
    assert_eq!((sport.offset(), sport.width()), (4, 2));
    assert_eq!((proto.offset(), proto.width()), (6, 1));
    assert_eq!(list.buffer_size(), 7);
    assert_eq!(
        list.entries().map(|entry| entry.index()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn duplicate_attributes_accumulate_independently() {
    let mut list = FieldList::new();
    let earliest = list.add_known_field(KnownField::MinStartTime, None);
    let latest = list.add_known_field(KnownField::MaxEndTime, None);
    let mut acc = vec![0; list.buffer_size()];
    let mut scratch = vec![0; list.buffer_size()];
    list.initialize_buffer(&mut acc);

    list.accumulate_record(&record([0; 4], 0, 0, 20_000, 5_000), &mut acc, &mut scratch);
    list.accumulate_record(&record([0; 4], 0, 0, 10_000, 1_000), &mut acc, &mut scratch);

    let start = list.field_bytes(&acc, &earliest).expect("start bytes");
    let end = list.field_bytes(&acc, &latest).expect("end bytes");
    assert_eq!(start, 10u32.to_be_bytes());
    assert_eq!(end, 25u32.to_be_bytes());
}

#[test]
fn min_fields_seed_with_all_ones_and_others_with_zero() {
    let mut list = FieldList::new();
    list.add_known_field(KnownField::MinStartTime, None);
    list.add_known_field(KnownField::SumBytes, None);
    let mut acc = vec![0x55; list.buffer_size()];
    list.initialize_buffer(&mut acc);

    assert_eq!(&acc[..4], &[0xFF; 4]);
    assert_eq!(&acc[4..], &[0; 8]);
}

#[test]
fn caller_fields_use_their_own_behaviors() {
    let mut list = FieldList::new();
    let hits = list
        .add_caller_field(PrivilegedPorts, None)
        .expect("caller field");
    let mut acc = vec![0; list.buffer_size()];
    let mut scratch = vec![0; list.buffer_size()];
    list.initialize_buffer(&mut acc);
    for sport in [22, 8080, 443] {
        list.accumulate_record(&record([0; 4], sport, 0, 0, 0), &mut acc, &mut scratch);
    }

    assert_eq!(hits.id(), FieldId::Caller);
    assert_eq!(list.field_bytes(&acc, &hits).expect("hits"), &[0, 2]);
}

#[test]
fn caller_initial_value_and_comparator_apply() {
    let mut list = FieldList::new();
    list.add_caller_field(Descending, None).expect("caller field");
    let mut seed = [0];
    list.initialize_buffer(&mut seed);

    assert_eq!(seed, [0x7F]);
    assert_eq!(list.compare_buffers(&[1], &[9]), Ordering::Greater);
}

#[test]
fn caller_field_width_is_validated_at_addition() {
    let mut list = FieldList::new();

    assert_eq!(list.add_caller_field(Unsized, None), Err(FieldError::ZeroWidth));
    assert_eq!(
        list.add_caller_field(BadSeed, None),
        Err(FieldError::InitialValueWidth {
            expected: 4,
            actual: 2
        })
    );
    assert!(list.is_empty(), "rejected fields never occupy a slot");
}

#[test]
fn compare_buffers_orders_field_by_field() {
    let mut list = FieldList::new();
    list.add_known_field(KnownField::Sport, None);
    list.add_known_field(KnownField::Protocol, None);

    assert_eq!(list.compare_buffers(&[0, 80, 6], &[0, 80, 17]), Ordering::Less);
    assert_eq!(list.compare_buffers(&[1, 0, 1], &[0, 80, 17]), Ordering::Greater);
    assert_eq!(list.compare_buffers(&[0, 80, 6], &[0, 80, 6]), Ordering::Equal);
}

#[test]
fn order_buffers_breaks_comparator_ties_by_bytes() {
    let mut list = FieldList::new();
    list.add_caller_field(Descending, None).expect("caller field");
    list.add_caller_field(ServiceKey, None).expect("service key");

    // the comparator ignores the second service byte
    assert_eq!(list.compare_buffers(&[1, 6, 2], &[1, 6, 1]), Ordering::Equal);
    assert_eq!(list.order_buffers(&[1, 6, 2], &[1, 6, 1]), Ordering::Greater);
    assert_eq!(list.order_buffers(&[9, 6, 1], &[1, 6, 1]), Ordering::Less);
    assert_eq!(list.order_buffers(&[1, 6, 1], &[1, 6, 1]), Ordering::Equal);
}

#[test]
fn record_to_buffer_concatenates_key_fields() {
    let mut list = FieldList::new();
    list.add_known_field(KnownField::SipV4, None);
    list.add_known_field(KnownField::Sport, None);
    let mut key = vec![0; list.buffer_size()];
    list.record_to_buffer(&record([192, 168, 0, 9], 443, 0, 0, 0), &mut key);

    assert_eq!(key, vec![192, 168, 0, 9, 0x01, 0xBB]);
}

#[test]
fn entries_from_another_list_are_rejected() {
    let mut left = FieldList::new();
    let mut right = FieldList::new();
    left.add_known_field(KnownField::Sport, None);
    let foreign = right.add_known_field(KnownField::Sport, None);
    let buffer = [0, 80];

    assert_eq!(
        left.field_bytes(&buffer, &foreign),
        Err(FieldError::ForeignEntry { index: 0 })
    );
}

#[test]
fn extract_from_buffer_copies_one_slice() {
    let mut list = FieldList::new();
    list.add_known_field(KnownField::Protocol, None);
    let dport = list.add_known_field(KnownField::Dport, None);
    let buffer = [6, 0x00, 0x35];
    let mut out = [0; 2];
    list.extract_from_buffer(&buffer, &dport, &mut out)
        .expect("copy");

    assert_eq!(out, [0x00, 0x35]);
    assert_eq!(
        list.extract_from_buffer(&buffer[..2], &dport, &mut out),
        Err(FieldError::BufferTooShort {
            expected: 3,
            actual: 2
        })
    );
    assert_eq!(
        list.extract_from_buffer(&buffer, &dport, &mut [0; 1]),
        Err(FieldError::BufferTooShort {
            expected: 2,
            actual: 1
        })
    );
}

#[test]
fn contexts_are_returned_through_their_handles() {
    let mut list = FieldList::new();
    let label: FieldContext = Arc::new(String::from("peer"));
    let tagged = list.add_known_field(KnownField::DipV4, Some(label));
    let bare = list.add_known_field(KnownField::Dport, None);

    let context = list.context(&tagged).expect("own entry").expect("context");
    assert_eq!(
        context.downcast_ref::<String>().map(String::as_str),
        Some("peer")
    );
    assert!(list.context(&bare).expect("own entry").is_none());
}
