//! Shared fixtures for engine unit tests.

use crate::{
    error::GroupError,
    field::{CallerField, FieldList},
    group::{GroupIterator, OwnedGroup},
};
use flowbin_primitives::{FlowRecord, FlowSource, KnownField};
use std::{
    cmp::Ordering,
    io,
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

/// Key, distinct, and value lists as passed to `set_fields`.
pub(crate) type Schema = (Arc<FieldList>, Option<Arc<FieldList>>, Option<Arc<FieldList>>);

/// Record from `10.0.0.<host>` to port `dport` carrying `bytes`.
pub(crate) fn flow(host: u8, dport: u16, bytes: u32) -> FlowRecord {
    FlowRecord {
        sip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)),
        dport,
        bytes,
        packets: 1,
        ..FlowRecord::default()
    }
}

/// Record for protocol `proto` from port `sport` to port `dport`.
pub(crate) fn service_flow(proto: u8, sport: u16, dport: u16, bytes: u32) -> FlowRecord {
    FlowRecord {
        proto,
        sport,
        ..flow(1, dport, bytes)
    }
}

pub(crate) fn fields(known: &[KnownField]) -> Arc<FieldList> {
    let mut list = FieldList::new();
    for field in known {
        list.add_known_field(*field, None);
    }

    Arc::new(list)
}

/// Drain an iterator into owned groups.
pub(crate) fn collect_groups(iter: &mut dyn GroupIterator) -> Result<Vec<OwnedGroup>, GroupError> {
    let mut groups = Vec::new();
    while let Some(view) = iter.next_group()? {
        groups.push(view.to_owned_group());
    }

    Ok(groups)
}

pub(crate) fn be_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().expect("eight bytes"))
}

///
/// ServiceKey
///
/// Two-byte key `[proto, low byte of sport]` whose comparator only looks at
/// the protocol, so distinct keys can compare equal.
///

pub(crate) struct ServiceKey;

impl CallerField for ServiceKey {
    fn width(&self) -> usize {
        2
    }

    fn extract(&self, record: &FlowRecord, dest: &mut [u8]) {
        dest[0] = record.proto;
        dest[1] = record.sport.to_be_bytes()[1];
    }

    fn merge(&self, _: &mut [u8], _: &[u8]) {}

    fn compare(&self, left: &[u8], right: &[u8]) -> Ordering {
        left[0].cmp(&right[0])
    }
}

///
/// PortMask
///
/// One-byte bitmask of `dport % 8` values seen, seeded with bit 0.
///

pub(crate) struct PortMask;

impl CallerField for PortMask {
    fn width(&self) -> usize {
        1
    }

    fn extract(&self, record: &FlowRecord, dest: &mut [u8]) {
        dest[0] = 1 << (record.dport % 8);
    }

    fn merge(&self, acc: &mut [u8], other: &[u8]) {
        acc[0] |= other[0];
    }

    fn initial_value(&self) -> Option<&[u8]> {
        Some(&[0x01])
    }
}

/// `ServiceKey` key, distinct destination ports, `PortMask` then summed bytes.
pub(crate) fn service_schema() -> Schema {
    let mut key = FieldList::new();
    key.add_caller_field(ServiceKey, None).expect("service key");
    let mut value = FieldList::new();
    value.add_caller_field(PortMask, None).expect("port mask");
    value.add_known_field(KnownField::SumBytes, None);

    (
        Arc::new(key),
        Some(fields(&[KnownField::Dport])),
        Some(Arc::new(value)),
    )
}

/// Sort records by the `ServiceKey` bytes.
pub(crate) fn sort_by_service(records: &mut [FlowRecord]) {
    records.sort_by_key(|record| (record.proto, record.sport.to_be_bytes()[1]));
}

///
/// FailingSource
///
/// Yields its records, then fails instead of reporting end of stream.
///

pub(crate) struct FailingSource {
    pub(crate) records: Vec<FlowRecord>,
}

impl FlowSource for FailingSource {
    fn read_record(&mut self, record: &mut FlowRecord) -> io::Result<bool> {
        if self.records.is_empty() {
            return Err(io::Error::other("stream reset"));
        }
        *record = self.records.remove(0);

        Ok(true)
    }
}
