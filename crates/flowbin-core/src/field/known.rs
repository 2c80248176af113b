//! Module: field::known
//! Responsibility: built-in extract and merge behaviors for `KnownField`.
//! Does not own: field layout; offsets and widths come from the owning list.
//! Boundary: every encoding here is big-endian unsigned, so byte order is numeric order.

use flowbin_primitives::{FlowRecord, KnownField, MergeRule};

/// Write the canonical encoding of `field` for `record` into `dest`.
/// `dest` is exactly `field.width()` bytes.
pub(crate) fn extract(field: KnownField, record: &FlowRecord, dest: &mut [u8]) {
    match field {
        KnownField::SipV4 => dest.copy_from_slice(&record.sip_v4_octets()),
        KnownField::DipV4 => dest.copy_from_slice(&record.dip_v4_octets()),
        KnownField::NhipV4 => dest.copy_from_slice(&record.nhip_v4_octets()),
        KnownField::SipV6 => dest.copy_from_slice(&record.sip_v6_octets()),
        KnownField::DipV6 => dest.copy_from_slice(&record.dip_v6_octets()),
        KnownField::NhipV6 => dest.copy_from_slice(&record.nhip_v6_octets()),
        KnownField::Sport => dest.copy_from_slice(&record.sport.to_be_bytes()),
        KnownField::Dport => dest.copy_from_slice(&record.dport.to_be_bytes()),
        KnownField::Protocol => dest[0] = record.proto,
        KnownField::Packets => dest.copy_from_slice(&record.packets.to_be_bytes()),
        KnownField::Bytes => dest.copy_from_slice(&record.bytes.to_be_bytes()),
        KnownField::Flags => dest[0] = record.flags,
        KnownField::InitFlags => dest[0] = record.init_flags,
        KnownField::RestFlags => dest[0] = record.rest_flags,
        KnownField::TcpState => dest[0] = record.tcp_state,
        KnownField::StartTime | KnownField::MinStartTime => {
            dest.copy_from_slice(&record.start_seconds().to_be_bytes());
        }
        KnownField::EndTime | KnownField::MaxEndTime => {
            dest.copy_from_slice(&record.end_seconds().to_be_bytes());
        }
        KnownField::Elapsed => dest.copy_from_slice(&record.elapsed_seconds().to_be_bytes()),
        KnownField::Sensor => dest.copy_from_slice(&record.sensor.to_be_bytes()),
        KnownField::Input => dest.copy_from_slice(&record.input.to_be_bytes()),
        KnownField::Output => dest.copy_from_slice(&record.output.to_be_bytes()),
        KnownField::Application => dest.copy_from_slice(&record.application.to_be_bytes()),
        KnownField::FlowClass => dest[0] = record.flow_class,
        KnownField::FlowType => dest[0] = record.flow_type,
        KnownField::IcmpType => dest[0] = record.icmp_type(),
        KnownField::IcmpCode => dest[0] = record.icmp_code(),
        KnownField::Records => dest.copy_from_slice(&1u32.to_be_bytes()),
        KnownField::SumPackets => dest.copy_from_slice(&u64::from(record.packets).to_be_bytes()),
        KnownField::SumBytes => dest.copy_from_slice(&u64::from(record.bytes).to_be_bytes()),
        KnownField::SumElapsed => {
            dest.copy_from_slice(&u64::from(record.elapsed_seconds()).to_be_bytes());
        }
    }
}

/// Fold `other` into `acc` under `rule`. Both slices share one width.
pub(crate) fn merge(rule: MergeRule, acc: &mut [u8], other: &[u8]) {
    match rule {
        MergeRule::Sum => saturating_add_be(acc, other),
        MergeRule::Min => {
            if other < &*acc {
                acc.copy_from_slice(other);
            }
        }
        MergeRule::Max => {
            if other > &*acc {
                acc.copy_from_slice(other);
            }
        }
        MergeRule::BitOr => {
            for (left, right) in acc.iter_mut().zip(other) {
                *left |= *right;
            }
        }
    }
}

/// Add two big-endian unsigned integers of equal width, pinning at all-ones.
pub(crate) fn saturating_add_be(acc: &mut [u8], other: &[u8]) {
    let mut carry = 0u16;
    for (left, right) in acc.iter_mut().rev().zip(other.iter().rev()) {
        let sum = u16::from(*left) + u16::from(*right) + carry;
        *left = (sum & 0xFF) as u8;
        carry = sum >> 8;
    }
    if carry != 0 {
        acc.fill(0xFF);
    }
}

///
/// TESTS
///
