//! Shared flow vocabulary for flowbin: the fixed-shape flow record, the
//! read contract for already-open record streams, and the registry of known
//! field identifiers with their canonical widths and merge rules.

#[macro_use]
mod macros;

mod record;
mod source;

pub use record::{FlowRecord, IPPROTO_ICMP, IPPROTO_ICMPV6, IPPROTO_TCP, IPPROTO_UDP};
pub use source::{FlowSource, IterSource};

use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// KnownField
///
/// Canonical semantic attribute that a field list can bind without a
/// caller-supplied behavior bundle. The first group mirrors attributes of a
/// flow record; the trailing group are aggregate-only accumulators.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum KnownField {
    SipV4,
    DipV4,
    Sport,
    Dport,
    Protocol,
    Packets,
    Bytes,
    Flags,
    StartTime,
    Elapsed,
    EndTime,
    Sensor,
    Input,
    Output,
    NhipV4,
    InitFlags,
    RestFlags,
    TcpState,
    Application,
    FlowClass,
    FlowType,
    IcmpType,
    IcmpCode,
    SipV6,
    DipV6,
    NhipV6,
    Records,
    SumPackets,
    SumBytes,
    SumElapsed,
    MinStartTime,
    MaxEndTime,
}

impl KnownField {
    /// Return the full metadata descriptor for one known field.
    #[must_use]
    pub const fn metadata(self) -> KnownFieldMetadata {
        known_field_registry!(metadata_from_registry, self)
    }

    /// Return the stable lowercase name of this field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.metadata().name
    }

    /// Return the number of octets this field occupies in a binary buffer.
    #[must_use]
    pub const fn width(self) -> usize {
        self.metadata().width
    }

    /// Return the family (record-mirrored or aggregate-only) of this field.
    #[must_use]
    pub const fn family(self) -> FieldFamily {
        self.metadata().family
    }

    /// Return how two accumulated values of this field combine.
    #[must_use]
    pub const fn merge_rule(self) -> MergeRule {
        self.metadata().merge
    }

    /// Return whether this field only exists as an accumulator.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        matches!(self.family(), FieldFamily::Aggregate)
    }
}

impl fmt::Display for KnownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KnownField {
    type Err = UnknownFieldName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KNOWN_FIELDS
            .iter()
            .copied()
            .find(|field| field.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFieldName {
                name: s.to_string(),
            })
    }
}

///
/// UnknownFieldName
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("unknown field name: '{name}'")]
pub struct UnknownFieldName {
    pub name: String,
}

///
/// KnownFieldMetadata
///
/// Static descriptor shared by every layer that binds known fields.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KnownFieldMetadata {
    pub name: &'static str,
    pub width: usize,
    pub family: FieldFamily,
    pub merge: MergeRule,
}

///
/// FieldFamily
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldFamily {
    Record,
    Aggregate,
}

///
/// MergeRule
///
/// Associative, commutative fold applied when two accumulated values of a
/// known field meet. All rules operate on big-endian unsigned encodings.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MergeRule {
    Sum,
    Min,
    Max,
    BitOr,
}

impl MergeRule {
    /// Return the octet every byte of a fresh accumulator is seeded with.
    #[must_use]
    pub const fn seed_octet(self) -> u8 {
        match self {
            Self::Min => 0xFF,
            Self::Sum | Self::Max | Self::BitOr => 0x00,
        }
    }
}

/// Ordered list of all known fields in registry order.
pub const ALL_KNOWN_FIELDS: [KnownField; 32] = known_field_registry!(all_fields_from_registry);

///
/// TESTS
///
