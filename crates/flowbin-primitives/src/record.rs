use std::net::{IpAddr, Ipv4Addr};

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_ICMPV6: u8 = 58;

///
/// FlowRecord
///
/// One fixed-shape network flow. Timestamps are milliseconds since the UNIX
/// epoch; the elapsed time is the flow duration in milliseconds. For ICMP
/// flows the destination port carries `(type << 8) | code`.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FlowRecord {
    pub sip: IpAddr,
    pub dip: IpAddr,
    pub nhip: IpAddr,
    pub sport: u16,
    pub dport: u16,
    pub proto: u8,
    pub packets: u32,
    pub bytes: u32,
    pub flags: u8,
    pub init_flags: u8,
    pub rest_flags: u8,
    pub tcp_state: u8,
    pub start_time_ms: i64,
    pub elapsed_ms: u32,
    pub sensor: u16,
    pub input: u16,
    pub output: u16,
    pub application: u16,
    pub flow_class: u8,
    pub flow_type: u8,
}

impl Default for FlowRecord {
    fn default() -> Self {
        Self {
            sip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            nhip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sport: 0,
            dport: 0,
            proto: 0,
            packets: 0,
            bytes: 0,
            flags: 0,
            init_flags: 0,
            rest_flags: 0,
            tcp_state: 0,
            start_time_ms: 0,
            elapsed_ms: 0,
            sensor: 0,
            input: 0,
            output: 0,
            application: 0,
            flow_class: 0,
            flow_type: 0,
        }
    }
}

impl FlowRecord {
    /// Return the end time in milliseconds since the epoch.
    #[must_use]
    pub const fn end_time_ms(&self) -> i64 {
        self.start_time_ms.saturating_add(self.elapsed_ms as i64)
    }

    /// Return the start time in whole seconds, clamped to the `u32` range.
    #[must_use]
    pub fn start_seconds(&self) -> u32 {
        clamp_seconds(self.start_time_ms)
    }

    /// Return the end time in whole seconds, clamped to the `u32` range.
    #[must_use]
    pub fn end_seconds(&self) -> u32 {
        clamp_seconds(self.end_time_ms())
    }

    /// Return the duration in whole seconds.
    #[must_use]
    pub const fn elapsed_seconds(&self) -> u32 {
        self.elapsed_ms / 1000
    }

    #[must_use]
    pub const fn is_icmp(&self) -> bool {
        matches!(self.proto, IPPROTO_ICMP | IPPROTO_ICMPV6)
    }

    /// ICMP type for ICMP flows, zero otherwise.
    #[must_use]
    pub const fn icmp_type(&self) -> u8 {
        if self.is_icmp() {
            (self.dport >> 8) as u8
        } else {
            0
        }
    }

    /// ICMP code for ICMP flows, zero otherwise.
    #[must_use]
    pub const fn icmp_code(&self) -> u8 {
        if self.is_icmp() {
            (self.dport & 0xFF) as u8
        } else {
            0
        }
    }
}

/// Project an address onto four octets. IPv6 addresses that embed an IPv4
/// address (mapped or compatible) yield it; any other IPv6 address yields zero.
#[must_use]
pub(crate) fn ipv4_octets(addr: &IpAddr) -> [u8; 4] {
    match addr {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(v6) => v6.to_ipv4().map_or([0; 4], |v4| v4.octets()),
    }
}

/// Project an address onto sixteen octets, mapping IPv4 into `::ffff:0:0/96`.
#[must_use]
pub(crate) fn ipv6_octets(addr: &IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

impl FlowRecord {
    /// Source address as four octets.
    #[must_use]
    pub fn sip_v4_octets(&self) -> [u8; 4] {
        ipv4_octets(&self.sip)
    }

    /// Destination address as four octets.
    #[must_use]
    pub fn dip_v4_octets(&self) -> [u8; 4] {
        ipv4_octets(&self.dip)
    }

    /// Next-hop address as four octets.
    #[must_use]
    pub fn nhip_v4_octets(&self) -> [u8; 4] {
        ipv4_octets(&self.nhip)
    }

    /// Source address as sixteen octets.
    #[must_use]
    pub fn sip_v6_octets(&self) -> [u8; 16] {
        ipv6_octets(&self.sip)
    }

    /// Destination address as sixteen octets.
    #[must_use]
    pub fn dip_v6_octets(&self) -> [u8; 16] {
        ipv6_octets(&self.dip)
    }

    /// Next-hop address as sixteen octets.
    #[must_use]
    pub fn nhip_v6_octets(&self) -> [u8; 16] {
        ipv6_octets(&self.nhip)
    }
}

fn clamp_seconds(ms: i64) -> u32 {
    u32::try_from(ms.max(0) / 1000).unwrap_or(u32::MAX)
}

///
/// TESTS
///
