#[macro_export]
macro_rules! known_field_registry_entries {
    ($macro:ident $(, @args $($args:tt)+ )?) => {
        $macro! {
            $(
                @args $($args)+;
            )?
            @entries
            (
                SipV4,
                name = "sip_v4",
                width = 4,
                family = Record,
                merge = Max
            ),
            (
                DipV4,
                name = "dip_v4",
                width = 4,
                family = Record,
                merge = Max
            ),
            (
                Sport,
                name = "sport",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                Dport,
                name = "dport",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                Protocol,
                name = "protocol",
                width = 1,
                family = Record,
                merge = Max
            ),
            (
                Packets,
                name = "packets",
                width = 4,
                family = Record,
                merge = Sum
            ),
            (
                Bytes,
                name = "bytes",
                width = 4,
                family = Record,
                merge = Sum
            ),
            (
                Flags,
                name = "flags",
                width = 1,
                family = Record,
                merge = BitOr
            ),
            (
                StartTime,
                name = "start_time",
                width = 4,
                family = Record,
                merge = Min
            ),
            (
                Elapsed,
                name = "elapsed",
                width = 4,
                family = Record,
                merge = Sum
            ),
            (
                EndTime,
                name = "end_time",
                width = 4,
                family = Record,
                merge = Max
            ),
            (
                Sensor,
                name = "sensor",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                Input,
                name = "input",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                Output,
                name = "output",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                NhipV4,
                name = "nhip_v4",
                width = 4,
                family = Record,
                merge = Max
            ),
            (
                InitFlags,
                name = "init_flags",
                width = 1,
                family = Record,
                merge = BitOr
            ),
            (
                RestFlags,
                name = "rest_flags",
                width = 1,
                family = Record,
                merge = BitOr
            ),
            (
                TcpState,
                name = "tcp_state",
                width = 1,
                family = Record,
                merge = BitOr
            ),
            (
                Application,
                name = "application",
                width = 2,
                family = Record,
                merge = Max
            ),
            (
                FlowClass,
                name = "flow_class",
                width = 1,
                family = Record,
                merge = Max
            ),
            (
                FlowType,
                name = "flow_type",
                width = 1,
                family = Record,
                merge = Max
            ),
            (
                IcmpType,
                name = "icmp_type",
                width = 1,
                family = Record,
                merge = Max
            ),
            (
                IcmpCode,
                name = "icmp_code",
                width = 1,
                family = Record,
                merge = Max
            ),
            (
                SipV6,
                name = "sip_v6",
                width = 16,
                family = Record,
                merge = Max
            ),
            (
                DipV6,
                name = "dip_v6",
                width = 16,
                family = Record,
                merge = Max
            ),
            (
                NhipV6,
                name = "nhip_v6",
                width = 16,
                family = Record,
                merge = Max
            ),
            (
                Records,
                name = "records",
                width = 4,
                family = Aggregate,
                merge = Sum
            ),
            (
                SumPackets,
                name = "sum_packets",
                width = 8,
                family = Aggregate,
                merge = Sum
            ),
            (
                SumBytes,
                name = "sum_bytes",
                width = 8,
                family = Aggregate,
                merge = Sum
            ),
            (
                SumElapsed,
                name = "sum_elapsed",
                width = 8,
                family = Aggregate,
                merge = Sum
            ),
            (
                MinStartTime,
                name = "min_start_time",
                width = 4,
                family = Aggregate,
                merge = Min
            ),
            (
                MaxEndTime,
                name = "max_end_time",
                width = 4,
                family = Aggregate,
                merge = Max
            ),
        }
    };
}

#[macro_export]
macro_rules! known_field_registry {
    ($macro:ident) => {
        $crate::known_field_registry_entries!($macro)
    };
    ($macro:ident, $($args:tt)+) => {
        $crate::known_field_registry_entries!($macro, @args $($args)+)
    };
}

macro_rules! metadata_from_registry {
    ( @args $field:expr; @entries $( ($variant:ident, name = $name:expr, width = $width:expr, family = $family:ident, merge = $merge:ident) ),* $(,)? ) => {
        match $field {
            $(
                $crate::KnownField::$variant => $crate::KnownFieldMetadata {
                    name: $name,
                    width: $width,
                    family: $crate::FieldFamily::$family,
                    merge: $crate::MergeRule::$merge,
                },
            )*
        }
    };
}

macro_rules! all_fields_from_registry {
    ( @entries $( ($variant:ident, name = $name:expr, width = $width:expr, family = $family:ident, merge = $merge:ident) ),* $(,)? ) => {
        [ $( $crate::KnownField::$variant ),* ]
    };
}
