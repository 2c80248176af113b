use flowbin::{ErrorKind, prelude::*};
use std::{
    net::{IpAddr, Ipv4Addr},
    ops::ControlFlow,
    sync::Arc,
};

fn flow(host: u8, dport: u16, bytes: u32) -> FlowRecord {
    FlowRecord {
        sip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, host)),
        dport,
        packets: 1,
        bytes,
        ..FlowRecord::default()
    }
}

fn list(fields: &[KnownField]) -> Arc<FieldList> {
    let mut list = FieldList::new();
    for field in fields {
        list.add_known_field(*field, None);
    }

    Arc::new(list)
}

fn bind(engine: &mut HashGroupingEngine) {
    engine
        .set_fields(
            list(&[KnownField::SipV4]),
            Some(list(&[KnownField::Dport])),
            Some(list(&[KnownField::Records, KnownField::SumBytes])),
        )
        .expect("bind fields");
}

// (host, distinct ports, records, bytes)
type Summary = (u8, u64, u32, u64);

fn summarize(group: GroupView<'_>) -> Summary {
    let value = group.value();
    let records = u32::from_be_bytes(value[..4].try_into().expect("records width"));
    let bytes = u64::from_be_bytes(value[4..12].try_into().expect("bytes width"));

    (
        group.key()[3],
        group.distinct_count(0).expect("one distinct field"),
        records,
        bytes,
    )
}

fn hash_groups(engine: &mut HashGroupingEngine, records: &[FlowRecord]) -> Vec<Summary> {
    engine.prepare_for_input().expect("prepare input");
    for record in records {
        engine.add_record(record).expect("add record");
    }
    engine.prepare_for_output().expect("prepare output");

    let mut out = Vec::new();
    let mut iter = engine.iterator_create().expect("iterator");
    while let Some(group) = iter.next_group().expect("next group") {
        out.push(summarize(group));
    }

    out
}

fn traffic() -> Vec<FlowRecord> {
    vec![
        flow(7, 443, 10),
        flow(3, 53, 1),
        flow(7, 80, 20),
        flow(9, 22, 4),
        flow(3, 53, 2),
        flow(7, 443, 5),
    ]
}

#[test]
fn hash_engine_reports_sorted_totals_per_source() {
    let mut engine = HashGroupingEngine::new();
    bind(&mut engine);
    engine.set_sorted_output(true).expect("sorted output");

    let groups = hash_groups(&mut engine, &traffic());

    assert_eq!(groups, vec![(3, 1, 2, 3), (7, 2, 3, 35), (9, 1, 1, 4)]);
}

#[test]
fn config_loaded_from_json_forces_spills_without_changing_results() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config: GroupingConfig = serde_json::from_value(serde_json::json!({
        "temp_dir": dir.path(),
        "memory_limit": 1,
        "max_merge_fanin": 2,
    }))
    .expect("config parses");

    let mut spilling = HashGroupingEngine::with_config(config);
    bind(&mut spilling);
    let mut resident = HashGroupingEngine::new();
    bind(&mut resident);
    resident.set_sorted_output(true).expect("sorted output");

    let spilled = hash_groups(&mut spilling, &traffic());
    let in_memory = hash_groups(&mut resident, &traffic());

    assert!(spilling.output_is_sorted(), "spilled output is always sorted");
    assert!(spilling.stats().spills > 0);
    assert_eq!(spilled, in_memory);
}

#[test]
fn presorted_engine_agrees_with_hash_engine() {
    let mut sorted = traffic();
    sorted.sort_by_key(|record| record.sip);
    let (left, right) = sorted.split_at(2);

    let mut presorted = PresortedStreamEngine::new();
    presorted
        .set_fields(
            list(&[KnownField::SipV4]),
            Some(list(&[KnownField::Dport])),
            Some(list(&[KnownField::Records, KnownField::SumBytes])),
        )
        .expect("bind fields");
    presorted
        .add_flow_source(Box::new(IterSource::new(left.to_vec())))
        .expect("first source");
    presorted
        .add_flow_source(Box::new(IterSource::new(right.to_vec())))
        .expect("second source");

    let mut streamed = Vec::new();
    let flow = presorted
        .process(|group| {
            streamed.push(summarize(group));
            ControlFlow::<()>::Continue(())
        })
        .expect("process");

    let mut engine = HashGroupingEngine::new();
    bind(&mut engine);
    engine.set_sorted_output(true).expect("sorted output");

    assert_eq!(flow, ControlFlow::Continue(()));
    assert_eq!(streamed, hash_groups(&mut engine, &traffic()));
}

#[test]
fn engine_errors_map_to_public_kinds() {
    let mut engine = HashGroupingEngine::new();

    let missing_fields = flowbin::Error::from(engine.prepare_for_input().expect_err("no fields"));
    assert_eq!(missing_fields.kind, ErrorKind::Configuration);

    let early = flowbin::Error::from(engine.add_record(&flow(1, 1, 1)).expect_err("not prepared"));
    assert_eq!(early.kind, ErrorKind::Usage);

    let mut missing_dir = HashGroupingEngine::with_config(
        GroupingConfig::with_limits(1, 2).with_temp_dir("/nonexistent/flowbin-spill"),
    );
    bind(&mut missing_dir);
    missing_dir.prepare_for_input().expect("prepare input");
    let failure = traffic()
        .iter()
        .find_map(|record| missing_dir.add_record(record).err())
        .expect("spill into a missing directory fails");

    assert_eq!(flowbin::Error::from(failure).kind, ErrorKind::Resource);
    assert!(missing_dir.is_failed());
}

#[test]
fn version_matches_the_manifest() {
    assert_eq!(flowbin::VERSION, env!("CARGO_PKG_VERSION"));
}
