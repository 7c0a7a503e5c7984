//! End-to-end consumption runs against the in-memory client.

use std::sync::Arc;
use std::time::Duration;

use kaftail::consumer::{
    resolve_bound, ConsumeError, ConsumedMessage, Consumption, ConsumptionRequest, FakeClient,
    OffsetBound,
};
use kaftail::decode::json::JsonDeserializer;
use kaftail::decode::{DecodeError, Deserializer, DeserializerChain, Encoding, Field};
use kaftail::output::MemorySink;

mod common;

const TOPIC: &str = "events";

async fn run(client: &FakeClient, request: ConsumptionRequest) -> (Result<(), ConsumeError>, MemorySink) {
    run_with_chain(client, request, DeserializerChain::default()).await
}

async fn run_with_chain(
    client: &FakeClient,
    request: ConsumptionRequest,
    chain: DeserializerChain,
) -> (Result<(), ConsumeError>, MemorySink) {
    let sink = MemorySink::new();
    let mut writer = sink.clone();
    let result = common::within_deadline(
        Consumption::new(Arc::new(client.clone()), request, chain).run(&mut writer),
    )
    .await;
    (result, sink)
}

fn offsets_of(sink: &MemorySink, partition: i32) -> Vec<i64> {
    sink.positions()
        .into_iter()
        .filter(|(p, _)| *p == partition)
        .map(|(_, o)| o)
        .collect()
}

/// Tail of a single ten-message partition
#[tokio::test]
async fn test_tail_three_of_ten() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    let request = ConsumptionRequest::new(TOPIC).with_tail(3);

    let bound = resolve_bound(&client, &request, 0).await.unwrap();
    assert_eq!(bound, OffsetBound::bounded(0, 7, 9));

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(sink.positions(), vec![(0, 7), (0, 8), (0, 9)]);

    let values: Vec<String> = sink.records().into_iter().filter_map(|r| r.value).collect();
    assert_eq!(values, vec!["message-7", "message-8", "message-9"]);
}

/// Replay from the beginning and stop at the boundary
#[tokio::test]
async fn test_exit_from_beginning_stops_at_boundary() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    // A long idle window proves the run ends through the boundary.
    let request = ConsumptionRequest::new(TOPIC)
        .with_from_beginning(true)
        .with_exit(true)
        .with_idle_timeout(Duration::from_secs(60));

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(offsets_of(&sink, 0), (0..10).collect::<Vec<_>>());
    assert_eq!(client.closed_readers(), vec![0]);
}

/// `--exit` without a start position never touches the cluster
#[tokio::test]
async fn test_exit_without_start_is_rejected_before_any_fetch() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    let request = ConsumptionRequest::new(TOPIC).with_exit(true);

    let (result, sink) = run(&client, request).await;
    let err = result.unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("--exit requires --from-beginning or --offset"));
    assert_eq!(client.offset_fetches(), 0);
    assert!(client.opened_readers().is_empty());
    assert!(sink.records().is_empty());
}

/// Tail combined with explicit offsets is a configuration error
#[tokio::test]
async fn test_tail_with_offsets_is_rejected() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    let request = ConsumptionRequest::new(TOPIC)
        .with_tail(3)
        .with_offsets(vec!["0=2".parse().unwrap()]);

    let (result, _) = run(&client, request).await;
    assert!(result.unwrap_err().is_config());
    assert_eq!(client.offset_fetches(), 0);
}

/// A reader that fails to open is the run's error even though another
/// partition produced output
#[tokio::test]
async fn test_open_failure_reported_after_other_partition_output() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 5)
        .with_partition(TOPIC, 1, 5)
        .with_open_failure(0);
    let request = ConsumptionRequest::new(TOPIC)
        .with_from_beginning(true)
        .with_exit(true);

    let (result, sink) = run(&client, request).await;
    match result {
        Err(ConsumeError::OpenReader { partition, .. }) => assert_eq!(partition, 0),
        other => panic!("expected open failure, got {:?}", other),
    }
    assert_eq!(offsets_of(&sink, 1), vec![0, 1, 2, 3, 4]);
    assert!(offsets_of(&sink, 0).is_empty());
}

/// Recognises a one-byte magic prefix and knows no schemas.
struct SchemaRegistryDeserializer;

impl Deserializer for SchemaRegistryDeserializer {
    fn name(&self) -> &str {
        "schema-registry"
    }

    fn applies_to(&self, field: Field, payload: &[u8]) -> bool {
        field == Field::Value && payload.first() == Some(&0)
    }

    fn deserialize(&self, _field: Field, _payload: &[u8]) -> Result<String, DecodeError> {
        Err(DecodeError::new(self.name(), "unknown schema id"))
    }
}

/// A decode failure while following stops the run without further output
#[tokio::test]
async fn test_decode_failure_stops_followed_run() {
    let messages = vec![
        ConsumedMessage::new(0, 0).with_value("{\"id\":1}"),
        ConsumedMessage::new(0, 1).with_value(vec![0, 0, 0, 0, 7]),
        ConsumedMessage::new(0, 2).with_value("{\"id\":3}"),
    ];
    let client = FakeClient::new().with_messages(TOPIC, 0, messages);
    let request = ConsumptionRequest::new(TOPIC).with_offsets(vec!["0=0".parse().unwrap()]);
    let chain = DeserializerChain::new(
        vec![Box::new(SchemaRegistryDeserializer), Box::new(JsonDeserializer::new())],
        Encoding::Raw,
        Encoding::Raw,
    );

    let (result, sink) = run_with_chain(&client, request, chain).await;
    match result {
        Err(ConsumeError::Decode { partition, offset, .. }) => {
            assert_eq!((partition, offset), (0, 1));
        }
        other => panic!("expected decode failure, got {:?}", other),
    }
    assert_eq!(sink.positions(), vec![(0, 0)]);
    assert_eq!(sink.records()[0].value.as_deref(), Some("{\n  \"id\": 1\n}"));
}

/// Bracketed log lines are plain text, not broken JSON
#[tokio::test]
async fn test_log_lines_do_not_end_the_run() {
    let messages = vec![
        ConsumedMessage::new(0, 0).with_value("hello"),
        ConsumedMessage::new(0, 1).with_value("[INFO] service started"),
        ConsumedMessage::new(0, 2).with_value("world"),
    ];
    let client = FakeClient::new().with_messages(TOPIC, 0, messages);
    let request = ConsumptionRequest::new(TOPIC)
        .with_from_beginning(true)
        .with_exit(true);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    let values: Vec<String> = sink.records().into_iter().filter_map(|r| r.value).collect();
    assert_eq!(values, vec!["hello", "[INFO] service started", "world"]);
}

/// The tail window merges partitions by timestamp
#[tokio::test]
async fn test_tail_orders_across_partitions_by_timestamp() {
    let client = FakeClient::new()
        .with_messages(
            TOPIC,
            0,
            vec![
                ConsumedMessage::new(0, 0).with_timestamp_millis(1_000),
                ConsumedMessage::new(0, 1).with_timestamp_millis(4_000),
                ConsumedMessage::new(0, 2).with_timestamp_millis(6_000),
            ],
        )
        .with_messages(
            TOPIC,
            1,
            vec![
                ConsumedMessage::new(1, 0).with_timestamp_millis(2_000),
                ConsumedMessage::new(1, 1).with_timestamp_millis(5_000),
                ConsumedMessage::new(1, 2).with_timestamp_millis(3_000),
            ],
        );
    let request = ConsumptionRequest::new(TOPIC).with_tail(4);

    let (result, sink) = run(&client, request).await;
    result.unwrap();

    let timestamps: Vec<i64> = sink
        .records()
        .iter()
        .map(|r| r.timestamp.unwrap().timestamp_millis())
        .collect();
    assert_eq!(timestamps, vec![3_000, 4_000, 5_000, 6_000]);
}

/// Empty partitions are skipped without opening a reader
#[tokio::test]
async fn test_empty_partition_is_never_opened() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 0)
        .with_partition(TOPIC, 1, 2);
    let request = ConsumptionRequest::new(TOPIC).with_tail(5);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(client.opened_readers(), vec![(1, 0)]);
    assert_eq!(sink.positions(), vec![(1, 0), (1, 1)]);
}

/// Only the requested partitions are read
#[tokio::test]
async fn test_partition_selection() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 3)
        .with_partition(TOPIC, 1, 3)
        .with_partition(TOPIC, 2, 3);
    let request = ConsumptionRequest::new(TOPIC)
        .with_partitions(vec![2])
        .with_from_beginning(true)
        .with_exit(true);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(sink.positions(), vec![(2, 0), (2, 1), (2, 2)]);
}

/// A partition listed twice still gets a single reader
#[tokio::test]
async fn test_repeated_partition_is_read_once() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 4)
        .with_partition(TOPIC, 1, 4);
    let request = ConsumptionRequest::new(TOPIC)
        .with_partitions(vec![0, 0])
        .with_from_beginning(true)
        .with_exit(true);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(client.opened_readers(), vec![(0, 0)]);
    assert_eq!(sink.positions(), vec![(0, 0), (0, 1), (0, 2), (0, 3)]);
}

/// Repeated partitions do not take tail window slots twice
#[tokio::test]
async fn test_repeated_partition_tail() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    let request = ConsumptionRequest::new(TOPIC)
        .with_partitions(vec![0, 0, 0])
        .with_tail(3);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(sink.positions(), vec![(0, 7), (0, 8), (0, 9)]);
}

/// Explicit offsets start where asked and stop at the newest offset
#[tokio::test]
async fn test_explicit_offset_with_exit() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 10)
        .with_partition(TOPIC, 1, 4);
    let request = ConsumptionRequest::new(TOPIC)
        .with_offsets(vec!["0=6".parse().unwrap(), "1=oldest".parse().unwrap()])
        .with_exit(true);

    let (result, sink) = run(&client, request).await;
    result.unwrap();
    assert_eq!(offsets_of(&sink, 0), vec![6, 7, 8, 9]);
    assert_eq!(offsets_of(&sink, 1), vec![0, 1, 2, 3]);
}

/// Offset fetch failures abort the run before any reader starts
#[tokio::test]
async fn test_offset_fetch_failure_aborts_run() {
    let client = FakeClient::new()
        .with_partition(TOPIC, 0, 3)
        .with_partition(TOPIC, 1, 3)
        .with_offset_failure(1);
    let request = ConsumptionRequest::new(TOPIC).with_tail(2);

    let (result, sink) = run(&client, request).await;
    assert!(matches!(result, Err(ConsumeError::OffsetFetch { partition: 1, .. })));
    assert!(client.opened_readers().is_empty());
    assert!(sink.records().is_empty());
}

/// Unknown topics fail when listing partitions
#[tokio::test]
async fn test_unknown_topic() {
    let client = FakeClient::new();
    let (result, _) = run(&client, ConsumptionRequest::new("missing")).await;
    assert!(matches!(result, Err(ConsumeError::ListPartitions { .. })));
}

/// Resolving twice against an unchanged log gives the same bounds
#[tokio::test]
async fn test_resolution_is_idempotent() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 10);
    for request in [
        ConsumptionRequest::new(TOPIC).with_tail(4),
        ConsumptionRequest::new(TOPIC).with_from_beginning(true).with_exit(true),
        ConsumptionRequest::new(TOPIC),
    ] {
        let first = resolve_bound(&client, &request, 0).await.unwrap();
        let second = resolve_bound(&client, &request, 0).await.unwrap();
        assert_eq!(first, second);
    }
}

/// A followed run picks up new messages until shut down
#[tokio::test]
async fn test_follow_until_shutdown() {
    let client = FakeClient::new().with_partition(TOPIC, 0, 3);
    let consumption = Consumption::new(
        Arc::new(client.clone()),
        ConsumptionRequest::new(TOPIC),
        DeserializerChain::standard(false, Encoding::Raw, Encoding::Raw),
    );
    let coordinator = consumption.coordinator();

    let sink = MemorySink::new();
    let mut writer = sink.clone();
    let handle = tokio::spawn(async move { consumption.run(&mut writer).await });

    common::wait_until(|| !client.opened_readers().is_empty()).await;
    assert_eq!(client.opened_readers(), vec![(0, 3)]);

    client.append(TOPIC, 0, ConsumedMessage::new(0, 0).with_value("live-1"));
    client.append(TOPIC, 0, ConsumedMessage::new(0, 0).with_value("live-2"));
    common::wait_until(|| sink.records().len() == 2).await;

    coordinator.shutdown();
    common::within_deadline(handle).await.unwrap().unwrap();

    let values: Vec<String> = sink.records().into_iter().filter_map(|r| r.value).collect();
    assert_eq!(values, vec!["live-1", "live-2"]);
    assert_eq!(sink.positions(), vec![(0, 3), (0, 4)]);
    assert_eq!(client.closed_readers(), vec![0]);
}
