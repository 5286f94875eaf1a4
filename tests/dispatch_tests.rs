mod common;

use common::RecordingTransport;
use std::sync::Arc;
use topicbind::address::ParseError;
use topicbind::codec::{DecodeError, Value, VariableKind};
use topicbind::dispatch::{
    ApplyError, BindingError, Dispatcher, DispatcherConfig, TransportError, WriteError,
};
use topicbind::host::{HostError, MemoryStore, ParamStore};
use topicbind::registry::{RegistryError, VariableId};

type TestDispatcher<H = MemoryStore> = Dispatcher<Arc<RecordingTransport>, H>;

fn dispatcher() -> (TestDispatcher, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default(),
        transport.clone(),
        MemoryStore::new(),
    );
    (dispatcher, transport)
}

#[tokio::test]
async fn test_inbound_message_updates_variable() {
    let (dispatcher, _) = dispatcher();
    let id = dispatcher
        .bind_directive("TEMP", "FLAT:FLOAT", "plant/temp", None)
        .await
        .unwrap();

    let report = dispatcher.on_message("plant/temp", "21.5").await;

    assert_eq!(report.updated, vec![id]);
    assert!(report.failures.is_empty());
    assert_eq!(dispatcher.read(id).await, Some(Value::Float64(21.5)));
}

#[tokio::test]
async fn test_unbound_topic_is_dropped() {
    let (dispatcher, _) = dispatcher();
    dispatcher
        .bind_directive("TEMP", "FLAT:FLOAT", "plant/temp", None)
        .await
        .unwrap();

    let report = dispatcher.on_message("plant/other", "1").await;
    assert!(report.is_unmatched());
}

#[tokio::test]
async fn test_sibling_decode_failure_is_isolated() {
    let (dispatcher, _) = dispatcher();
    let int_id = dispatcher
        .bind_directive("LEVEL_INT", "FLAT:INT", "plant/level", None)
        .await
        .unwrap();
    let float_id = dispatcher
        .bind_directive("LEVEL", "FLAT:FLOAT", "plant/level", None)
        .await
        .unwrap();

    dispatcher.on_message("plant/level", "4").await;
    let report = dispatcher.on_message("plant/level", "2.5").await;

    assert_eq!(report.updated, vec![float_id]);
    assert_eq!(
        report.failures,
        vec![(int_id, ApplyError::Decode(DecodeError::NotAnInteger))]
    );
    assert_eq!(dispatcher.read(int_id).await, Some(Value::Int32(4)));
    assert_eq!(dispatcher.read(float_id).await, Some(Value::Float64(2.5)));
}

#[tokio::test]
async fn test_changes_are_notified_once_per_message() {
    let (store, mut changes) = MemoryStore::with_listener(8);
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(RecordingTransport::default()),
        store,
    );
    let a = dispatcher
        .bind_directive("A", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();
    let b = dispatcher
        .bind_directive("B", "FLAT:STRING", "plant/count", None)
        .await
        .unwrap();

    dispatcher.on_message("plant/count", "7").await;

    let batch = changes.try_recv().unwrap();
    assert_eq!(
        batch.changes,
        vec![(a, Value::Int32(7)), (b, Value::Text("7".to_string()))]
    );
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn test_masked_write_merges_current_value() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("STATUS", "FLAT:DIGITAL", "plant/status", Some(0x0F))
        .await
        .unwrap();

    dispatcher.on_message("plant/status", "165").await;
    dispatcher.write(id, Value::Digital(0x03)).await.unwrap();

    assert_eq!(
        transport.published(),
        vec![("plant/status".to_string(), "163".to_string(), false)]
    );
    assert_eq!(dispatcher.read(id).await, Some(Value::Digital(0xA3)));
}

#[tokio::test]
async fn test_back_to_back_masked_writes_keep_both_bits() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("FLAGS", "FLAT:DIGITAL", "plant/flags", None)
        .await
        .unwrap();
    dispatcher.on_message("plant/flags", "0").await;

    dispatcher.write_masked(id, 0x01, 0x01).await.unwrap();
    dispatcher.write_masked(id, 0x02, 0x02).await.unwrap();

    let payloads: Vec<_> = transport.published().into_iter().map(|p| p.1).collect();
    assert_eq!(payloads, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(dispatcher.read(id).await, Some(Value::Digital(0x03)));
}

#[tokio::test]
async fn test_rejected_publish_is_not_stored() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("FLAGS", "FLAT:DIGITAL", "plant/flags", None)
        .await
        .unwrap();
    dispatcher.on_message("plant/flags", "8").await;
    transport.set_offline(true);

    assert!(dispatcher.write_masked(id, 0x01, 0x01).await.is_err());
    assert_eq!(dispatcher.read(id).await, Some(Value::Digital(8)));
}

#[tokio::test]
async fn test_accepted_write_notifies_listener() {
    let (store, mut changes) = MemoryStore::with_listener(8);
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(RecordingTransport::default()),
        store,
    );
    let id = dispatcher
        .bind_directive("COUNT", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();

    dispatcher.write(id, Value::Int32(9)).await.unwrap();

    let batch = changes.try_recv().unwrap();
    assert_eq!(batch.changes, vec![(id, Value::Int32(9))]);
}

#[tokio::test]
async fn test_masked_write_without_baseline() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("STATUS", "FLAT:DIGITAL", "plant/status", Some(0x0F))
        .await
        .unwrap();

    let result = dispatcher.write(id, Value::Digital(0x03)).await;

    assert_eq!(result, Err(WriteError::UndefinedBaseline("STATUS".to_string())));
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn test_full_mask_skips_read() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("FLAGS", "FLAT:DIGITAL", "plant/flags", None)
        .await
        .unwrap();

    dispatcher.write(id, Value::Digital(0xFF)).await.unwrap();
    assert_eq!(transport.published()[0].1, "255");
}

#[tokio::test]
async fn test_write_masked_uses_request_mask() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("FLAGS", "FLAT:DIGITAL", "plant/flags", None)
        .await
        .unwrap();
    dispatcher.on_message("plant/flags", "240").await;

    dispatcher.write_masked(id, 0x01, 0x03).await.unwrap();

    // 0xF0 with the low two bits replaced by 0b01
    assert_eq!(transport.published()[0].1, "241");
}

#[tokio::test]
async fn test_write_encodes_arrays_and_text() {
    let (dispatcher, transport) = dispatcher();
    let ints = dispatcher
        .bind_directive("SETPOINTS", "FLAT:INTARRAY", "plant/setpoints", None)
        .await
        .unwrap();
    let label = dispatcher
        .bind_directive("LABEL", "FLAT:STRING", "plant/label", None)
        .await
        .unwrap();

    dispatcher
        .write(ints, Value::Int32Array(vec![1, -2, 3]))
        .await
        .unwrap();
    dispatcher
        .write(label, Value::Text("pump 1, left".to_string()))
        .await
        .unwrap();

    assert_eq!(
        transport.published(),
        vec![
            ("plant/setpoints".to_string(), "1,-2,3".to_string(), false),
            ("plant/label".to_string(), "pump 1, left".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn test_retain_flag_follows_config() {
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Dispatcher::new(
        DispatcherConfig {
            name: "Retaining".to_string(),
            retain_writes: true,
        },
        transport.clone(),
        MemoryStore::new(),
    );
    let id = dispatcher
        .bind_directive("COUNT", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();

    dispatcher.write(id, Value::Int32(5)).await.unwrap();
    assert!(transport.published()[0].2);
}

#[tokio::test]
async fn test_write_kind_mismatch() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("COUNT", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();

    let result = dispatcher.write(id, Value::Float64(1.0)).await;

    assert_eq!(
        result,
        Err(WriteError::KindMismatch {
            name: "COUNT".to_string(),
            expected: VariableKind::SignedInt32,
            actual: VariableKind::Float64,
        })
    );
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn test_publish_failure_is_returned() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("COUNT", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();
    transport.set_offline(true);

    let result = dispatcher.write(id, Value::Int32(1)).await;
    assert_eq!(result, Err(WriteError::Publish(TransportError::NotConnected)));

    // still serviceable afterwards
    transport.set_offline(false);
    dispatcher.write(id, Value::Int32(2)).await.unwrap();
    assert_eq!(transport.published().len(), 1);
}

#[tokio::test]
async fn test_structured_address_is_not_decoded() {
    let (dispatcher, transport) = dispatcher();
    let id = dispatcher
        .bind_directive("PRESSURE", "JSON:FLOAT", "plant/state pressure", None)
        .await
        .unwrap();

    let report = dispatcher
        .on_message("plant/state", r#"{"pressure": 1.2}"#)
        .await;
    assert_eq!(report.failures, vec![(id, ApplyError::UnsupportedFormat)]);
    assert_eq!(dispatcher.read(id).await, None);

    let result = dispatcher.write(id, Value::Float64(1.0)).await;
    assert_eq!(result, Err(WriteError::UnsupportedFormat("PRESSURE".to_string())));
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn test_duplicate_binding_rejected() {
    let (dispatcher, _) = dispatcher();
    dispatcher
        .bind_directive("A", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();

    let duplicate = dispatcher
        .bind_directive("B", "FLAT:INT", "plant/count", None)
        .await;
    assert!(matches!(
        duplicate,
        Err(BindingError::Registry(RegistryError::DuplicateBinding { ref name, ref existing, .. }))
            if name == "B" && existing == "A"
    ));

    // same address, other kind
    dispatcher
        .bind_directive("C", "FLAT:FLOAT", "plant/count", None)
        .await
        .unwrap();
    assert_eq!(dispatcher.binding_count().await, 2);
}

#[tokio::test]
async fn test_bad_directives_rejected_individually() {
    let (dispatcher, _) = dispatcher();

    assert_eq!(
        dispatcher.bind_directive("X", "FLAT:BOOL", "t", None).await,
        Err(BindingError::Parse(ParseError::UnknownType("BOOL".to_string())))
    );
    assert_eq!(
        dispatcher.bind_directive("X", "XML:INT", "t", None).await,
        Err(BindingError::Parse(ParseError::UnknownPrefix("XML".to_string())))
    );
    assert_eq!(
        dispatcher.bind_directive("X", "FLAT:INT", "   ", None).await,
        Err(BindingError::Parse(ParseError::MissingTopic))
    );
    assert!(dispatcher
        .bind_directive("Y", "FLAT:INT", "t", None)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_subscriptions_follow_bindings() {
    let (dispatcher, transport) = dispatcher();
    dispatcher
        .bind_directive("A", "FLAT:INT", "plant/a", None)
        .await
        .unwrap();
    dispatcher
        .bind_directive("A_F", "FLAT:FLOAT", "plant/a", None)
        .await
        .unwrap();
    assert!(transport.subscribed().is_empty());

    assert!(dispatcher.subscribe_all().await.is_empty());
    assert_eq!(transport.subscribed(), vec!["plant/a".to_string()]);
    assert_eq!(transport.batches().len(), 1);

    // late binding on a new topic subscribes immediately, a known topic does not
    dispatcher
        .bind_directive("B", "FLAT:INT", "plant/b", None)
        .await
        .unwrap();
    dispatcher
        .bind_directive("A_S", "FLAT:STRING", "plant/a", None)
        .await
        .unwrap();
    assert_eq!(
        transport.subscribed(),
        vec!["plant/a".to_string(), "plant/b".to_string()]
    );
}

#[tokio::test]
async fn test_subscribe_all_sends_one_request() {
    let (dispatcher, transport) = dispatcher();
    for i in 0..150 {
        dispatcher
            .bind_directive(&format!("V{i}"), "FLAT:INT", &format!("plant/{i}"), None)
            .await
            .unwrap();
    }

    assert!(dispatcher.subscribe_all().await.is_empty());
    assert!(dispatcher.subscribe_all().await.is_empty());

    let batches = transport.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|batch| batch.len() == 150));
}

#[tokio::test]
async fn test_subscribe_all_reports_failures() {
    let (dispatcher, transport) = dispatcher();
    dispatcher
        .bind_directive("A", "FLAT:INT", "plant/a", None)
        .await
        .unwrap();
    transport.set_offline(true);

    let failed = dispatcher.subscribe_all().await;
    assert_eq!(
        failed,
        vec![("plant/a".to_string(), TransportError::NotConnected)]
    );
}

#[tokio::test]
async fn test_lookup_by_name() {
    let (dispatcher, _) = dispatcher();
    let id = dispatcher
        .bind_directive("TEMP", "FLAT:FLOATARRAY", "plant/temps", None)
        .await
        .unwrap();

    assert_eq!(
        dispatcher.lookup("TEMP").await,
        Some((id, VariableKind::Float64Array))
    );
    assert_eq!(dispatcher.lookup("MISSING").await, None);
}

/// Store that refuses every write
struct ReadOnlyStore;

impl ParamStore for ReadOnlyStore {
    fn read(&self, _id: VariableId) -> Option<Value> {
        None
    }

    fn write(&mut self, id: VariableId, _value: Value) -> Result<(), HostError> {
        Err(HostError::Rejected(id, "read only".to_string()))
    }

    fn notify_changed(&mut self, _ids: &[VariableId]) {}
}

#[tokio::test]
async fn test_host_rejection_is_reported() {
    let dispatcher: TestDispatcher<ReadOnlyStore> = Dispatcher::new(
        DispatcherConfig::default(),
        Arc::new(RecordingTransport::default()),
        ReadOnlyStore,
    );
    let id = dispatcher
        .bind_directive("COUNT", "FLAT:INT", "plant/count", None)
        .await
        .unwrap();

    let report = dispatcher.on_message("plant/count", "3").await;

    assert!(report.updated.is_empty());
    assert!(matches!(
        report.failures.as_slice(),
        [(failed, ApplyError::Host(HostError::Rejected(..)))] if *failed == id
    ));
}
