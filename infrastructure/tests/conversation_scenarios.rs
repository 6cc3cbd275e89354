//! End-to-end conversations over the in-memory bus against simulated
//! contributors.

use bitrelay_application::{
    BlockingEventSink, ClientError, ClientSettings, ConversationConfig, ConversationMediator,
    DeleteFileInput, EventSink, MessageSender, OperationClient, QueryScope, ReplaceFileInput,
};
use bitrelay_domain::{
    ChecksumAlgorithm, ChecksumSpec, ContributorId, CorrelationId, Message, MessageBody,
    OperationEvent, OperationEventKind, OperationKind, OperationResult, ResponseCode,
    ResponseInfo,
};
use bitrelay_infrastructure::{
    ContributorBehaviour, IdentifyBehaviour, InMemoryFileExchange, InMemoryMessageBus,
    JsonlEventRecorder, OperationBehaviour, RecordingEventSink, Sha2ChecksumProvider,
    SimulatedCollection,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3600);

struct Harness {
    bus: Arc<InMemoryMessageBus>,
    collection: SimulatedCollection,
    client: OperationClient,
}

impl Harness {
    fn new(config: ConversationConfig) -> Self {
        let bus = InMemoryMessageBus::new();
        let settings = ClientSettings::new("client", "col", ids(&["p1", "p2", "p3"]));
        let collection = SimulatedCollection::spawn(&bus, &settings);
        let mediator = ConversationMediator::new(
            bus.clone(),
            settings.receiver_destination.clone(),
            config.mediator_cleanup_interval,
        );
        let client = OperationClient::new(
            settings,
            config,
            mediator,
            bus.clone(),
            Arc::new(Sha2ChecksumProvider),
        );
        Self {
            bus,
            collection,
            client,
        }
    }

    fn contributor(&self, name: &str) -> &Arc<bitrelay_infrastructure::SimulatedContributor> {
        self.collection.get(&id(name)).unwrap()
    }

    fn behave(&self, name: &str, behaviour: ContributorBehaviour) {
        self.contributor(name).set_behaviour(behaviour);
    }
}

fn id(name: &str) -> ContributorId {
    ContributorId::new(name)
}

fn ids(names: &[&str]) -> Vec<ContributorId> {
    names.iter().map(|n| id(n)).collect()
}

fn set(names: &[&str]) -> BTreeSet<ContributorId> {
    ids(names).into_iter().collect()
}

fn of_kind(events: &[OperationEvent], kind: OperationEventKind) -> Vec<OperationEvent> {
    events.iter().filter(|e| e.kind == kind).cloned().collect()
}

fn contributors(events: &[OperationEvent]) -> BTreeSet<ContributorId> {
    events.iter().filter_map(|e| e.contributor.clone()).collect()
}

fn sink() -> Arc<BlockingEventSink> {
    Arc::new(BlockingEventSink::new())
}

#[tokio::test(start_paused = true)]
async fn identification_timeout_executes_against_responders_only() {
    let h = Harness::new(ConversationConfig::default());
    h.collection.store_everywhere("f1", b"abc");
    h.behave(
        "p3",
        ContributorBehaviour::default().with_identify(IdentifyBehaviour::Silent),
    );
    let events = sink();

    h.client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();
    assert_eq!(terminal.kind, OperationEventKind::Complete);

    let all = events.events();
    assert_eq!(of_kind(&all, OperationEventKind::TimedOut).len(), 1);

    let selected = of_kind(&all, OperationEventKind::ContributorsSelected);
    let selected: BTreeSet<_> = selected[0].selected.iter().cloned().collect();
    assert_eq!(selected, set(&["p1", "p2"]));

    // ContributorComplete for p1 and p2, then Complete.
    let tail: Vec<_> = all
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                OperationEventKind::ContributorComplete | OperationEventKind::Complete
            )
        })
        .cloned()
        .collect();
    assert_eq!(tail.len(), 3);
    assert_eq!(contributors(&tail[..2]), set(&["p1", "p2"]));
    assert_eq!(tail[2].kind, OperationEventKind::Complete);
    assert_eq!(tail[2].contributor_results.len(), 2);

    assert_eq!(h.contributor("p3").operation_requests(), 0);
    assert_eq!(h.contributor("p1").operation_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_positive_identification_ends_without_execution() {
    let h = Harness::new(ConversationConfig::default());
    for name in ["p1", "p2", "p3"] {
        h.behave(
            name,
            ContributorBehaviour::default().with_identify(IdentifyBehaviour::Refuse),
        );
    }
    let events = sink();

    h.client
        .get_checksums(ChecksumSpec::default(), QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::NoContributorFound);
    for name in ["p1", "p2", "p3"] {
        assert_eq!(h.contributor(name).operation_requests(), 0);
    }
    assert!(of_kind(&events.events(), OperationEventKind::RequestSent).is_empty());
}

#[tokio::test(start_paused = true)]
async fn specific_selection_only_selects_target() {
    let h = Harness::new(ConversationConfig::default());
    h.collection.store_everywhere("f1", b"abc");
    let events = sink();

    h.client
        .delete_file(DeleteFileInput::new("f1").at(id("p2")), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();
    assert_eq!(terminal.kind, OperationEventKind::Complete);

    let selected = of_kind(&events.events(), OperationEventKind::ContributorsSelected);
    assert_eq!(selected[0].selected, ids(&["p2"]));
    assert!(h.contributor("p1").has_file("f1"));
    assert!(!h.contributor("p2").has_file("f1"));
    assert!(h.contributor("p3").has_file("f1"));
    assert_eq!(h.contributor("p1").operation_requests(), 0);
    assert_eq!(h.contributor("p3").operation_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn get_file_picks_fastest_contributor() {
    let h = Harness::new(ConversationConfig::default());
    h.collection.store_everywhere("f1", b"payload");
    for (name, ms) in [("p1", 500), ("p2", 100), ("p3", 300)] {
        h.behave(
            name,
            ContributorBehaviour::default().with_time_to_deliver(Duration::from_millis(ms)),
        );
    }
    let events = sink();
    let upload = InMemoryFileExchange::address_for("download/f1");

    h.client
        .get_file("f1", upload.clone(), None, events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Complete);
    assert_eq!(terminal.contributor_results.len(), 1);
    assert_eq!(terminal.contributor_results[0].contributor, id("p2"));
    assert_eq!(
        h.collection.exchange().download(&upload).as_deref(),
        Some(&b"payload"[..])
    );
}

#[tokio::test(start_paused = true)]
async fn put_from_bytes_stores_everywhere() {
    let h = Harness::new(ConversationConfig::default());
    let address = InMemoryFileExchange::address_for("upload/f1");
    h.collection.exchange().upload(&address, b"hello".to_vec());
    let events = sink();

    h.client
        .put_file_from_bytes(
            "f1",
            address,
            b"hello",
            ChecksumAlgorithm::Sha256,
            events.clone(),
        )
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Complete);
    let expected = Sha2ChecksumProvider::digest(ChecksumAlgorithm::Sha256, b"hello");
    for result in &terminal.contributor_results {
        match &result.result {
            Some(OperationResult::PutFile {
                checksum: Some(checksum),
            }) => assert_eq!(checksum.value, expected),
            other => panic!("unexpected result {:?}", other),
        }
    }
    for name in ["p1", "p2", "p3"] {
        assert_eq!(h.contributor(name).file("f1").as_deref(), Some(&b"hello"[..]));
    }
    assert!(!of_kind(&events.events(), OperationEventKind::Progress).is_empty());
}

#[tokio::test(start_paused = true)]
async fn replace_with_wrong_existing_checksum_fails_at_every_contributor() {
    let h = Harness::new(ConversationConfig::default());
    h.collection.store_everywhere("f1", b"old");
    let address = InMemoryFileExchange::address_for("upload/f1-new");
    h.collection.exchange().upload(&address, b"new".to_vec());
    let wrong = Sha2ChecksumProvider::digest(ChecksumAlgorithm::Sha256, b"something else");
    let events = sink();

    h.client
        .replace_file(
            ReplaceFileInput::new(
                "f1",
                bitrelay_domain::ChecksumData::new(ChecksumAlgorithm::Sha256, wrong),
                address,
                3,
            ),
            events.clone(),
        )
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Failed);
    assert!(terminal.info.contains("EXISTING_FILE_CHECKSUM_FAILURE"));
    let failed = of_kind(&events.events(), OperationEventKind::ContributorFailed);
    assert_eq!(contributors(&failed), set(&["p1", "p2", "p3"]));
    assert_eq!(h.contributor("p1").file("f1").as_deref(), Some(&b"old"[..]));
}

#[tokio::test(start_paused = true)]
async fn contributor_failure_names_contributor_and_code() {
    let h = Harness::new(ConversationConfig::default());
    h.behave(
        "p2",
        ContributorBehaviour::default()
            .with_operation(OperationBehaviour::Fail(ResponseCode::FileNotFound)),
    );
    let events = sink();

    h.client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Failed);
    assert!(terminal.info.contains("p2 (FILE_NOT_FOUND"));
    assert_eq!(terminal.contributor_results.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn tolerated_failure_still_completes() {
    let h = Harness::new(ConversationConfig::default().with_fail_on_contributor_failure(false));
    h.behave(
        "p1",
        ContributorBehaviour::default().with_operation(OperationBehaviour::Fail(ResponseCode::Failure)),
    );
    let events = sink();

    h.client
        .get_audit_trails(None, QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Complete);
    assert!(terminal.info.ends_with("1 failed"));
}

#[tokio::test(start_paused = true)]
async fn silent_execution_times_out_naming_contributor() {
    let config = ConversationConfig::default().with_operation_timeout(Duration::from_secs(30));
    let h = Harness::new(config);
    h.behave(
        "p3",
        ContributorBehaviour::default().with_operation(OperationBehaviour::Silent),
    );
    let events = sink();

    h.client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Failed);
    assert!(terminal.info.contains("p3"));
    let failed = of_kind(&events.events(), OperationEventKind::ContributorFailed);
    assert_eq!(contributors(&failed), set(&["p3"]));
}

#[tokio::test(start_paused = true)]
async fn sweep_fails_and_evicts_expired_conversation() {
    let config = ConversationConfig::default()
        .with_conversation_timeout(Duration::from_secs(5))
        .with_mediator_cleanup_interval(Duration::from_secs(1));
    let h = Harness::new(config);
    for name in ["p1", "p2", "p3"] {
        h.behave(
            name,
            ContributorBehaviour::default().with_operation(OperationBehaviour::Silent),
        );
    }
    let events = sink();

    let conversation = h
        .client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    let terminal = events.wait_for_finish(WAIT).await.unwrap();

    assert_eq!(terminal.kind, OperationEventKind::Failed);
    assert!(terminal.info.contains("timed out"));
    assert!(conversation.has_ended());
    assert!(!h.client.mediator().contains(conversation.correlation_id()));
}

#[tokio::test(start_paused = true)]
async fn finished_conversations_are_evicted_by_sweep() {
    let config = ConversationConfig::default().with_mediator_cleanup_interval(Duration::from_secs(1));
    let h = Harness::new(config);
    let events = sink();

    let conversation = h
        .client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    events.wait_for_finish(WAIT).await.unwrap();
    assert!(h.client.mediator().contains(conversation.correlation_id()));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.client.mediator().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_final_reply_after_finish_is_silent() {
    let h = Harness::new(ConversationConfig::default());
    let events = sink();

    let conversation = h
        .client
        .get_file_ids(QueryScope::all().at(ids(&["p1"])), events.clone())
        .unwrap();
    events.wait_for_finish(WAIT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let before = events.events().len();

    let replay = Message {
        correlation_id: conversation.correlation_id().clone(),
        from: "p1".to_string(),
        to: "client-receiver".to_string(),
        reply_to: "p1-queue".to_string(),
        collection_id: "col".to_string(),
        body: MessageBody::FinalResponse {
            operation: OperationKind::GetFileIds,
            contributor_id: id("p1"),
            response_info: Some(ResponseInfo::completed()),
            result: None,
        },
    };
    h.bus.send(replay.clone());
    h.bus.send(replay);
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(events.events().len(), before);
}

#[tokio::test(start_paused = true)]
async fn unknown_correlation_id_is_dropped() {
    let h = Harness::new(ConversationConfig::default());

    h.bus.send(Message {
        correlation_id: CorrelationId::new("never-started"),
        from: "p1".to_string(),
        to: "client-receiver".to_string(),
        reply_to: "p1-queue".to_string(),
        collection_id: "col".to_string(),
        body: MessageBody::FinalResponse {
            operation: OperationKind::GetFileIds,
            contributor_id: id("p1"),
            response_info: Some(ResponseInfo::completed()),
            result: None,
        },
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.client.mediator().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_fails_running_operation() {
    let h = Harness::new(ConversationConfig::default());
    for name in ["p1", "p2", "p3"] {
        h.behave(
            name,
            ContributorBehaviour::default().with_operation(OperationBehaviour::Silent),
        );
    }
    let events = sink();

    let conversation = h
        .client
        .get_file_ids(QueryScope::all(), events.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.client.cancel(conversation.correlation_id()));
    assert!(!h.client.cancel(conversation.correlation_id()));

    let terminal = events.wait_for_finish(WAIT).await.unwrap();
    assert_eq!(terminal.kind, OperationEventKind::Failed);
    assert!(terminal.info.contains("cancelled"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_conversations_do_not_interfere() {
    let h = Harness::new(ConversationConfig::default());
    h.collection.store_everywhere("f1", b"abc");
    let first = sink();
    let second = sink();

    let a = h
        .client
        .get_file_ids(QueryScope::all(), first.clone())
        .unwrap();
    let b = h
        .client
        .get_checksums(
            ChecksumSpec::default(),
            QueryScope::all().for_file("f1"),
            second.clone(),
        )
        .unwrap();
    assert_ne!(a.correlation_id(), b.correlation_id());

    let first_terminal = first.wait_for_finish(WAIT).await.unwrap();
    let second_terminal = second.wait_for_finish(WAIT).await.unwrap();
    assert_eq!(first_terminal.operation, OperationKind::GetFileIds);
    assert_eq!(second_terminal.operation, OperationKind::GetChecksums);
    assert!(first.events().iter().all(|e| e.correlation_id == *a.correlation_id()));
    assert!(second.events().iter().all(|e| e.correlation_id == *b.correlation_id()));
}

#[tokio::test(start_paused = true)]
async fn events_are_recorded_as_jsonl() {
    let h = Harness::new(ConversationConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let recorder = Arc::new(JsonlEventRecorder::new(&path).unwrap());
    let events = sink();
    let recording: Arc<dyn EventSink> =
        Arc::new(RecordingEventSink::new(recorder.clone(), events.clone()));

    h.client
        .get_file_ids(QueryScope::all(), recording)
        .unwrap();
    events.wait_for_finish(WAIT).await.unwrap();
    drop(recorder);

    let content = std::fs::read_to_string(&path).unwrap();
    let kinds: Vec<String> = content
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["kind"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds.first().map(String::as_str), Some("IdentifyRequestSent"));
    assert_eq!(kinds.last().map(String::as_str), Some("Complete"));
}

#[tokio::test(start_paused = true)]
async fn invalid_input_never_reaches_the_bus() {
    let h = Harness::new(ConversationConfig::default());
    let published = h.bus.published();

    let err = h
        .client
        .get_file("", "mem://x", None, sink())
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingFileId(OperationKind::GetFile)));

    let err = h
        .client
        .get_file_ids(QueryScope::all().at(ids(&["p9"])), sink())
        .unwrap_err();
    assert!(matches!(err, ClientError::UnknownContributor(_, _)));

    assert_eq!(h.bus.published(), published);
}
