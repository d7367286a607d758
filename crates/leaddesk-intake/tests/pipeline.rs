//! End-to-end pipeline tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use leaddesk_core::{ChangeKind, NameQuality, NotificationStatus, HOT_LEAD_THRESHOLD};
use leaddesk_db::{LeadStore, MemoryLeadStore};
use leaddesk_intake::{
    FeatureExtractor, IntakeError, IntakePipeline, OpenAiScorer, ScoringPolicy,
};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pipeline(store: &Arc<MemoryLeadStore>) -> IntakePipeline {
    IntakePipeline::new(
        store.clone(),
        FeatureExtractor::default(),
        ScoringPolicy::fallback_only(),
        HOT_LEAD_THRESHOLD,
    )
}

/// 200s call, 70% positive, one pain point, no urgency, no texts: score 7.
fn warm_payload() -> Value {
    json!({
        "username": "front-desk",
        "timestamp": "2026-10-18T09:30:00Z",
        "caller": "+1 (555) 010-2020",
        "transcript": "Hi, my name is Dana Lee. I have some collections on my report.",
        "sentiment": { "positive": 70, "neutral": 20, "negative": 10 },
        "duration": 200,
        "satisfaction": "satisfied",
        "summary": "Caller asked about collections",
        "texts_sent": []
    })
}

/// 200s call, 65% positive, two pain points, "asap", one text: score 10.
fn hot_payload() -> Value {
    json!({
        "username": "front-desk",
        "timestamp": "2026-10-18T10:00:00Z",
        "caller": "+1 (555) 010-2020",
        "transcript": "Hi, my name is Dana Lee. I have collections and a bankruptcy and need help asap.",
        "sentiment": { "positive": 65 },
        "duration": 200,
        "satisfaction": "satisfied",
        "summary": "Urgent credit repair request",
        "texts_sent": ["Here is your enrollment link"]
    })
}

// ---------------------------------------------------------------------------
// Scoring scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn warm_lead_scores_seven_without_notification() {
    let store = Arc::new(MemoryLeadStore::new());
    let outcome = pipeline(&store).ingest(&warm_payload()).await.expect("ingest");

    assert_eq!(outcome.score.score, 7);
    assert!(outcome.score.used_fallback);
    assert!(outcome.notification.is_none());
    assert_eq!(outcome.contact.phone, "+15550102020");
    assert_eq!(outcome.contact.full_name, "Dana Lee");
    assert_eq!(outcome.change, Some(ChangeKind::Added));
    assert!(store.notifications().is_empty());
    assert_eq!(store.events().len(), 1);
}

#[tokio::test]
async fn hot_lead_scores_ten_and_notifies_once() {
    let store = Arc::new(MemoryLeadStore::new());
    let outcome = pipeline(&store).ingest(&hot_payload()).await.expect("ingest");

    assert_eq!(outcome.score.score, 10);
    let notification = outcome.notification.expect("hot lead notification");
    assert_eq!(notification.contact_id, outcome.contact.id);
    assert_eq!(notification.event_id, outcome.event_id);
    assert_eq!(notification.status, NotificationStatus::Unread);
    assert!(notification.message.contains("+15550102020"));
    assert!(notification.message.contains("10/10"));
    assert_eq!(
        notification.message,
        "Hot lead: Dana Lee (+15550102020) scored 10/10"
    );
    assert_eq!(store.notifications().len(), 1);
}

#[tokio::test]
async fn scorer_outage_still_captures_the_lead() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let scorer = OpenAiScorer::with_base_url("k", "gpt-4o-mini", &server.uri(), 0)
        .expect("scorer")
        .with_backoff_base_ms(0);
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = IntakePipeline::new(
        store.clone(),
        FeatureExtractor::default(),
        ScoringPolicy::new(Some(Arc::new(scorer)), Duration::from_secs(5)),
        HOT_LEAD_THRESHOLD,
    );

    let outcome = pipeline.ingest(&warm_payload()).await.expect("ingest");
    assert!(outcome.score.used_fallback);
    assert_eq!(outcome.score.score, 7);
    assert_eq!(store.contacts().len(), 1);
}

// ---------------------------------------------------------------------------
// Contact resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeat_caller_keeps_one_contact_with_latest_score() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);

    let first = pipeline.ingest(&warm_payload()).await.expect("first");
    let second = pipeline.ingest(&hot_payload()).await.expect("second");

    assert_eq!(first.contact.id, second.contact.id);
    assert_eq!(second.change, Some(ChangeKind::Modified));
    let contacts = store.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].lead_score, Some(10));
    assert!(contacts[0].notes.contains("Summary: Urgent credit repair request"));
    assert_eq!(store.events().len(), 2);
}

#[tokio::test]
async fn nameless_call_does_not_erase_stored_name() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);
    pipeline.ingest(&warm_payload()).await.expect("first");

    let mut nameless = warm_payload();
    nameless["transcript"] = json!("Calling back about my collections account.");
    nameless["timestamp"] = json!("2026-10-18T11:00:00Z");
    let outcome = pipeline.ingest(&nameless).await.expect("second");

    assert_eq!(outcome.features.name, "+15550102020");
    assert_eq!(outcome.features.name_quality, NameQuality::Placeholder);
    assert_eq!(outcome.contact.full_name, "Dana Lee");
    assert_eq!(outcome.contact.first_name, "Dana");
}

#[tokio::test]
async fn unnamed_first_call_uses_phone_as_name() {
    let store = Arc::new(MemoryLeadStore::new());
    let mut body = warm_payload();
    body["transcript"] = json!("I need help with my credit.");
    let outcome = pipeline(&store).ingest(&body).await.expect("ingest");

    assert_eq!(outcome.features.name, "+15550102020");
    assert_eq!(outcome.contact.display_name(), "+15550102020");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_for_one_phone_create_one_contact() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);

    let mut tasks = Vec::new();
    for i in 0..12 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            let mut body = warm_payload();
            body["timestamp"] = json!(format!("2026-10-18T09:{i:02}:00Z"));
            pipeline.ingest(&body).await.expect("ingest")
        }));
    }
    for task in tasks {
        task.await.expect("join");
    }

    assert_eq!(store.contacts().len(), 1);
    assert_eq!(store.events().len(), 12);
}

// ---------------------------------------------------------------------------
// Idempotence and failure handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redelivered_event_keeps_one_audit_row_and_one_notification() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);

    let first = pipeline.ingest(&hot_payload()).await.expect("first");
    let again = pipeline.ingest(&hot_payload()).await.expect("again");

    assert!(!first.duplicate);
    assert!(again.duplicate);
    assert_eq!(again.event_id, first.event_id);
    assert_eq!(again.change, None);
    assert_eq!(again.score, first.score);
    assert_eq!(again.contact.id, first.contact.id);
    assert!(again.notification.is_none());
    assert_eq!(store.events().len(), 1);
    assert_eq!(store.notifications().len(), 1);
    assert_eq!(store.contacts().len(), 1);
}

#[tokio::test]
async fn late_redelivery_does_not_roll_back_a_newer_call() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);
    let mut changes = pipeline.subscribe();

    let older = pipeline.ingest(&warm_payload()).await.expect("older call");
    pipeline.ingest(&hot_payload()).await.expect("newer call");
    let retry = pipeline.ingest(&warm_payload()).await.expect("late retry");

    assert!(retry.duplicate);
    assert_eq!(retry.event_id, older.event_id);
    assert_eq!(retry.score.score, 7);
    assert_eq!(retry.contact.lead_score, Some(10));

    let contacts = store.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].lead_score, Some(10));
    assert!(contacts[0].notes.contains("Summary: Urgent credit repair request"));
    assert_eq!(store.events().len(), 2);

    // Only the two real calls reach live subscribers.
    assert!(changes.try_recv().is_ok());
    assert!(changes.try_recv().is_ok());
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn untimed_calls_with_identical_transcripts_are_both_recorded() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);
    let mut hang_up = warm_payload();
    hang_up.as_object_mut().expect("object").remove("timestamp");
    hang_up["transcript"] = json!("");

    let first = pipeline.ingest(&hang_up).await.expect("first");
    let second = pipeline.ingest(&hang_up).await.expect("second");

    assert!(!second.duplicate);
    assert_ne!(first.event_id, second.event_id);
    assert_eq!(store.events().len(), 2);
}

#[tokio::test]
async fn missing_field_is_rejected_without_side_effects() {
    let store = Arc::new(MemoryLeadStore::new());
    let mut body = warm_payload();
    body.as_object_mut().expect("object").remove("duration");

    let err = pipeline(&store).ingest(&body).await.unwrap_err();

    assert!(matches!(err, IntakeError::Validation(ref m) if m == "Missing field: duration"));
    assert!(store.contacts().is_empty());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn store_failure_surfaces_as_persistence_error() {
    let store = Arc::new(MemoryLeadStore::new());
    store.set_fail_writes(true);

    let err = pipeline(&store).ingest(&hot_payload()).await.unwrap_err();

    assert!(matches!(err, IntakeError::Persistence(_)));
    assert!(store.notifications().is_empty());
}

#[tokio::test]
async fn notification_failure_is_swallowed() {
    let store = Arc::new(MemoryLeadStore::new());
    store.set_fail_notifications(true);

    let outcome = pipeline(&store).ingest(&hot_payload()).await.expect("ingest");

    assert_eq!(outcome.score.score, 10);
    assert!(outcome.notification.is_none());
    assert_eq!(store.events().len(), 1);
}

// ---------------------------------------------------------------------------
// Reprocess and live changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reprocess_appends_a_linked_audit_row() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);
    let original = pipeline.ingest(&hot_payload()).await.expect("ingest");

    let rerun = pipeline.reprocess(original.event_id).await.expect("reprocess");

    assert_ne!(rerun.event_id, original.event_id);
    assert!(!rerun.duplicate);
    assert_eq!(rerun.contact.id, original.contact.id);
    let row = store
        .get_lead_event(rerun.event_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(row.reprocessed_from, Some(original.event_id));
    assert_eq!(store.events().len(), 2);
    // A second hot audit row earns its own notification.
    assert_eq!(store.notifications().len(), 2);
}

#[tokio::test]
async fn reprocess_of_unknown_event_is_not_found() {
    let store = Arc::new(MemoryLeadStore::new());
    let missing = Uuid::new_v4();
    let err = pipeline(&store).reprocess(missing).await.unwrap_err();
    assert!(matches!(err, IntakeError::EventNotFound(id) if id == missing));
}

#[tokio::test]
async fn subscribers_see_committed_changes() {
    let store = Arc::new(MemoryLeadStore::new());
    let pipeline = pipeline(&store);
    let mut changes = pipeline.subscribe();

    pipeline.ingest(&warm_payload()).await.expect("ingest");

    let change = changes.recv().await.expect("change");
    assert_eq!(change.kind, ChangeKind::Added);
    assert_eq!(change.contact.phone, "+15550102020");
}
