//! Behavioural tests for `MemoryLeadStore`. No database required.

use std::sync::Arc;

use chrono::{Duration, Utc};
use leaddesk_core::{
    Category, ChangeKind, Contact, ContactStatus, ExtractedFeatures, LeadEvent, NameQuality,
    Notification, NotificationStatus, ScoreFactors, ScoreResult, Sentiment, Urgency,
};
use leaddesk_db::{EventInsert, LeadEventRecord, LeadStore, MemoryLeadStore};
use rust_decimal::Decimal;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_contact(phone: &str, name: &str) -> Contact {
    let now = Utc::now();
    Contact {
        id: Uuid::new_v4(),
        phone: phone.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        full_name: name.to_string(),
        name_quality: NameQuality::Placeholder,
        email: None,
        category: Category::Lead,
        status: ContactStatus::Active,
        urgency: Some(Urgency::Medium),
        lead_score: Some(5),
        conversion_probability: Some(50),
        score_factors: Some(ScoreFactors::default()),
        pain_points: vec![],
        notes: String::new(),
        transcript_excerpt: String::new(),
        source: "ai-receptionist".to_string(),
        created_at: now,
        updated_at: now,
        last_activity_at: now,
    }
}

fn make_record(dedupe_key: &str, contact_id: Uuid) -> LeadEventRecord {
    let now = Utc::now();
    LeadEventRecord {
        event: LeadEvent {
            id: Uuid::new_v4(),
            source_id: "ai-receptionist".to_string(),
            username: None,
            provider_timestamp: Some("2026-10-18T10:00:00Z".to_string()),
            caller: "+15550102020".to_string(),
            phone: "+15550102020".to_string(),
            transcript: "hello".to_string(),
            duration_secs: 60,
            satisfaction: "satisfied".to_string(),
            sentiment: Sentiment {
                positive: 50.0,
                neutral: None,
                negative: None,
            },
            summary: "call".to_string(),
            texts_sent: vec![],
            received_at: now,
        },
        raw_payload: serde_json::json!({ "caller": "+15550102020" }),
        dedupe_key: dedupe_key.to_string(),
        features: ExtractedFeatures {
            name: "+15550102020".to_string(),
            name_quality: NameQuality::Placeholder,
            email: None,
            pain_points: vec![],
            urgency: Urgency::Medium,
            budget: None,
            timeline: None,
        },
        score: ScoreResult {
            score: 5,
            conversion_probability: 50,
            factors: ScoreFactors::default(),
            used_fallback: true,
            estimated_cost: Decimal::ZERO,
        },
        contact_id,
        reprocessed_from: None,
        processed_at: now,
    }
}

fn make_notification(event_id: Uuid, created_offset_secs: i64) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        contact_id: Uuid::new_v4(),
        event_id,
        phone: "+15550102020".to_string(),
        message: "Hot lead".to_string(),
        score: 9,
        status: NotificationStatus::Unread,
        created_at: Utc::now() + Duration::seconds(created_offset_secs),
        delivered_at: None,
        read_at: None,
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upsert_creates_then_modifies_the_same_contact() {
    let store = MemoryLeadStore::new();

    let first = store
        .upsert_contact_with("+15550102020", &|existing| {
            assert!(existing.is_none());
            make_contact("+15550102020", "first")
        })
        .await
        .expect("insert");
    assert_eq!(first.kind, ChangeKind::Added);

    let second = store
        .upsert_contact_with("+15550102020", &|existing| {
            let mut c = existing.cloned().expect("existing contact");
            c.full_name = "second".to_string();
            c
        })
        .await
        .expect("update");

    assert_eq!(second.kind, ChangeKind::Modified);
    assert_eq!(second.contact.id, first.contact.id);
    assert_eq!(store.contacts().len(), 1);
    assert_eq!(store.contacts()[0].full_name, "second");
}

#[tokio::test]
async fn archived_contacts_do_not_match_by_phone() {
    let store = MemoryLeadStore::new();
    let mut archived = make_contact("+15550102020", "old");
    archived.status = ContactStatus::Archived;
    store.insert_contact(archived);

    let found = store
        .find_active_contact_by_phone("+15550102020")
        .await
        .expect("lookup");
    assert!(found.is_none());

    let change = store
        .upsert_contact_with("+15550102020", &|_| make_contact("+15550102020", "new"))
        .await
        .expect("upsert");
    assert_eq!(change.kind, ChangeKind::Added);
    assert_eq!(store.contacts().len(), 2);
}

#[tokio::test]
async fn concurrent_upserts_for_one_phone_create_one_contact() {
    let store = Arc::new(MemoryLeadStore::new());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .upsert_contact_with("+15550102020", &move |existing| match existing {
                    Some(c) => {
                        let mut c = c.clone();
                        c.notes = format!("{}|{i}", c.notes);
                        c
                    }
                    None => make_contact("+15550102020", "caller"),
                })
                .await
                .expect("upsert")
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let contacts = store.contacts();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].notes.matches('|').count(), 15);
}

#[tokio::test]
async fn write_failures_surface_as_errors() {
    let store = MemoryLeadStore::new();
    store.set_fail_writes(true);

    let result = store
        .upsert_contact_with("+15550102020", &|_| make_contact("+15550102020", "x"))
        .await;
    assert!(result.is_err());
    assert!(store.contacts().is_empty());
}

#[tokio::test]
async fn list_leads_skips_other_categories_and_orders_by_activity() {
    let store = MemoryLeadStore::new();
    let mut older = make_contact("+15550000001", "older");
    older.last_activity_at = Utc::now() - Duration::hours(2);
    let newer = make_contact("+15550000002", "newer");
    let mut client = make_contact("+15550000003", "client");
    client.category = Category::Client;
    store.insert_contact(older);
    store.insert_contact(newer);
    store.insert_contact(client);

    let leads = store.list_leads(10).await.expect("list");
    let names: Vec<&str> = leads.iter().map(|c| c.full_name.as_str()).collect();
    assert_eq!(names, vec!["newer", "older"]);

    let limited = store.list_leads(1).await.expect("list");
    assert_eq!(limited.len(), 1);
}

// ---------------------------------------------------------------------------
// Lead events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_dedupe_key_returns_first_event_id() {
    let store = MemoryLeadStore::new();
    let contact_id = Uuid::new_v4();

    let first = make_record("key-1", contact_id);
    let second = make_record("key-1", contact_id);

    let a = store.insert_lead_event(&first).await.expect("insert");
    let b = store.insert_lead_event(&second).await.expect("insert");

    assert_eq!(a, EventInsert::Inserted(first.event.id));
    assert_eq!(b, EventInsert::Duplicate(first.event.id));
    assert_eq!(store.events().len(), 1);

    let fetched = store
        .get_lead_event(first.event.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(fetched.dedupe_key, "key-1");
}

#[tokio::test]
async fn recorded_event_is_found_by_dedupe_key() {
    let store = MemoryLeadStore::new();
    let record = make_record("key-2", Uuid::new_v4());
    store.insert_lead_event(&record).await.expect("insert");

    let found = store
        .find_lead_event_by_dedupe_key("key-2")
        .await
        .expect("find")
        .expect("present");
    assert_eq!(found.event.id, record.event.id);
    assert!(store
        .find_lead_event_by_dedupe_key("unknown")
        .await
        .expect("find")
        .is_none());
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_notification_per_event() {
    let store = MemoryLeadStore::new();
    let event_id = Uuid::new_v4();

    let created = store
        .insert_notification(&make_notification(event_id, 0))
        .await
        .expect("insert");
    let repeated = store
        .insert_notification(&make_notification(event_id, 0))
        .await
        .expect("insert");

    assert!(created.is_some());
    assert!(repeated.is_none());
    assert_eq!(store.notifications().len(), 1);
}

#[tokio::test]
async fn read_is_terminal_and_stamps_both_timestamps() {
    let store = MemoryLeadStore::new();
    let n = make_notification(Uuid::new_v4(), 0);
    store.insert_notification(&n).await.expect("insert");

    let read = store
        .set_notification_status(n.id, NotificationStatus::Read)
        .await
        .expect("read");
    assert_eq!(read.status, NotificationStatus::Read);
    assert!(read.delivered_at.is_some());
    assert!(read.read_at.is_some());

    let after = store
        .set_notification_status(n.id, NotificationStatus::Delivered)
        .await
        .expect("deliver");
    assert_eq!(after.status, NotificationStatus::Read);
    assert_eq!(after.read_at, read.read_at);
}

#[tokio::test]
async fn unread_filter_hides_read_notifications() {
    let store = MemoryLeadStore::new();
    let older = make_notification(Uuid::new_v4(), -60);
    let newer = make_notification(Uuid::new_v4(), 0);
    store.insert_notification(&older).await.expect("insert");
    store.insert_notification(&newer).await.expect("insert");
    store
        .set_notification_status(older.id, NotificationStatus::Read)
        .await
        .expect("read");

    let all = store.list_notifications(false, 10).await.expect("list");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id);

    let unread = store.list_notifications(true, 10).await.expect("list");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, newer.id);
}

#[tokio::test]
async fn unknown_notification_is_not_found() {
    let store = MemoryLeadStore::new();
    let result = store
        .set_notification_status(Uuid::new_v4(), NotificationStatus::Read)
        .await;
    assert!(matches!(result, Err(leaddesk_db::DbError::NotFound)));
}
