//! Storage seam for the intake pipeline.
//!
//! [`crate::PgLeadStore`] is the production backend; [`crate::MemoryLeadStore`]
//! backs tests and local runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leaddesk_core::{
    Contact, ContactChange, ExtractedFeatures, LeadEvent, Notification, NotificationStatus,
    ScoreResult,
};
use serde_json::Value;
use uuid::Uuid;

use crate::DbError;

/// Merge policy applied inside the store's per-phone critical section.
///
/// Receives the active contact for the phone (if any) and returns the row to
/// persist. The returned contact's `id` is ignored on update.
pub type ContactMerge<'a> = &'a (dyn Fn(Option<&Contact>) -> Contact + Send + Sync);

/// One audit row: the event plus everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadEventRecord {
    pub event: LeadEvent,
    pub raw_payload: Value,
    /// Provider-delivery identity; duplicates resolve to the first row.
    pub dedupe_key: String,
    pub features: ExtractedFeatures,
    pub score: ScoreResult,
    pub contact_id: Uuid,
    pub reprocessed_from: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventInsert {
    Inserted(Uuid),
    /// A row with the same dedupe key already exists; carries its id.
    Duplicate(Uuid),
}

impl EventInsert {
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            EventInsert::Inserted(id) | EventInsert::Duplicate(id) => id,
        }
    }
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Find the active contact holding `phone`.
    async fn find_active_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DbError>;

    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DbError>;

    /// Look up, merge, and write the active contact for `phone` as one
    /// serialized unit. Two calls for the same phone never interleave.
    async fn upsert_contact_with(
        &self,
        phone: &str,
        merge: ContactMerge<'_>,
    ) -> Result<ContactChange, DbError>;

    /// Append an audit row. Idempotent on `dedupe_key`.
    async fn insert_lead_event(&self, record: &LeadEventRecord) -> Result<EventInsert, DbError>;

    async fn get_lead_event(&self, id: Uuid) -> Result<Option<LeadEventRecord>, DbError>;

    /// The audit row already recorded for a provider delivery, if any.
    async fn find_lead_event_by_dedupe_key(
        &self,
        dedupe_key: &str,
    ) -> Result<Option<LeadEventRecord>, DbError>;

    /// Create a notification. Returns `None` when one already exists for the event.
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<Notification>, DbError>;

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, DbError>;

    /// Advance a notification's status. A read notification stays read.
    async fn set_notification_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
    ) -> Result<Notification, DbError>;

    /// Active contacts with category `lead`, most recent activity first.
    async fn list_leads(&self, limit: i64) -> Result<Vec<Contact>, DbError>;

    async fn health_check(&self) -> Result<(), DbError>;
}
