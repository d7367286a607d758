//! In-process [`LeadStore`] for tests and database-less local runs.
//!
//! Every operation runs under one mutex, so `upsert_contact_with` is
//! trivially serialized per phone. Failure switches let callers exercise the
//! persistence and notification error paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use leaddesk_core::{
    Category, ChangeKind, Contact, ContactChange, ContactStatus, Notification,
    NotificationStatus,
};
use uuid::Uuid;

use crate::store::{ContactMerge, EventInsert, LeadEventRecord, LeadStore};
use crate::DbError;

#[derive(Debug, Default)]
struct State {
    contacts: Vec<Contact>,
    events: Vec<LeadEventRecord>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    fail_notifications: AtomicBool,
}

impl MemoryLeadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make contact and audit writes fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make notification inserts fail with a database error.
    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    /// Seed a contact directly, bypassing the merge path.
    pub fn insert_contact(&self, contact: Contact) {
        self.lock().contacts.push(contact);
    }

    #[must_use]
    pub fn contacts(&self) -> Vec<Contact> {
        self.lock().contacts.clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<LeadEventRecord> {
        self.lock().events.clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writes(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn clamp_limit(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn find_active_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DbError> {
        Ok(self
            .lock()
            .contacts
            .iter()
            .find(|c| c.phone == phone && c.status == ContactStatus::Active)
            .cloned())
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DbError> {
        Ok(self.lock().contacts.iter().find(|c| c.id == id).cloned())
    }

    async fn upsert_contact_with(
        &self,
        phone: &str,
        merge: ContactMerge<'_>,
    ) -> Result<ContactChange, DbError> {
        self.check_writes()?;
        let mut state = self.lock();

        let slot = state
            .contacts
            .iter()
            .position(|c| c.phone == phone && c.status == ContactStatus::Active);

        match slot {
            Some(idx) => {
                let current = &state.contacts[idx];
                let mut merged = merge(Some(current));
                merged.id = current.id;
                merged.phone = current.phone.clone();
                merged.status = current.status;
                merged.created_at = current.created_at;
                state.contacts[idx] = merged.clone();
                Ok(ContactChange {
                    kind: ChangeKind::Modified,
                    contact: merged,
                })
            }
            None => {
                let created = merge(None);
                state.contacts.push(created.clone());
                Ok(ContactChange {
                    kind: ChangeKind::Added,
                    contact: created,
                })
            }
        }
    }

    async fn insert_lead_event(&self, record: &LeadEventRecord) -> Result<EventInsert, DbError> {
        self.check_writes()?;
        let mut state = self.lock();

        if let Some(existing) = state
            .events
            .iter()
            .find(|e| e.dedupe_key == record.dedupe_key)
        {
            return Ok(EventInsert::Duplicate(existing.event.id));
        }

        state.events.push(record.clone());
        Ok(EventInsert::Inserted(record.event.id))
    }

    async fn get_lead_event(&self, id: Uuid) -> Result<Option<LeadEventRecord>, DbError> {
        Ok(self.lock().events.iter().find(|e| e.event.id == id).cloned())
    }

    async fn find_lead_event_by_dedupe_key(
        &self,
        dedupe_key: &str,
    ) -> Result<Option<LeadEventRecord>, DbError> {
        Ok(self
            .lock()
            .events
            .iter()
            .find(|e| e.dedupe_key == dedupe_key)
            .cloned())
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<Notification>, DbError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.lock();

        if state
            .notifications
            .iter()
            .any(|n| n.event_id == notification.event_id)
        {
            return Ok(None);
        }

        state.notifications.push(notification.clone());
        Ok(Some(notification.clone()))
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, DbError> {
        let mut rows: Vec<Notification> = self
            .lock()
            .notifications
            .iter()
            .filter(|n| !unread_only || n.status != NotificationStatus::Read)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(clamp_limit(limit));
        Ok(rows)
    }

    async fn set_notification_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
    ) -> Result<Notification, DbError> {
        let mut state = self.lock();
        let n = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(DbError::NotFound)?;

        let now = Utc::now();
        if n.status != NotificationStatus::Read {
            n.status = status;
        }
        if matches!(
            status,
            NotificationStatus::Delivered | NotificationStatus::Read
        ) {
            n.delivered_at.get_or_insert(now);
        }
        if status == NotificationStatus::Read {
            n.read_at.get_or_insert(now);
        }
        Ok(n.clone())
    }

    async fn list_leads(&self, limit: i64) -> Result<Vec<Contact>, DbError> {
        let mut rows: Vec<Contact> = self
            .lock()
            .contacts
            .iter()
            .filter(|c| c.category == Category::Lead && c.status == ContactStatus::Active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(clamp_limit(limit));
        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), DbError> {
        Ok(())
    }
}
