//! Postgres-backed [`LeadStore`].

use async_trait::async_trait;
use leaddesk_core::{Contact, ContactChange, Notification, NotificationStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{ContactMerge, EventInsert, LeadEventRecord, LeadStore};
use crate::{contacts, lead_events, notifications, DbError};

#[derive(Debug, Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn find_active_contact_by_phone(&self, phone: &str) -> Result<Option<Contact>, DbError> {
        contacts::get_active_contact_by_phone(&self.pool, phone).await
    }

    async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>, DbError> {
        contacts::get_contact(&self.pool, id).await
    }

    async fn upsert_contact_with(
        &self,
        phone: &str,
        merge: ContactMerge<'_>,
    ) -> Result<ContactChange, DbError> {
        contacts::upsert_contact_with(&self.pool, phone, merge).await
    }

    async fn insert_lead_event(&self, record: &LeadEventRecord) -> Result<EventInsert, DbError> {
        lead_events::insert_lead_event(&self.pool, record).await
    }

    async fn get_lead_event(&self, id: Uuid) -> Result<Option<LeadEventRecord>, DbError> {
        lead_events::get_lead_event(&self.pool, id).await
    }

    async fn find_lead_event_by_dedupe_key(
        &self,
        dedupe_key: &str,
    ) -> Result<Option<LeadEventRecord>, DbError> {
        lead_events::find_lead_event_by_dedupe_key(&self.pool, dedupe_key).await
    }

    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<Option<Notification>, DbError> {
        notifications::insert_notification(&self.pool, notification).await
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, DbError> {
        notifications::list_notifications(&self.pool, unread_only, limit).await
    }

    async fn set_notification_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
    ) -> Result<Notification, DbError> {
        notifications::set_notification_status(&self.pool, id, status).await
    }

    async fn list_leads(&self, limit: i64) -> Result<Vec<Contact>, DbError> {
        contacts::list_lead_contacts(&self.pool, limit).await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        crate::ping(&self.pool).await.map_err(DbError::from)
    }
}
