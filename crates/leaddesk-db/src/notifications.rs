//! Database operations for the `notifications` table.

use chrono::{DateTime, Utc};
use leaddesk_core::{Notification, NotificationStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{small_to_u8, DbError};

/// A row from the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub event_id: Uuid,
    pub phone: String,
    pub message: String,
    pub score: i16,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DbError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            contact_id: row.contact_id,
            event_id: row.event_id,
            phone: row.phone,
            message: row.message,
            score: small_to_u8("score", row.score)?,
            status: row
                .status
                .parse::<NotificationStatus>()
                .map_err(|e| DbError::Decode(e.to_string()))?,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
            read_at: row.read_at,
        })
    }
}

/// Insert a notification unless the event already has one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_notification(
    pool: &PgPool,
    n: &Notification,
) -> Result<Option<Notification>, DbError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        "INSERT INTO notifications \
             (id, contact_id, event_id, phone, message, score, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (event_id) DO NOTHING \
         RETURNING id, contact_id, event_id, phone, message, score, status, created_at, \
                   delivered_at, read_at",
    )
    .bind(n.id)
    .bind(n.contact_id)
    .bind(n.event_id)
    .bind(&n.phone)
    .bind(&n.message)
    .bind(i16::from(n.score))
    .bind(n.status.as_str())
    .bind(n.created_at)
    .fetch_optional(pool)
    .await?;

    row.map(Notification::try_from).transpose()
}

/// List notifications newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_notifications(
    pool: &PgPool,
    unread_only: bool,
    limit: i64,
) -> Result<Vec<Notification>, DbError> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id, contact_id, event_id, phone, message, score, status, created_at, \
                delivered_at, read_at \
         FROM notifications \
         WHERE ($1 = false OR status <> 'read') \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(unread_only)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Notification::try_from).collect()
}

/// Move a notification to `delivered` or `read`, stamping the matching
/// timestamp once. `read` is terminal.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no notification has `id`.
pub async fn set_notification_status(
    pool: &PgPool,
    id: Uuid,
    status: NotificationStatus,
) -> Result<Notification, DbError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        "UPDATE notifications SET \
             status = CASE WHEN status = 'read' THEN 'read' ELSE $2::text END, \
             delivered_at = CASE WHEN $2::text IN ('delivered', 'read') \
                                 THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END, \
             read_at = CASE WHEN $2::text = 'read' THEN COALESCE(read_at, NOW()) ELSE read_at END \
         WHERE id = $1 \
         RETURNING id, contact_id, event_id, phone, message, score, status, created_at, \
                   delivered_at, read_at",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Notification::try_from(row)
}
