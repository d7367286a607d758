//! Database operations for the append-only `lead_events` audit table.

use chrono::{DateTime, Utc};
use leaddesk_core::{ExtractedFeatures, LeadEvent, ScoreResult};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{EventInsert, LeadEventRecord};
use crate::DbError;

/// A row from the `lead_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadEventRow {
    pub id: Uuid,
    pub dedupe_key: String,
    pub event: Json<LeadEvent>,
    pub raw_payload: Json<Value>,
    pub features: Json<ExtractedFeatures>,
    pub score: Json<ScoreResult>,
    pub contact_id: Uuid,
    pub reprocessed_from: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
}

impl From<LeadEventRow> for LeadEventRecord {
    fn from(row: LeadEventRow) -> Self {
        LeadEventRecord {
            event: row.event.0,
            raw_payload: row.raw_payload.0,
            dedupe_key: row.dedupe_key,
            features: row.features.0,
            score: row.score.0,
            contact_id: row.contact_id,
            reprocessed_from: row.reprocessed_from,
            processed_at: row.processed_at,
        }
    }
}

/// Append an audit row. Rows are never updated.
///
/// Redelivered provider events share a `dedupe_key`; the insert is skipped and
/// the id of the first row is returned as [`EventInsert::Duplicate`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either statement fails.
pub async fn insert_lead_event(
    pool: &PgPool,
    record: &LeadEventRecord,
) -> Result<EventInsert, DbError> {
    let inserted: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO lead_events \
             (id, dedupe_key, source_id, phone, event, raw_payload, features, score, \
              lead_score, used_fallback, contact_id, reprocessed_from, received_at, processed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         ON CONFLICT (dedupe_key) DO NOTHING \
         RETURNING id",
    )
    .bind(record.event.id)
    .bind(&record.dedupe_key)
    .bind(&record.event.source_id)
    .bind(&record.event.phone)
    .bind(Json(&record.event))
    .bind(Json(&record.raw_payload))
    .bind(Json(&record.features))
    .bind(Json(&record.score))
    .bind(i16::from(record.score.score))
    .bind(record.score.used_fallback)
    .bind(record.contact_id)
    .bind(record.reprocessed_from)
    .bind(record.event.received_at)
    .bind(record.processed_at)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        return Ok(EventInsert::Inserted(id));
    }

    let existing: Uuid = sqlx::query_scalar("SELECT id FROM lead_events WHERE dedupe_key = $1")
        .bind(&record.dedupe_key)
        .fetch_one(pool)
        .await?;

    Ok(EventInsert::Duplicate(existing))
}

macro_rules! lead_event_columns {
    () => {
        "id, dedupe_key, event, raw_payload, features, score, contact_id, reprocessed_from, \
         processed_at"
    };
}

/// Fetch one audit row by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or a JSON column does not
/// decode into the current domain types.
pub async fn get_lead_event(pool: &PgPool, id: Uuid) -> Result<Option<LeadEventRecord>, DbError> {
    let row = sqlx::query_as::<_, LeadEventRow>(concat!(
        "SELECT ",
        lead_event_columns!(),
        " FROM lead_events WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(LeadEventRecord::from))
}

/// Fetch the audit row recorded under `dedupe_key`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_lead_event_by_dedupe_key(
    pool: &PgPool,
    dedupe_key: &str,
) -> Result<Option<LeadEventRecord>, DbError> {
    let row = sqlx::query_as::<_, LeadEventRow>(concat!(
        "SELECT ",
        lead_event_columns!(),
        " FROM lead_events WHERE dedupe_key = $1"
    ))
    .bind(dedupe_key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(LeadEventRecord::from))
}
