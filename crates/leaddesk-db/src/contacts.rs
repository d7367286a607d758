//! Database operations for the `contacts` table.

use chrono::{DateTime, Utc};
use leaddesk_core::{
    Category, ChangeKind, Contact, ContactChange, ContactStatus, NameQuality, ScoreFactors,
};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::store::ContactMerge;
use crate::{small_to_u8, DbError};

macro_rules! contact_columns {
    () => {
        "id, phone, first_name, last_name, full_name, name_quality, email, category, status, \
         urgency, lead_score, conversion_probability, score_factors, pain_points, notes, \
         transcript_excerpt, source, created_at, updated_at, last_activity_at"
    };
}

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `contacts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub name_quality: String,
    pub email: Option<String>,
    pub category: String,
    pub status: String,
    pub urgency: Option<String>,
    pub lead_score: Option<i16>,
    pub conversion_probability: Option<i16>,
    pub score_factors: Option<Json<ScoreFactors>>,
    pub pain_points: Vec<String>,
    pub notes: String,
    pub transcript_excerpt: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = DbError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let decode = |e: leaddesk_core::CoreError| DbError::Decode(e.to_string());
        Ok(Contact {
            id: row.id,
            phone: row.phone,
            first_name: row.first_name,
            last_name: row.last_name,
            full_name: row.full_name,
            name_quality: row.name_quality.parse::<NameQuality>().map_err(decode)?,
            email: row.email,
            category: row.category.parse::<Category>().map_err(decode)?,
            status: row.status.parse::<ContactStatus>().map_err(decode)?,
            urgency: row
                .urgency
                .as_deref()
                .map(str::parse::<leaddesk_core::Urgency>)
                .transpose()
                .map_err(decode)?,
            lead_score: row
                .lead_score
                .map(|v| small_to_u8("lead_score", v))
                .transpose()?,
            conversion_probability: row
                .conversion_probability
                .map(|v| small_to_u8("conversion_probability", v))
                .transpose()?,
            score_factors: row.score_factors.map(|Json(f)| f),
            pain_points: row.pain_points,
            notes: row.notes,
            transcript_excerpt: row.transcript_excerpt,
            source: row.source,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_activity_at: row.last_activity_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the active contact for a normalized phone, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Decode`] if the
/// row holds values outside the domain vocabulary.
pub async fn get_active_contact_by_phone(
    pool: &PgPool,
    phone: &str,
) -> Result<Option<Contact>, DbError> {
    let row = sqlx::query_as::<_, ContactRow>(concat!(
        "SELECT ",
        contact_columns!(),
        " FROM contacts WHERE phone = $1 AND status = 'active'"
    ))
    .bind(phone)
    .fetch_optional(pool)
    .await?;

    row.map(Contact::try_from).transpose()
}

/// Fetch one contact by id, whatever its status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_contact(pool: &PgPool, id: Uuid) -> Result<Option<Contact>, DbError> {
    let row = sqlx::query_as::<_, ContactRow>(concat!(
        "SELECT ",
        contact_columns!(),
        " FROM contacts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Contact::try_from).transpose()
}

/// Lists active `lead` contacts ordered by most recent activity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_lead_contacts(pool: &PgPool, limit: i64) -> Result<Vec<Contact>, DbError> {
    let rows = sqlx::query_as::<_, ContactRow>(concat!(
        "SELECT ",
        contact_columns!(),
        " FROM contacts \
          WHERE category = 'lead' AND status = 'active' \
          ORDER BY last_activity_at DESC, id DESC \
          LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Contact::try_from).collect()
}

/// Find, merge, and write the active contact for `phone` in one transaction.
///
/// A transaction-scoped advisory lock keyed on the phone serializes writers
/// across every process sharing the database; the row lock alone cannot cover
/// the "no row yet" case.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if a concurrent non-pipeline writer claimed
/// the phone first, or [`DbError::Sqlx`] on any other failure.
pub async fn upsert_contact_with(
    pool: &PgPool,
    phone: &str,
    merge: ContactMerge<'_>,
) -> Result<ContactChange, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(phone)
        .execute(&mut *tx)
        .await?;

    let existing = sqlx::query_as::<_, ContactRow>(concat!(
        "SELECT ",
        contact_columns!(),
        " FROM contacts WHERE phone = $1 AND status = 'active' FOR UPDATE"
    ))
    .bind(phone)
    .fetch_optional(&mut *tx)
    .await?
    .map(Contact::try_from)
    .transpose()?;

    let merged = merge(existing.as_ref());
    tracing::debug!(
        phone,
        existing = existing.is_some(),
        name_quality = merged.name_quality.as_str(),
        "writing merged contact"
    );

    let change = match existing {
        Some(current) => ContactChange {
            kind: ChangeKind::Modified,
            contact: update_contact(&mut tx, current.id, &merged).await?,
        },
        None => ContactChange {
            kind: ChangeKind::Added,
            contact: insert_contact(&mut tx, &merged).await?,
        },
    };

    tx.commit().await?;
    Ok(change)
}

async fn insert_contact(conn: &mut PgConnection, c: &Contact) -> Result<Contact, DbError> {
    let row = sqlx::query_as::<_, ContactRow>(concat!(
        "INSERT INTO contacts \
             (id, phone, first_name, last_name, full_name, name_quality, email, category, \
              status, urgency, lead_score, conversion_probability, score_factors, pain_points, \
              notes, transcript_excerpt, source, created_at, updated_at, last_activity_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20) \
         RETURNING ",
        contact_columns!()
    ))
    .bind(c.id)
    .bind(&c.phone)
    .bind(&c.first_name)
    .bind(&c.last_name)
    .bind(&c.full_name)
    .bind(c.name_quality.as_str())
    .bind(c.email.as_deref())
    .bind(c.category.as_str())
    .bind(c.status.as_str())
    .bind(c.urgency.map(leaddesk_core::Urgency::as_str))
    .bind(c.lead_score.map(i16::from))
    .bind(c.conversion_probability.map(i16::from))
    .bind(c.score_factors.map(Json))
    .bind(&c.pain_points)
    .bind(&c.notes)
    .bind(&c.transcript_excerpt)
    .bind(&c.source)
    .bind(c.created_at)
    .bind(c.updated_at)
    .bind(c.last_activity_at)
    .fetch_one(conn)
    .await
    .map_err(map_unique_violation)?;

    Contact::try_from(row)
}

async fn update_contact(conn: &mut PgConnection, id: Uuid, c: &Contact) -> Result<Contact, DbError> {
    let row = sqlx::query_as::<_, ContactRow>(concat!(
        "UPDATE contacts SET \
             first_name = $2, last_name = $3, full_name = $4, name_quality = $5, email = $6, \
             category = $7, urgency = $8, lead_score = $9, conversion_probability = $10, \
             score_factors = $11, pain_points = $12, notes = $13, transcript_excerpt = $14, \
             updated_at = $15, last_activity_at = $16 \
         WHERE id = $1 \
         RETURNING ",
        contact_columns!()
    ))
    .bind(id)
    .bind(&c.first_name)
    .bind(&c.last_name)
    .bind(&c.full_name)
    .bind(c.name_quality.as_str())
    .bind(c.email.as_deref())
    .bind(c.category.as_str())
    .bind(c.urgency.map(leaddesk_core::Urgency::as_str))
    .bind(c.lead_score.map(i16::from))
    .bind(c.conversion_probability.map(i16::from))
    .bind(c.score_factors.map(Json))
    .bind(&c.pain_points)
    .bind(&c.notes)
    .bind(&c.transcript_excerpt)
    .bind(c.updated_at)
    .bind(c.last_activity_at)
    .fetch_optional(conn)
    .await?
    .ok_or(DbError::NotFound)?;

    Contact::try_from(row)
}

fn map_unique_violation(e: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return DbError::Conflict("an active contact already holds this phone".to_string());
        }
    }
    DbError::Sqlx(e)
}
