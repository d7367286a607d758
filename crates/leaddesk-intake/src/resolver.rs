//! Find-or-create a contact by normalized phone and merge new call data into it.
//!
//! Names and emails are upgrade-only: a stored value is replaced only by one
//! of strictly better [`NameQuality`], and never by an empty one. Score,
//! urgency, factors, notes and the transcript excerpt always take the newest
//! event's values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use leaddesk_core::{
    Category, Contact, ContactChange, ContactStatus, ExtractedFeatures, LeadEvent, NameQuality,
    ScoreResult,
};
use leaddesk_db::{DbError, LeadStore};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

pub const CONTACT_SOURCE: &str = "ai-receptionist";
const EXCERPT_MAX_CHARS: usize = 500;

/// Everything the merge needs from one processed event.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInput<'a> {
    pub event: &'a LeadEvent,
    pub features: &'a ExtractedFeatures,
    pub score: &'a ScoreResult,
}

/// Render the contact notes for one call.
#[must_use]
pub fn call_notes(event: &LeadEvent) -> String {
    let timestamp = event
        .provider_timestamp
        .clone()
        .unwrap_or_else(|| event.received_at.to_rfc3339());
    format!(
        "Call duration: {}s\nFrom: {}\nTimestamp: {}\nSummary: {}",
        event.duration_secs,
        event.username.as_deref().unwrap_or("Unknown"),
        timestamp,
        event.summary
    )
}

fn excerpt(transcript: &str) -> String {
    transcript.trim().chars().take(EXCERPT_MAX_CHARS).collect()
}

fn apply_name(contact: &mut Contact, features: &ExtractedFeatures) {
    let stored_empty = contact.full_name.trim().is_empty();
    let better = features.name_quality > contact.name_quality;
    if features.name.trim().is_empty() || !(better || stored_empty) {
        return;
    }
    contact.first_name = features.first_name().to_string();
    contact.last_name = features.last_name();
    contact.full_name.clone_from(&features.name);
    contact.name_quality = features.name_quality;
}

/// Merge one event into the stored contact, or build a new one.
#[must_use]
pub fn merge_contact(
    existing: Option<&Contact>,
    input: ResolveInput<'_>,
    now: DateTime<Utc>,
) -> Contact {
    let ResolveInput {
        event,
        features,
        score,
    } = input;

    let mut contact = match existing {
        Some(current) => current.clone(),
        None => Contact {
            id: Uuid::new_v4(),
            phone: event.phone.clone(),
            first_name: String::new(),
            last_name: String::new(),
            full_name: String::new(),
            name_quality: NameQuality::Placeholder,
            email: None,
            category: Category::Lead,
            status: ContactStatus::Active,
            urgency: None,
            lead_score: None,
            conversion_probability: None,
            score_factors: None,
            pain_points: Vec::new(),
            notes: String::new(),
            transcript_excerpt: String::new(),
            source: CONTACT_SOURCE.to_string(),
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        },
    };

    apply_name(&mut contact, features);

    if let Some(email) = features.email.as_deref().filter(|e| !e.is_empty()) {
        if !matches!(contact.email.as_deref(), Some(stored) if !stored.is_empty()) {
            contact.email = Some(email.to_string());
        }
    }

    for point in &features.pain_points {
        if !contact.pain_points.contains(point) {
            contact.pain_points.push(point.clone());
        }
    }

    contact.urgency = Some(features.urgency);
    contact.lead_score = Some(score.score);
    contact.conversion_probability = Some(score.conversion_probability);
    contact.score_factors = Some(score.factors);
    contact.notes = call_notes(event);
    contact.transcript_excerpt = excerpt(&event.transcript);
    contact.updated_at = now;
    contact.last_activity_at = now;
    contact
}

/// Per-phone async mutexes. Entries are dropped once no task holds or waits
/// on them.
#[derive(Debug, Clone, Default)]
pub struct PhoneLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one phone's critical section.
#[derive(Debug)]
pub struct PhoneGuard {
    phone: String,
    locks: PhoneLocks,
    _guard: OwnedMutexGuard<()>,
}

impl PhoneLocks {
    pub async fn lock(&self, phone: &str) -> PhoneGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(phone.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        PhoneGuard {
            phone: phone.to_string(),
            locks: self.clone(),
            _guard: guard,
        }
    }

    /// Number of phones with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PhoneGuard {
    fn drop(&mut self) {
        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in our guard: nobody else is waiting.
        if map
            .get(&self.phone)
            .is_some_and(|m| Arc::strong_count(m) <= 2)
        {
            map.remove(&self.phone);
        }
    }
}

/// Serializes contact resolution per phone, in process and in the store.
#[derive(Clone)]
pub struct ContactResolver {
    store: Arc<dyn LeadStore>,
    locks: PhoneLocks,
}

impl ContactResolver {
    #[must_use]
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self {
            store,
            locks: PhoneLocks::default(),
        }
    }

    #[must_use]
    pub fn locks(&self) -> &PhoneLocks {
        &self.locks
    }

    /// Resolve the event's contact and commit the merge.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store write fails; nothing is committed then.
    pub async fn resolve(&self, input: ResolveInput<'_>) -> Result<ContactChange, DbError> {
        let phone = input.event.phone.as_str();
        let _guard = self.locks.lock(phone).await;
        let now = Utc::now();
        let merge = move |existing: Option<&Contact>| merge_contact(existing, input, now);
        let change = self.store.upsert_contact_with(phone, &merge).await?;
        tracing::info!(
            phone,
            contact_id = %change.contact.id,
            kind = ?change.kind,
            name_quality = change.contact.name_quality.as_str(),
            "contact resolved"
        );
        Ok(change)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
