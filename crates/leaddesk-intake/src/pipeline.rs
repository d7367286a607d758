//! The intake unit of work: validate, extract, score, resolve, record, alert.
//!
//! Stages run in that order for every event. The contact write commits before
//! the audit row and the alert are attempted, so a failure part-way leaves at
//! worst a resolved contact with no audit row.
//!
//! A delivery whose dedupe key is already recorded stops before scoring and
//! returns the recorded outcome; the contact is not touched again.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaddesk_core::{
    load_keywords, AppConfig, ChangeKind, Contact, ContactChange, ExtractedFeatures,
    KeywordConfig, LeadEvent, Notification, ScoreResult,
};
use leaddesk_db::{DbError, EventInsert, LeadEventRecord, LeadStore};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::alerts::AlertDispatcher;
use crate::error::IntakeError;
use crate::extract::FeatureExtractor;
use crate::payload::{dedupe_key, parse_payload, reprocess_dedupe_key};
use crate::resolver::{ContactResolver, ResolveInput};
use crate::scoring::{LeadScorer, OpenAiScorer, ScoringPolicy};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// What one ingestion produced.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    /// The audit row id. For a redelivered event, the id of the first row.
    pub event_id: Uuid,
    pub duplicate: bool,
    pub contact: Contact,
    /// `None` when a recorded delivery was replayed without touching the contact.
    pub change: Option<ChangeKind>,
    pub features: ExtractedFeatures,
    pub score: ScoreResult,
    pub notification: Option<Notification>,
}

#[derive(Clone)]
pub struct IntakePipeline {
    store: Arc<dyn LeadStore>,
    extractor: FeatureExtractor,
    scoring: ScoringPolicy,
    resolver: ContactResolver,
    alerts: AlertDispatcher,
    changes: broadcast::Sender<ContactChange>,
}

impl IntakePipeline {
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        extractor: FeatureExtractor,
        scoring: ScoringPolicy,
        hot_lead_threshold: u8,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            resolver: ContactResolver::new(Arc::clone(&store)),
            alerts: AlertDispatcher::new(Arc::clone(&store), hot_lead_threshold),
            store,
            extractor,
            scoring,
            changes,
        }
    }

    /// Wire the pipeline from application config: keyword overrides, the
    /// OpenAI scorer when a key is present, timeout and threshold.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError`] if the keyword file cannot be loaded or
    /// compiled, or the scorer cannot be built.
    pub fn from_config(config: &AppConfig, store: Arc<dyn LeadStore>) -> Result<Self, IntakeError> {
        let keywords = match &config.keywords_path {
            Some(path) => load_keywords(path)?,
            None => KeywordConfig::default(),
        };
        let extractor = FeatureExtractor::new(&keywords)?;

        let primary: Option<Arc<dyn LeadScorer>> = match &config.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiScorer::with_base_url(
                key,
                &config.scoring_model,
                &config.scoring_base_url,
                config.scoring_max_retries,
            )?)),
            None => {
                tracing::info!("OPENAI_API_KEY not set; scoring with the deterministic scorer only");
                None
            }
        };
        let scoring = ScoringPolicy::new(primary, Duration::from_secs(config.scoring_timeout_secs));

        Ok(Self::new(store, extractor, scoring, config.hot_lead_threshold))
    }

    /// Committed contact changes, for live subscribers.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ContactChange> {
        self.changes.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    /// Process one webhook body.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::Validation`] before any side effect.
    /// - [`IntakeError::Persistence`] if the contact or audit write fails; the
    ///   payload is logged for manual replay.
    pub async fn ingest(&self, body: &Value) -> Result<IntakeOutcome, IntakeError> {
        let event = parse_payload(body, Utc::now()).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected lead payload");
        })?;
        let key = dedupe_key(&event);
        self.process(event, body, key, None).await
    }

    /// Re-run every stage for a stored event and append a new audit row
    /// pointing back at it. The stored row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::EventNotFound`] for an unknown id, or
    /// [`IntakeError::Persistence`] on a store failure.
    pub async fn reprocess(&self, event_id: Uuid) -> Result<IntakeOutcome, IntakeError> {
        let original = self
            .store
            .get_lead_event(event_id)
            .await?
            .ok_or(IntakeError::EventNotFound(event_id))?;

        let mut event = original.event;
        event.id = Uuid::new_v4();
        let key = reprocess_dedupe_key(event_id, event.id);
        tracing::info!(%event_id, new_event_id = %event.id, "reprocessing lead event");
        self.process(event, &original.raw_payload, key, Some(event_id))
            .await
    }

    async fn process(
        &self,
        event: LeadEvent,
        raw_payload: &Value,
        dedupe_key: String,
        reprocessed_from: Option<Uuid>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let recorded = self
            .store
            .find_lead_event_by_dedupe_key(&dedupe_key)
            .await
            .map_err(|e| persistence_failure(&event, raw_payload, e))?;
        if let Some(recorded) = recorded {
            return self
                .recorded_outcome(recorded)
                .await
                .map_err(|e| persistence_failure(&event, raw_payload, e));
        }

        let features = self.extractor.extract(&event.transcript, &event.phone);
        let score = self.scoring.score(&event, &features).await;

        let change = self
            .resolver
            .resolve(ResolveInput {
                event: &event,
                features: &features,
                score: &score,
            })
            .await
            .map_err(|e| persistence_failure(&event, raw_payload, e))?;

        // No receivers is fine; the dashboard may not be connected.
        let _ = self.changes.send(change.clone());

        let record = LeadEventRecord {
            event: event.clone(),
            raw_payload: raw_payload.clone(),
            dedupe_key,
            features: features.clone(),
            score: score.clone(),
            contact_id: change.contact.id,
            reprocessed_from,
            processed_at: Utc::now(),
        };
        let insert = self
            .store
            .insert_lead_event(&record)
            .await
            .map_err(|e| persistence_failure(&event, raw_payload, e))?;

        if let EventInsert::Duplicate(original) = insert {
            tracing::info!(
                event_id = %original,
                phone = %event.phone,
                "concurrent duplicate delivery; keeping the first audit row"
            );
        }

        let notification = self.alerts.dispatch(&change.contact, insert.id(), &score).await;

        tracing::info!(
            event_id = %insert.id(),
            contact_id = %change.contact.id,
            phone = %event.phone,
            score = score.score,
            used_fallback = score.used_fallback,
            hot = notification.is_some(),
            "lead captured"
        );

        Ok(IntakeOutcome {
            event_id: insert.id(),
            duplicate: matches!(insert, EventInsert::Duplicate(_)),
            contact: change.contact,
            change: Some(change.kind),
            features,
            score,
            notification,
        })
    }

    async fn recorded_outcome(&self, recorded: LeadEventRecord) -> Result<IntakeOutcome, DbError> {
        let contact = self
            .store
            .get_contact(recorded.contact_id)
            .await?
            .ok_or(DbError::NotFound)?;

        tracing::info!(
            event_id = %recorded.event.id,
            contact_id = %contact.id,
            phone = %recorded.event.phone,
            "duplicate delivery; returning the recorded outcome"
        );

        Ok(IntakeOutcome {
            event_id: recorded.event.id,
            duplicate: true,
            contact,
            change: None,
            features: recorded.features,
            score: recorded.score,
            notification: None,
        })
    }
}

fn persistence_failure(event: &LeadEvent, raw_payload: &Value, error: DbError) -> IntakeError {
    tracing::error!(
        event_id = %event.id,
        phone = %event.phone,
        payload = %raw_payload,
        error = %error,
        "lead persistence failed; payload logged for manual replay"
    );
    IntakeError::Persistence(error)
}
