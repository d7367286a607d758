//! Hot-lead notifications. Failures are logged and swallowed.

use std::sync::Arc;

use chrono::Utc;
use leaddesk_core::{Contact, Notification, NotificationStatus, ScoreResult};
use leaddesk_db::LeadStore;
use uuid::Uuid;

#[must_use]
pub fn hot_lead_message(contact: &Contact, score: u8) -> String {
    format!(
        "Hot lead: {} ({}) scored {}/10",
        contact.display_name(),
        contact.phone,
        score
    )
}

#[derive(Clone)]
pub struct AlertDispatcher {
    store: Arc<dyn LeadStore>,
    threshold: u8,
}

impl AlertDispatcher {
    #[must_use]
    pub fn new(store: Arc<dyn LeadStore>, threshold: u8) -> Self {
        Self { store, threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Create the notification for a hot lead.
    ///
    /// Returns `None` when the score is below the threshold, when the event
    /// already has a notification, or when the write fails.
    pub async fn dispatch(
        &self,
        contact: &Contact,
        event_id: Uuid,
        score: &ScoreResult,
    ) -> Option<Notification> {
        if !score.is_hot(self.threshold) {
            return None;
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            contact_id: contact.id,
            event_id,
            phone: contact.phone.clone(),
            message: hot_lead_message(contact, score.score),
            score: score.score,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
            delivered_at: None,
            read_at: None,
        };

        match self.store.insert_notification(&notification).await {
            Ok(Some(created)) => {
                tracing::info!(
                    notification_id = %created.id,
                    contact_id = %contact.id,
                    %event_id,
                    score = score.score,
                    "hot lead notification created"
                );
                Some(created)
            }
            Ok(None) => {
                tracing::debug!(%event_id, "notification already exists for event");
                None
            }
            Err(e) => {
                tracing::warn!(
                    contact_id = %contact.id,
                    %event_id,
                    error = %e,
                    "failed to create hot lead notification"
                );
                None
            }
        }
    }
}
