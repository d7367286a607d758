//! The seam between the consumer and wherever leads come from.

use async_trait::async_trait;
use futures::stream::BoxStream;
use leaddesk_core::{Category, Contact, ContactChange, ContactStatus};

use crate::error::FeedError;

/// One message on a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full current lead list; always the first message.
    Snapshot(Vec<Contact>),
    Change(ContactChange),
}

pub type ChangeStream = BoxStream<'static, Result<FeedEvent, FeedError>>;

#[async_trait]
pub trait LeadFeedSource: Send + Sync {
    /// Open a push subscription. An `Err` item or the end of the stream means
    /// the subscription is gone.
    async fn subscribe(&self) -> Result<ChangeStream, FeedError>;

    /// One pull of the current lead list.
    async fn fetch_leads(&self) -> Result<Vec<Contact>, FeedError>;
}

/// Fold a change into a lead list kept newest-activity first.
///
/// Contacts that are no longer active leads are removed.
pub fn apply_change(leads: &mut Vec<Contact>, change: &ContactChange) {
    leads.retain(|c| c.id != change.contact.id);
    let contact = &change.contact;
    if contact.category == Category::Lead && contact.status == ContactStatus::Active {
        leads.push(contact.clone());
    }
    leads.sort_by(|a, b| {
        b.last_activity_at
            .cmp(&a.last_activity_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
