use std::sync::Arc;

use leaddesk_db::{LeadStore, PgLeadStore};
use leaddesk_intake::IntakePipeline;
use uuid::Uuid;

/// Reprocess one stored event against the configured database.
///
/// # Errors
///
/// Returns an error if config or the database is unavailable, or the event
/// does not exist.
pub(crate) async fn run_replay(event_id: Uuid) -> anyhow::Result<()> {
    let config = leaddesk_core::load_app_config()?;
    let pool_config = leaddesk_db::PoolConfig::from_app_config(&config);
    let pool = leaddesk_db::connect_pool(&config.database_url, pool_config).await?;
    let store: Arc<dyn LeadStore> = Arc::new(PgLeadStore::new(pool));
    let pipeline = IntakePipeline::from_config(&config, store)?;

    let outcome = pipeline.reprocess(event_id).await?;
    println!(
        "reprocessed {event_id} -> {} (contact {}, score {}/10{}{})",
        outcome.event_id,
        outcome.contact.id,
        outcome.score.score,
        if outcome.score.used_fallback { ", fallback" } else { "" },
        if outcome.notification.is_some() { ", hot lead notified" } else { "" },
    );
    Ok(())
}
