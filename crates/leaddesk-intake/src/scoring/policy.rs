use std::sync::Arc;
use std::time::Duration;

use leaddesk_core::{ExtractedFeatures, LeadEvent, ScoreResult};

use super::fallback::fallback_score;
use super::LeadScorer;
use crate::error::ScoringError;

pub const DEFAULT_SCORING_TIMEOUT: Duration = Duration::from_secs(12);

/// Runs the primary scorer under a deadline and substitutes the deterministic
/// score on any error, timeout, or missing primary.
#[derive(Clone)]
pub struct ScoringPolicy {
    primary: Option<Arc<dyn LeadScorer>>,
    timeout: Duration,
}

impl std::fmt::Debug for ScoringPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringPolicy")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ScoringPolicy {
    #[must_use]
    pub fn new(primary: Option<Arc<dyn LeadScorer>>, timeout: Duration) -> Self {
        Self { primary, timeout }
    }

    /// Deterministic scoring only.
    #[must_use]
    pub fn fallback_only() -> Self {
        Self::new(None, DEFAULT_SCORING_TIMEOUT)
    }

    /// Always returns a score. `used_fallback` tells which path produced it.
    pub async fn score(&self, event: &LeadEvent, features: &ExtractedFeatures) -> ScoreResult {
        match self.try_primary(event, features).await {
            Ok(mut result) => {
                result.used_fallback = false;
                tracing::debug!(
                    event_id = %event.id,
                    score = result.score,
                    cost = %result.estimated_cost,
                    "primary scorer succeeded"
                );
                result
            }
            Err(ScoringError::NotConfigured) => fallback_score(event, features),
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    phone = %event.phone,
                    error = %e,
                    "primary scorer failed, using fallback score"
                );
                fallback_score(event, features)
            }
        }
    }

    async fn try_primary(
        &self,
        event: &LeadEvent,
        features: &ExtractedFeatures,
    ) -> Result<ScoreResult, ScoringError> {
        let primary = self.primary.as_ref().ok_or(ScoringError::NotConfigured)?;
        tokio::time::timeout(self.timeout, primary.score(event, features))
            .await
            .map_err(|_| ScoringError::Timeout(self.timeout))?
    }
}
