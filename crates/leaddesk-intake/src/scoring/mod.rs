//! Lead scoring: an external AI scorer with a deterministic fallback, both
//! behind [`LeadScorer`] and selected by [`ScoringPolicy`].

mod ai;
mod fallback;
mod policy;
mod retry;

use async_trait::async_trait;
use leaddesk_core::{ExtractedFeatures, LeadEvent, ScoreResult};

use crate::error::ScoringError;

pub use ai::{OpenAiScorer, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use fallback::{fallback_score, FallbackScorer, SENTIMENT_HIGH_BAND, SENTIMENT_LOW_BAND};
pub use policy::{ScoringPolicy, DEFAULT_SCORING_TIMEOUT};

#[async_trait]
pub trait LeadScorer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Score one event.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] when the scorer cannot produce a valid result.
    async fn score(
        &self,
        event: &LeadEvent,
        features: &ExtractedFeatures,
    ) -> Result<ScoreResult, ScoringError>;
}
