//! Deterministic weighted scorer. No I/O, never fails.

use async_trait::async_trait;
use leaddesk_core::{ExtractedFeatures, LeadEvent, ScoreFactors, ScoreResult, Urgency};
use rust_decimal::Decimal;

use super::LeadScorer;
use crate::error::ScoringError;

/// Positive-sentiment percentage earning the +2 bonus.
pub const SENTIMENT_HIGH_BAND: f64 = 60.0;
/// Positive-sentiment percentage earning the +1 bonus.
pub const SENTIMENT_LOW_BAND: f64 = 40.0;

const BASE_SCORE: u8 = 1;

fn duration_bonus(secs: u32) -> u8 {
    match secs {
        s if s > 180 => 3,
        s if s > 90 => 2,
        s if s > 45 => 1,
        _ => 0,
    }
}

fn sentiment_bonus(positive: f64) -> u8 {
    if positive >= SENTIMENT_HIGH_BAND {
        2
    } else if positive >= SENTIMENT_LOW_BAND {
        1
    } else {
        0
    }
}

fn pain_point_bonus(count: usize) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        _ => 2,
    }
}

/// Score an event from duration, sentiment, pain points, urgency and texts.
///
/// | Signal                  | Bonus |
/// |-------------------------|-------|
/// | duration > 180s / 90s / 45s | +3 / +2 / +1 |
/// | positive sentiment ≥ 60 / ≥ 40 | +2 / +1 |
/// | pain points ≥ 2 / 1     | +2 / +1 |
/// | urgency high            | +1 |
/// | any outbound text       | +1 |
///
/// Base score is 1 and the total is clamped to 1–10. Conversion probability
/// is `score * 10`, plus 10 for sentiment ≥ 60 and 10 for high urgency,
/// capped at 100.
#[must_use]
pub fn fallback_score(event: &LeadEvent, features: &ExtractedFeatures) -> ScoreResult {
    let duration = duration_bonus(event.duration_secs);
    let sentiment = sentiment_bonus(event.sentiment.positive);
    let pain = pain_point_bonus(features.pain_points.len());
    let urgency = u8::from(features.urgency == Urgency::High);
    let engagement = u8::from(!event.texts_sent.is_empty());

    let score = (BASE_SCORE + duration + sentiment + pain + urgency + engagement).clamp(1, 10);

    let mut probability = u16::from(score) * 10;
    if event.sentiment.positive >= SENTIMENT_HIGH_BAND {
        probability += 10;
    }
    if features.urgency == Urgency::High {
        probability += 10;
    }
    let conversion_probability = u8::try_from(probability.min(100)).unwrap_or(100);

    ScoreResult {
        score,
        conversion_probability,
        factors: ScoreFactors {
            conversation_quality: duration + sentiment,
            pain_points: pain,
            urgency,
            demographics: 0,
            engagement,
        },
        used_fallback: true,
        estimated_cost: Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackScorer;

#[async_trait]
impl LeadScorer for FallbackScorer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn score(
        &self,
        event: &LeadEvent,
        features: &ExtractedFeatures,
    ) -> Result<ScoreResult, ScoringError> {
        Ok(fallback_score(event, features))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leaddesk_core::{NameQuality, Sentiment};
    use uuid::Uuid;

    use super::*;

    fn event(duration_secs: u32, positive: f64, texts: usize) -> LeadEvent {
        LeadEvent {
            id: Uuid::new_v4(),
            source_id: "ai-receptionist".to_string(),
            username: None,
            provider_timestamp: None,
            caller: "+15550102020".to_string(),
            phone: "+15550102020".to_string(),
            transcript: String::new(),
            duration_secs,
            satisfaction: String::new(),
            sentiment: Sentiment {
                positive,
                neutral: None,
                negative: None,
            },
            summary: String::new(),
            texts_sent: vec!["text".to_string(); texts],
            received_at: Utc::now(),
        }
    }

    fn features(pain_points: &[&str], urgency: Urgency) -> ExtractedFeatures {
        ExtractedFeatures {
            name: "Dana Lee".to_string(),
            name_quality: NameQuality::SelfIntroduced,
            email: None,
            pain_points: pain_points.iter().map(|s| (*s).to_string()).collect(),
            urgency,
            budget: None,
            timeline: None,
        }
    }

    #[test]
    fn duration_bands_are_exclusive_lower_bounds() {
        assert_eq!(duration_bonus(181), 3);
        assert_eq!(duration_bonus(180), 2);
        assert_eq!(duration_bonus(91), 2);
        assert_eq!(duration_bonus(90), 1);
        assert_eq!(duration_bonus(46), 1);
        assert_eq!(duration_bonus(45), 0);
    }

    #[test]
    fn sentiment_bands_are_inclusive() {
        assert_eq!(sentiment_bonus(60.0), 2);
        assert_eq!(sentiment_bonus(59.9), 1);
        assert_eq!(sentiment_bonus(40.0), 1);
        assert_eq!(sentiment_bonus(39.9), 0);
    }

    #[test]
    fn single_pain_point_call_scores_seven() {
        let result = fallback_score(
            &event(200, 70.0, 0),
            &features(&["collections"], Urgency::Medium),
        );
        assert_eq!(result.score, 7);
        assert_eq!(result.conversion_probability, 80);
        assert!(result.used_fallback);
        assert_eq!(result.estimated_cost, Decimal::ZERO);
        assert!(!result.is_hot(8));
    }

    #[test]
    fn strong_call_clamps_at_ten() {
        let result = fallback_score(
            &event(200, 65.0, 1),
            &features(&["collections", "bankruptcy"], Urgency::High),
        );
        assert_eq!(result.score, 10);
        assert_eq!(result.conversion_probability, 100);
        assert_eq!(result.factors.engagement, 1);
        assert_eq!(result.factors.urgency, 1);
        assert_eq!(result.factors.pain_points, 2);
    }

    #[test]
    fn empty_call_scores_minimum() {
        let result = fallback_score(&event(0, 0.0, 0), &features(&[], Urgency::Medium));
        assert_eq!(result.score, 1);
        assert_eq!(result.conversion_probability, 10);
        assert_eq!(result.factors, ScoreFactors::default());
    }
}
