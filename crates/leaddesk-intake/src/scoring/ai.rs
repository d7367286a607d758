//! OpenAI chat-completions scorer.
//!
//! Sends the call facts as a JSON user message and expects a JSON object
//! `{leadScore, painPoints, urgencyLevel, conversionProbability,
//! scoringBreakdown}` back. Anything else is [`ScoringError::Malformed`].

use std::time::Duration;

use async_trait::async_trait;
use leaddesk_core::{ExtractedFeatures, LeadEvent, ScoreFactors, ScoreResult, Urgency};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::json;

use super::retry::retry_with_backoff;
use super::LeadScorer;
use crate::error::ScoringError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const MAX_ERROR_BODY_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You score inbound credit-repair sales calls. \
Reply with one JSON object only, with these keys: \
leadScore (integer 1-10), painPoints (array of strings), \
urgencyLevel (\"high\", \"medium\" or \"low\"), conversionProbability (integer 0-100), \
scoringBreakdown (object with integer keys conversationQuality, painPoints, urgency, \
demographics, engagement, each 0-10).";

/// USD per million prompt and completion tokens.
fn token_prices() -> (Decimal, Decimal) {
    (Decimal::new(15, 2), Decimal::new(60, 2))
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// The scorer's reply. `painPoints` and `urgencyLevel` are shape-checked
/// only; the lead's pain points and urgency always come from extraction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiScore {
    lead_score: i64,
    #[serde(rename = "painPoints")]
    _pain_points: Vec<IgnoredAny>,
    urgency_level: String,
    conversion_probability: i64,
    scoring_breakdown: AiBreakdown,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiBreakdown {
    conversation_quality: i64,
    pain_points: i64,
    urgency: i64,
    demographics: i64,
    engagement: i64,
}

pub struct OpenAiScorer {
    client: Client,
    api_key: String,
    model: String,
    endpoint: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for OpenAiScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiScorer")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[redacted]")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiScorer {
    /// Creates a scorer pointed at the production OpenAI API.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: &str, model: &str, max_retries: u32) -> Result<Self, ScoringError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL, max_retries)
    }

    /// Creates a scorer against any OpenAI-compatible base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Http`] if the HTTP client cannot be built, or
    /// [`ScoringError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        base_url: &str,
        max_retries: u32,
    ) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent("leaddesk/0.1 (lead-intake)")
            .build()?;

        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            base_url.trim_end_matches('/')
        ))
        .map_err(|_| ScoringError::InvalidBaseUrl(base_url.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint,
            max_retries,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        })
    }

    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    async fn request(&self, event: &LeadEvent) -> Result<String, ScoringError> {
        let facts = json!({
            "transcript": event.transcript,
            "sentiment": event.sentiment,
            "satisfaction": event.satisfaction,
            "duration": event.duration_secs,
            "caller": event.caller,
        });
        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": facts.to_string() },
            ],
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ScoringError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(text)
    }
}

/// Drop a surrounding Markdown code fence if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn bounded(field: &str, value: i64, min: i64, max: i64) -> Result<u8, ScoringError> {
    if (min..=max).contains(&value) {
        u8::try_from(value).map_err(|_| ScoringError::Malformed(format!("{field} out of range")))
    } else {
        Err(ScoringError::Malformed(format!(
            "{field} must be {min}-{max}, got {value}"
        )))
    }
}

fn estimated_cost(usage: Option<Usage>) -> Decimal {
    let Some(usage) = usage else {
        return Decimal::ZERO;
    };
    let (input, output) = token_prices();
    let spend = Decimal::from(usage.prompt_tokens) * input
        + Decimal::from(usage.completion_tokens) * output;
    spend / Decimal::from(1_000_000u32)
}

/// Validate a raw chat-completions body into a [`ScoreResult`].
fn parse_response(body: &str) -> Result<ScoreResult, ScoringError> {
    let chat: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ScoringError::Malformed(format!("response envelope: {e}")))?;
    let content = chat
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .ok_or_else(|| ScoringError::Malformed("response has no message content".to_string()))?;

    let ai: AiScore = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ScoringError::Malformed(format!("score object: {e}")))?;

    ai.urgency_level
        .parse::<Urgency>()
        .map_err(|e| ScoringError::Malformed(e.to_string()))?;

    let b = &ai.scoring_breakdown;
    Ok(ScoreResult {
        score: bounded("leadScore", ai.lead_score, 1, 10)?,
        conversion_probability: bounded(
            "conversionProbability",
            ai.conversion_probability,
            0,
            100,
        )?,
        factors: ScoreFactors {
            conversation_quality: bounded("conversationQuality", b.conversation_quality, 0, 10)?,
            pain_points: bounded("painPoints", b.pain_points, 0, 10)?,
            urgency: bounded("urgency", b.urgency, 0, 10)?,
            demographics: bounded("demographics", b.demographics, 0, 10)?,
            engagement: bounded("engagement", b.engagement, 0, 10)?,
        },
        used_fallback: false,
        estimated_cost: estimated_cost(chat.usage),
    })
}

#[async_trait]
impl LeadScorer for OpenAiScorer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn score(
        &self,
        event: &LeadEvent,
        _features: &ExtractedFeatures,
    ) -> Result<ScoreResult, ScoringError> {
        let body = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.request(event)
        })
        .await?;
        parse_response(&body)
    }
}
