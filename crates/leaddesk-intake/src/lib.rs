//! Inbound lead intake: payload validation, feature extraction, scoring,
//! contact resolution, audit capture and hot-lead alerts.

pub mod alerts;
pub mod error;
pub mod extract;
pub mod payload;
pub mod pipeline;
pub mod resolver;
pub mod scoring;

pub use alerts::{hot_lead_message, AlertDispatcher};
pub use error::{IntakeError, ScoringError};
pub use extract::FeatureExtractor;
pub use payload::{dedupe_key, parse_payload, DEFAULT_SOURCE_ID};
pub use pipeline::{IntakeOutcome, IntakePipeline};
pub use resolver::{merge_contact, ContactResolver, PhoneLocks, ResolveInput};
pub use scoring::{
    fallback_score, FallbackScorer, LeadScorer, OpenAiScorer, ScoringPolicy,
    DEFAULT_SCORING_TIMEOUT,
};
