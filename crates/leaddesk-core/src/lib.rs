//! Shared domain types and configuration for the leaddesk intake pipeline.

pub mod app_config;
pub mod config;
pub mod keywords;
pub mod leads;
pub mod phone;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use keywords::{load_keywords, KeywordConfig};
pub use leads::{
    Category, ChangeKind, Contact, ContactChange, ContactStatus, ExtractedFeatures, LeadEvent,
    NameQuality, Notification, NotificationStatus, ScoreFactors, ScoreResult, Sentiment, Urgency,
};
pub use phone::normalize_phone;

/// Score at or above which a lead is considered hot.
pub const HOT_LEAD_THRESHOLD: u8 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read keywords file {path}: {source}")]
    KeywordsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse keywords file: {0}")]
    KeywordsFileParse(#[from] serde_yaml::Error),

    #[error("keywords file is invalid: {0}")]
    KeywordsValidation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid urgency: {0}")]
    InvalidUrgency(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid contact status: {0}")]
    InvalidContactStatus(String),

    #[error("invalid name quality: {0}")]
    InvalidNameQuality(String),

    #[error("invalid notification status: {0}")]
    InvalidNotificationStatus(String),
}
