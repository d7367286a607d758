//! Lead intake domain model: events, extraction, scores, contacts, notifications.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Urgency::High),
            "medium" => Ok(Urgency::Medium),
            "low" => Ok(Urgency::Low),
            other => Err(CoreError::InvalidUrgency(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Lead,
    Prospect,
    Client,
    Inactive,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lead => "lead",
            Category::Prospect => "prospect",
            Category::Client => "client",
            Category::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(Category::Lead),
            "prospect" => Ok(Category::Prospect),
            "client" => Ok(Category::Client),
            "inactive" => Ok(Category::Inactive),
            other => Err(CoreError::InvalidCategory(other.to_string())),
        }
    }
}

/// Soft status. Contacts are never deleted; archiving frees the phone key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Active,
    Archived,
}

impl ContactStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::Active => "active",
            ContactStatus::Archived => "archived",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ContactStatus::Active),
            "archived" => Ok(ContactStatus::Archived),
            other => Err(CoreError::InvalidContactStatus(other.to_string())),
        }
    }
}

/// How trustworthy a stored name is. Ordered worst to best.
///
/// Merges only ever move a contact's name up this ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameQuality {
    /// Caller phone standing in for a name.
    Placeholder,
    /// "my name is ..." style phrasing anywhere in the call.
    SelfIntroduced,
    /// Direct answer to the receptionist's name prompt.
    IntakeAnswer,
    /// Typed in by a person through the CRM.
    Manual,
}

impl NameQuality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NameQuality::Placeholder => "placeholder",
            NameQuality::SelfIntroduced => "self_introduced",
            NameQuality::IntakeAnswer => "intake_answer",
            NameQuality::Manual => "manual",
        }
    }
}

impl FromStr for NameQuality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placeholder" => Ok(NameQuality::Placeholder),
            "self_introduced" => Ok(NameQuality::SelfIntroduced),
            "intake_answer" => Ok(NameQuality::IntakeAnswer),
            "manual" => Ok(NameQuality::Manual),
            other => Err(CoreError::InvalidNameQuality(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Delivered,
    Read,
}

impl NotificationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Read => "read",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unread" => Ok(NotificationStatus::Unread),
            "delivered" => Ok(NotificationStatus::Delivered),
            "read" => Ok(NotificationStatus::Read),
            other => Err(CoreError::InvalidNotificationStatus(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// Sentiment percentages reported by the receptionist provider (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub positive: f64,
    #[serde(default)]
    pub neutral: Option<f64>,
    #[serde(default)]
    pub negative: Option<f64>,
}

/// One inbound receptionist call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEvent {
    pub id: Uuid,
    pub source_id: String,
    pub username: Option<String>,
    /// Timestamp string exactly as the provider sent it.
    pub provider_timestamp: Option<String>,
    /// Caller field as received.
    pub caller: String,
    /// Normalized caller phone; the contact dedup key.
    pub phone: String,
    pub transcript: String,
    pub duration_secs: u32,
    pub satisfaction: String,
    pub sentiment: Sentiment,
    pub summary: String,
    pub texts_sent: Vec<String>,
    pub received_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFeatures {
    pub name: String,
    pub name_quality: NameQuality,
    pub email: Option<String>,
    pub pain_points: Vec<String>,
    pub urgency: Urgency,
    pub budget: Option<String>,
    pub timeline: Option<String>,
}

impl ExtractedFeatures {
    /// First token of the name, or empty for placeholder names.
    #[must_use]
    pub fn first_name(&self) -> &str {
        if self.name_quality == NameQuality::Placeholder {
            return "";
        }
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// Every token after the first, space-joined.
    #[must_use]
    pub fn last_name(&self) -> String {
        if self.name_quality == NameQuality::Placeholder {
            return String::new();
        }
        self.name
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub conversation_quality: u8,
    pub pain_points: u8,
    pub urgency: u8,
    pub demographics: u8,
    pub engagement: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 1–10.
    pub score: u8,
    /// 0–100.
    pub conversion_probability: u8,
    pub factors: ScoreFactors,
    pub used_fallback: bool,
    /// Estimated USD spend on the external scorer; zero on fallback.
    #[serde(with = "rust_decimal::serde::str")]
    pub estimated_cost: Decimal,
}

impl ScoreResult {
    #[must_use]
    pub fn is_hot(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub name_quality: NameQuality,
    pub email: Option<String>,
    pub category: Category,
    pub status: ContactStatus,
    pub urgency: Option<Urgency>,
    pub lead_score: Option<u8>,
    pub conversion_probability: Option<u8>,
    pub score_factors: Option<ScoreFactors>,
    pub pain_points: Vec<String>,
    pub notes: String,
    pub transcript_excerpt: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Contact {
    /// Name for human-facing messages; falls back to the phone.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.phone
        } else {
            &self.full_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub event_id: Uuid,
    pub phone: String,
    pub message: String,
    pub score: u8,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
}

/// A committed contact mutation, as pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactChange {
    pub kind: ChangeKind,
    pub contact: Contact,
}
