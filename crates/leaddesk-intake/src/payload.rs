//! Webhook payload validation and normalization into a [`LeadEvent`].

use chrono::{DateTime, SecondsFormat, Utc};
use leaddesk_core::{normalize_phone, LeadEvent, Sentiment};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::IntakeError;

pub const DEFAULT_SOURCE_ID: &str = "ai-receptionist";

const REQUIRED_FIELDS: &[&str] = &[
    "caller",
    "transcript",
    "sentiment",
    "duration",
    "satisfaction",
    "summary",
    "texts_sent",
];

/// Validate a raw webhook body and build the immutable event.
///
/// Every missing required field is reported at once, comma-separated, in
/// declaration order. `null` counts as missing.
///
/// # Errors
///
/// Returns [`IntakeError::Validation`] for a non-object body, missing fields,
/// wrongly typed fields, or a caller with no digits.
pub fn parse_payload(body: &Value, received_at: DateTime<Utc>) -> Result<LeadEvent, IntakeError> {
    let obj = body
        .as_object()
        .ok_or_else(|| IntakeError::Validation("Request body must be a JSON object".to_string()))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| matches!(obj.get(*field), None | Some(Value::Null)))
        .collect();
    if !missing.is_empty() {
        return Err(IntakeError::Validation(format!(
            "Missing field: {}",
            missing.join(", ")
        )));
    }

    let caller = scalar_string(obj, "caller")?;
    let phone = normalize_phone(&caller);
    if phone.is_empty() {
        return Err(invalid("caller"));
    }

    Ok(LeadEvent {
        id: Uuid::new_v4(),
        source_id: optional_string(obj, "source_id")?
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_ID.to_string()),
        username: optional_string(obj, "username")?.filter(|s| !s.trim().is_empty()),
        provider_timestamp: optional_string(obj, "timestamp")?,
        caller,
        phone,
        transcript: text(obj, "transcript")?,
        duration_secs: duration(&obj["duration"])?,
        satisfaction: scalar_string(obj, "satisfaction")?,
        sentiment: sentiment(&obj["sentiment"])?,
        summary: text(obj, "summary")?,
        texts_sent: texts_sent(&obj["texts_sent"])?,
        received_at,
    })
}

/// Provider-delivery identity: redeliveries of one call hash identically.
///
/// Without a provider timestamp the receipt time stands in, so distinct
/// untimed calls with the same caller and transcript never collide.
#[must_use]
pub fn dedupe_key(event: &LeadEvent) -> String {
    let when = match &event.provider_timestamp {
        Some(ts) => ts.clone(),
        None => event
            .received_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true),
    };
    let mut hasher = Sha256::new();
    for part in [
        event.source_id.as_str(),
        event.caller.as_str(),
        when.as_str(),
        event.transcript.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}

/// Key for a reprocessing run; never collides with a provider delivery.
#[must_use]
pub fn reprocess_dedupe_key(original: Uuid, new_id: Uuid) -> String {
    format!(
        "{:x}",
        Sha256::digest(format!("reprocess:{original}:{new_id}").as_bytes())
    )
}

fn invalid(field: &str) -> IntakeError {
    IntakeError::Validation(format!("Invalid field: {field}"))
}

fn text(obj: &Map<String, Value>, field: &str) -> Result<String, IntakeError> {
    obj[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(field))
}

/// Strings pass through; numbers and booleans are rendered.
fn scalar_string(obj: &Map<String, Value>, field: &str) -> Result<String, IntakeError> {
    match &obj[field] {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(invalid(field)),
    }
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Result<Option<String>, IntakeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => scalar_string(obj, field).map(Some),
    }
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('s').trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn duration(value: &Value) -> Result<u32, IntakeError> {
    let secs = number(value)
        .filter(|v| *v >= 0.0)
        .ok_or_else(|| invalid("duration"))?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = secs.round().min(f64::from(u32::MAX)) as u32;
    Ok(rounded)
}

fn percent(value: Option<&Value>) -> Result<Option<f64>, IntakeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => number(v)
            .map(|p| Some(p.clamp(0.0, 100.0)))
            .ok_or_else(|| invalid("sentiment")),
    }
}

/// Accepts `{positive, neutral?, negative?}` or a bare positive percentage.
fn sentiment(value: &Value) -> Result<Sentiment, IntakeError> {
    match value {
        Value::Object(map) => Ok(Sentiment {
            positive: percent(map.get("positive"))?.ok_or_else(|| invalid("sentiment"))?,
            neutral: percent(map.get("neutral"))?,
            negative: percent(map.get("negative"))?,
        }),
        other => Ok(Sentiment {
            positive: percent(Some(other))?.ok_or_else(|| invalid("sentiment"))?,
            neutral: None,
            negative: None,
        }),
    }
}

fn texts_sent(value: &Value) -> Result<Vec<String>, IntakeError> {
    let items = value.as_array().ok_or_else(|| invalid("texts_sent"))?;
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            Value::Object(map) => ["text", "message", "body"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .or_else(|| Some(item.to_string())),
            other => Some(other.to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn valid_body() -> Value {
        json!({
            "username": "front-desk",
            "timestamp": "2026-10-18T09:30:00Z",
            "caller": "+1 (555) 010-2020",
            "transcript": "Caller: my name is Dana Lee",
            "sentiment": { "positive": 70, "neutral": 20, "negative": 10 },
            "duration": 200,
            "satisfaction": "satisfied",
            "summary": "Asked about collections",
            "texts_sent": ["Here is our booking link"]
        })
    }

    #[test]
    fn valid_payload_builds_event_with_normalized_phone() {
        let event = parse_payload(&valid_body(), Utc::now()).expect("valid");
        assert_eq!(event.phone, "+15550102020");
        assert_eq!(event.caller, "+1 (555) 010-2020");
        assert_eq!(event.source_id, DEFAULT_SOURCE_ID);
        assert_eq!(event.duration_secs, 200);
        assert!((event.sentiment.positive - 70.0).abs() < f64::EPSILON);
        assert_eq!(event.texts_sent.len(), 1);
        assert_eq!(event.username.as_deref(), Some("front-desk"));
    }

    #[test]
    fn missing_field_is_named() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("transcript");
        let err = parse_payload(&body, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Missing field: transcript");
    }

    #[test]
    fn all_missing_fields_are_reported_together() {
        let mut body = valid_body();
        let obj = body.as_object_mut().unwrap();
        obj.remove("caller");
        obj.insert("summary".to_string(), Value::Null);
        let err = parse_payload(&body, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Missing field: caller, summary");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = parse_payload(&json!([1, 2]), Utc::now()).unwrap_err();
        assert!(matches!(err, IntakeError::Validation(_)));
    }

    #[test]
    fn caller_without_digits_is_invalid() {
        let mut body = valid_body();
        body["caller"] = json!("anonymous");
        let err = parse_payload(&body, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid field: caller");
    }

    #[test]
    fn lenient_shapes_are_accepted() {
        let mut body = valid_body();
        body["duration"] = json!("95s");
        body["sentiment"] = json!(55);
        body["satisfaction"] = json!(4);
        body["texts_sent"] = json!([{ "text": "hello" }, "bye", null]);
        body["source_id"] = json!("chat-widget");

        let event = parse_payload(&body, Utc::now()).expect("valid");
        assert_eq!(event.duration_secs, 95);
        assert!((event.sentiment.positive - 55.0).abs() < f64::EPSILON);
        assert_eq!(event.satisfaction, "4");
        assert_eq!(event.texts_sent, vec!["hello", "bye"]);
        assert_eq!(event.source_id, "chat-widget");
    }

    #[test]
    fn negative_duration_is_invalid() {
        let mut body = valid_body();
        body["duration"] = json!(-3);
        let err = parse_payload(&body, Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid field: duration");
    }

    #[test]
    fn dedupe_key_ignores_receipt_time_and_event_id() {
        let a = parse_payload(&valid_body(), Utc::now()).unwrap();
        let b = parse_payload(&valid_body(), Utc::now()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(dedupe_key(&a), dedupe_key(&b));

        let mut body = valid_body();
        body["timestamp"] = json!("2026-10-18T09:31:00Z");
        let c = parse_payload(&body, Utc::now()).unwrap();
        assert_ne!(dedupe_key(&a), dedupe_key(&c));
    }

    #[test]
    fn untimed_calls_are_keyed_by_receipt_time() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("timestamp");
        let first_seen = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 10, 18, 9, 45, 0).unwrap();

        let a = parse_payload(&body, first_seen).unwrap();
        let b = parse_payload(&body, later).unwrap();
        let a_again = parse_payload(&body, first_seen).unwrap();

        assert!(a.provider_timestamp.is_none());
        assert_ne!(dedupe_key(&a), dedupe_key(&b));
        assert_eq!(dedupe_key(&a), dedupe_key(&a_again));
    }
}
