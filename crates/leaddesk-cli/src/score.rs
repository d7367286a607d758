//! Offline scoring: payload validation, extraction and the deterministic
//! scorer, with no database or network.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use leaddesk_core::{load_keywords, ExtractedFeatures, KeywordConfig, ScoreResult};
use leaddesk_intake::{fallback_score, parse_payload, FeatureExtractor};
use serde_json::{json, Value};

pub(crate) fn run_score(payload: &Path, keywords: Option<&Path>, as_json: bool) -> anyhow::Result<()> {
    let raw = read_payload(payload)?;
    let body: Value = serde_json::from_str(&raw).context("payload is not valid JSON")?;
    let event = parse_payload(&body, Utc::now())?;

    let keywords = match keywords {
        Some(path) => load_keywords(path)?,
        None => KeywordConfig::default(),
    };
    let extractor = FeatureExtractor::new(&keywords)?;
    let features = extractor.extract(&event.transcript, &event.phone);
    let score = fallback_score(&event, &features);

    if as_json {
        let out = json!({ "phone": event.phone, "features": features, "score": score });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render_score(&event.phone, &features, &score));
    }
    Ok(())
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read payload from stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub(crate) fn render_score(phone: &str, features: &ExtractedFeatures, score: &ScoreResult) -> String {
    let pain_points = if features.pain_points.is_empty() {
        "-".to_string()
    } else {
        features.pain_points.join(", ")
    };
    let f = &score.factors;
    format!(
        "phone:        {phone}\n\
         name:         {} ({})\n\
         email:        {}\n\
         pain points:  {pain_points}\n\
         urgency:      {}\n\
         budget:       {}\n\
         timeline:     {}\n\
         score:        {}/10 (conversion {}%)\n\
         breakdown:    quality {} / pain {} / urgency {} / demographics {} / engagement {}\n",
        features.name,
        features.name_quality.as_str(),
        or_dash(features.email.as_deref()),
        features.urgency.as_str(),
        or_dash(features.budget.as_deref()),
        or_dash(features.timeline.as_deref()),
        score.score,
        score.conversion_probability,
        f.conversation_quality,
        f.pain_points,
        f.urgency,
        f.demographics,
        f.engagement,
    )
}
