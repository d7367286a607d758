//! Integration tests for `OpenAiScorer` and the scoring policy using wiremock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaddesk_core::{ExtractedFeatures, LeadEvent, NameQuality, Sentiment, Urgency};
use leaddesk_intake::{LeadScorer, OpenAiScorer, ScoringError, ScoringPolicy};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn event() -> LeadEvent {
    LeadEvent {
        id: Uuid::new_v4(),
        source_id: "ai-receptionist".to_string(),
        username: None,
        provider_timestamp: None,
        caller: "+1 (555) 010-2020".to_string(),
        phone: "+15550102020".to_string(),
        transcript: "my name is Dana Lee, I have collections".to_string(),
        duration_secs: 200,
        satisfaction: "satisfied".to_string(),
        sentiment: Sentiment {
            positive: 70.0,
            neutral: None,
            negative: None,
        },
        summary: "collections".to_string(),
        texts_sent: vec![],
        received_at: Utc::now(),
    }
}

fn features() -> ExtractedFeatures {
    ExtractedFeatures {
        name: "Dana Lee".to_string(),
        name_quality: NameQuality::SelfIntroduced,
        email: None,
        pain_points: vec!["collections".to_string()],
        urgency: Urgency::Medium,
        budget: None,
        timeline: None,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 2000, "completion_tokens": 100 }
    })
}

fn score_content(score: u8) -> String {
    json!({
        "leadScore": score,
        "painPoints": ["collections"],
        "urgencyLevel": "medium",
        "conversionProbability": 64,
        "scoringBreakdown": {
            "conversationQuality": 3,
            "painPoints": 1,
            "urgency": 1,
            "demographics": 1,
            "engagement": 2
        }
    })
    .to_string()
}

fn scorer(server: &MockServer, max_retries: u32) -> OpenAiScorer {
    OpenAiScorer::with_base_url("test-key", "gpt-4o-mini", &server.uri(), max_retries)
        .expect("scorer construction should not fail")
        .with_backoff_base_ms(0)
}

#[tokio::test]
async fn successful_completion_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&score_content(6))))
        .expect(1)
        .mount(&server)
        .await;

    let result = scorer(&server, 0)
        .score(&event(), &features())
        .await
        .expect("should score");

    assert_eq!(result.score, 6);
    assert_eq!(result.conversion_probability, 64);
    assert_eq!(result.factors.engagement, 2);
    assert!(!result.used_fallback);
    // 2000 * 0.15 + 100 * 0.60 = 360 micro-dollars
    assert_eq!(result.estimated_cost, Decimal::new(36, 5));
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&score_content(8))))
        .mount(&server)
        .await;

    let result = scorer(&server, 1)
        .score(&event(), &features())
        .await
        .expect("second attempt should succeed");
    assert_eq!(result.score, 8);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = scorer(&server, 3)
        .score(&event(), &features())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Status { status: 401, .. }));
}

#[tokio::test]
async fn prose_instead_of_json_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("This lead looks promising.")),
        )
        .mount(&server)
        .await;

    let err = scorer(&server, 0)
        .score(&event(), &features())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Malformed(_)));
}

#[tokio::test]
async fn policy_falls_back_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let policy = ScoringPolicy::new(Some(Arc::new(scorer(&server, 0))), Duration::from_secs(5));
    let result = policy.score(&event(), &features()).await;

    assert!(result.used_fallback);
    assert_eq!(result.score, 7);
    assert_eq!(result.estimated_cost, Decimal::ZERO);
}

#[tokio::test]
async fn policy_falls_back_when_scorer_is_too_slow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&score_content(9)))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let policy = ScoringPolicy::new(
        Some(Arc::new(scorer(&server, 0))),
        Duration::from_millis(200),
    );
    let result = policy.score(&event(), &features()).await;

    assert!(result.used_fallback);
    assert_eq!(result.score, 7);
}
