//! Receptionist webhook. The response shape is fixed by the provider
//! integration and does not use the `{data, meta}` envelope.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use leaddesk_core::ScoreFactors;
use leaddesk_intake::{IntakeError, IntakeOutcome};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WebhookAccepted {
    success: bool,
    lead_score: u8,
    #[serde(rename = "openAICost", with = "rust_decimal::serde::float")]
    open_ai_cost: Decimal,
    scoring_breakdown: ScoreFactors,
    conversion_probability: u8,
    used_fallback: bool,
    event_id: Uuid,
    contact_id: Uuid,
    duplicate: bool,
}

impl From<&IntakeOutcome> for WebhookAccepted {
    fn from(outcome: &IntakeOutcome) -> Self {
        Self {
            success: true,
            lead_score: outcome.score.score,
            open_ai_cost: outcome.score.estimated_cost,
            scoring_breakdown: outcome.score.factors,
            conversion_probability: outcome.score.conversion_probability,
            used_fallback: outcome.score.used_fallback,
            event_id: outcome.event_id,
            contact_id: outcome.contact.id,
            duplicate: outcome.duplicate,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookFailure {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn failure(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> Response {
    (
        status,
        Json(WebhookFailure {
            error: error.into(),
            detail,
        }),
    )
        .into_response()
}

pub(super) async fn receive_call(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(request_id = %req_id.0, error = %rejection, "webhook body rejected");
            return failure(StatusCode::BAD_REQUEST, "Request body must be valid JSON", None);
        }
    };

    match state.pipeline.ingest(&body).await {
        Ok(outcome) => (StatusCode::OK, Json(WebhookAccepted::from(&outcome))).into_response(),
        Err(IntakeError::Validation(message)) => failure(StatusCode::BAD_REQUEST, message, None),
        Err(e) => {
            tracing::error!(request_id = %req_id.0, error = %e, "webhook processing failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process lead",
                Some(e.to_string()),
            )
        }
    }
}
