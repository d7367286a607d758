use axum::{
    extract::{Path, State},
    Extension, Json,
};
use leaddesk_intake::IntakeError;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ReprocessItem {
    event_id: Uuid,
    reprocessed_from: Uuid,
    contact_id: Uuid,
    lead_score: u8,
    used_fallback: bool,
    notification_id: Option<Uuid>,
}

pub(super) async fn reprocess_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReprocessItem>>, ApiError> {
    let outcome = state
        .pipeline
        .reprocess(event_id)
        .await
        .map_err(|e| match e {
            IntakeError::EventNotFound(id) => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("lead event {id} not found"),
            ),
            IntakeError::Persistence(db) => map_db_error(req_id.0.clone(), &db),
            other => {
                tracing::error!(%event_id, error = %other, "reprocess failed");
                ApiError::new(req_id.0.clone(), "internal_error", "reprocess failed")
            }
        })?;

    Ok(Json(ApiResponse::new(
        ReprocessItem {
            event_id: outcome.event_id,
            reprocessed_from: event_id,
            contact_id: outcome.contact.id,
            lead_score: outcome.score.score,
            used_fallback: outcome.score.used_fallback,
            notification_id: outcome.notification.map(|n| n.id),
        },
        req_id.0,
    )))
}
