use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use leaddesk_core::{Notification, NotificationStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

pub(super) async fn list_notifications(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications = state
        .store()
        .list_notifications(query.unread_only, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(notifications, req_id.0)))
}

pub(super) async fn mark_delivered(
    state: State<AppState>,
    req_id: Extension<RequestId>,
    id: Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    set_status(state, req_id, id, NotificationStatus::Delivered).await
}

pub(super) async fn mark_read(
    state: State<AppState>,
    req_id: Extension<RequestId>,
    id: Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    set_status(state, req_id, id, NotificationStatus::Read).await
}

async fn set_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    status: NotificationStatus,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    let notification = state
        .store()
        .set_notification_status(id, status)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::debug!(notification_id = %id, status = status.as_str(), "notification updated");
    Ok(Json(ApiResponse::new(notification, req_id.0)))
}
