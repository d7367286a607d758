use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::{Stream, StreamExt};
use leaddesk_core::{Category, Contact};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

const STREAM_SNAPSHOT_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub(super) struct LeadsQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_leads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LeadsQuery>,
) -> Result<Json<ApiResponse<Vec<Contact>>>, ApiError> {
    let leads = state
        .store()
        .list_leads(normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(leads, req_id.0)))
}

/// Live lead subscription as server-sent events.
///
/// Emits one `ready` event carrying the current lead list, then one
/// `contact` event per committed change to a `lead` contact.
pub(super) async fn stream_leads(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe before the snapshot so no change falls between the two.
    let changes = state.pipeline.subscribe();
    let snapshot = state
        .store()
        .list_leads(STREAM_SNAPSHOT_LIMIT)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let ready = Event::default()
        .event("ready")
        .json_data(&snapshot)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode lead snapshot");
            ApiError::new(req_id.0.clone(), "internal_error", "failed to encode leads")
        })?;

    tracing::info!(request_id = %req_id.0, leads = snapshot.len(), "lead stream opened");

    let stream = futures::stream::once(async move { Ok(ready) }).chain(lead_changes(changes));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Ends the stream when the subscriber lags so the client reconnects and
/// receives a fresh `ready` snapshot.
pub(super) fn lead_changes(
    changes: broadcast::Receiver<leaddesk_core::ContactChange>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(changes, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) if change.contact.category == Category::Lead => {
                    match Event::default().event("contact").json_data(&change) {
                        Ok(event) => return Some((Ok(event), rx)),
                        Err(e) => tracing::warn!(error = %e, "failed to encode contact change"),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "lead stream subscriber lagged; closing stream");
                    return None;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
