// Saved search handlers; every route acts for the X-User-Id requester

use axum::{
    extract::{Json as JsonExtract, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use super::api::GenericResponse;
use crate::{error::{AppError, AppResult}, requester::Requester, AppState};

#[derive(Deserialize, Debug)]
pub struct SaveSearchRequest {
    name: String,
}

pub async fn list_saved_searches(
    State(app_state): State<AppState>,
    requester: Requester,
) -> impl IntoResponse {
    tracing::info!("API call: list_saved_searches for user: {}", requester.user_id);
    Json(app_state.saved_searches.list(&requester.user_id).await)
}

/// Captures the session's current filter under the given name.
pub async fn save_search(
    State(app_state): State<AppState>,
    requester: Requester,
    JsonExtract(request): JsonExtract<SaveSearchRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: save_search '{}' for user: {}", request.name, requester.user_id);
    let saved = app_state.session.capture(&request.name).await?;
    app_state
        .saved_searches
        .save(&requester.user_id, saved.clone())
        .await;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_saved_search(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: delete_saved_search {} for user: {}", id, requester.user_id);
    if !app_state.saved_searches.delete(&requester.user_id, &id).await {
        return Err(AppError::NotFound(format!("No saved search '{id}'")));
    }
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Saved search deleted.".to_string()),
        id: Some(id),
    }))
}

/// Restores a saved search into the session and returns the new filter view.
pub async fn open_saved_search(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("API call: open_saved_search {} for user: {}", id, requester.user_id);
    let saved = app_state
        .saved_searches
        .get(&requester.user_id, &id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No saved search '{id}'")))?;
    Ok(Json(app_state.session.restore(&saved).await))
}
