// Posting assistance backed by Gemini. These are the only endpoints where
// provider errors reach the client.

use axum::{
    extract::{Json as JsonExtract, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, AppState};

#[derive(Deserialize, Debug)]
pub struct CategoryRequest {
    title: String,
}

#[derive(Deserialize, Debug)]
pub struct PriceRequest {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Debug)]
pub struct DescriptionRequest {
    title: String,
    #[serde(default)]
    keywords: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryResponse {
    category_id: Option<String>,
}

#[derive(Serialize)]
struct TextResponse {
    text: String,
}

pub async fn suggest_category(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<CategoryRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/assist/category - title: {}", request.title);
    let category_id = app_state
        .assistant
        .suggest_category(&request.title, app_state.session.catalog())
        .await?;
    Ok(Json(CategoryResponse { category_id }))
}

pub async fn suggest_price(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<PriceRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/assist/price - title: {}", request.title);
    let text = app_state
        .assistant
        .suggest_price(&request.title, &request.description)
        .await?;
    Ok(Json(TextResponse { text }))
}

pub async fn generate_description(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<DescriptionRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/assist/description - title: {}", request.title);
    let text = app_state
        .assistant
        .generate_description(&request.title, &request.keywords)
        .await?;
    Ok(Json(TextResponse { text }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{app, send_json};

    #[tokio::test]
    async fn assist_without_api_key_is_unavailable() {
        let app = app();
        for (uri, body) in [
            ("/api/assist/category", json!({ "title": "iPhone 14" })),
            ("/api/assist/price", json!({ "title": "iPhone 14", "description": "256GB" })),
            ("/api/assist/description", json!({ "title": "iPhone 14", "keywords": "sealed" })),
        ] {
            let (status, _) = send_json(&app, "POST", uri, None, body).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        }
    }
}
