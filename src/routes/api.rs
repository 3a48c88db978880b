// Handlers for catalog, listing and filter endpoints

use axum::{
    extract::{Json as JsonExtract, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    filter::FilterCommand,
    models::{Listing, ListingDraft},
    requester::Requester,
    AppState,
};

// --- Response Wrappers ---

#[derive(Serialize)]
pub(super) struct GenericResponse {
    pub success: bool,
    pub message: Option<String>,
    pub id: Option<String>,
}

// --- Request Structs ---

#[derive(Deserialize)]
pub struct SubcategoriesQuery {
    main: String,
}

#[derive(Deserialize)]
pub struct StatesQuery {
    country: String,
}

#[derive(Deserialize)]
pub struct CitiesQuery {
    state: String,
}

// One CSV row per listing; nested fields are flattened
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRow<'a> {
    id: &'a str,
    title: &'a str,
    price: &'a str,
    category: &'a str,
    country: &'a str,
    state: &'a str,
    city: &'a str,
    seller: &'a str,
    post_date: String,
    featured: bool,
}

// --- Catalog ---

pub async fn get_categories(State(app_state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("[HANDLER] /api/catalog/categories");
    Json(app_state.session.catalog().categories().to_vec())
}

pub async fn get_subcategories(
    State(app_state): State<AppState>,
    Query(query): Query<SubcategoriesQuery>,
) -> impl IntoResponse {
    Json(app_state.session.catalog().subcategories_of(&query.main).to_vec())
}

pub async fn get_locations(State(app_state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("[HANDLER] /api/catalog/locations");
    Json(app_state.session.catalog().locations().clone())
}

pub async fn get_countries(State(app_state): State<AppState>) -> impl IntoResponse {
    let countries: Vec<String> = app_state
        .session
        .catalog()
        .countries()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(countries)
}

pub async fn get_states(
    State(app_state): State<AppState>,
    Query(query): Query<StatesQuery>,
) -> impl IntoResponse {
    let states: Vec<String> = app_state
        .session
        .catalog()
        .states_of(&query.country)
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(states)
}

pub async fn get_cities(
    State(app_state): State<AppState>,
    Query(query): Query<CitiesQuery>,
) -> impl IntoResponse {
    let cities = app_state.session.catalog().cities_of(&query.state);
    tracing::debug!("[HANDLER] /api/catalog/cities - {} cities for '{}'", cities.len(), query.state);
    Json(cities)
}

// --- Listings ---

pub async fn get_listings(State(app_state): State<AppState>) -> impl IntoResponse {
    let view = app_state.session.visible_listings().await;
    tracing::info!(
        "[HANDLER] /api/listings - {} of {} listings visible (search active: {})",
        view.listings.len(),
        view.total,
        view.is_search_active
    );
    Json(view)
}

pub async fn get_all_listings(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.session.listings_by_date().await)
}

pub async fn get_featured_listings(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.session.featured_listings().await)
}

pub async fn get_listing(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let listing = app_state
        .session
        .listing(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No listing '{id}'")))?;
    Ok(Json(listing))
}

pub async fn get_my_listings(
    State(app_state): State<AppState>,
    requester: Requester,
) -> impl IntoResponse {
    tracing::info!("[HANDLER] /api/listings/mine - user: {}", requester.user_id);
    Json(app_state.session.my_listings(&requester.user_id).await)
}

pub async fn create_listing(
    State(app_state): State<AppState>,
    requester: Requester,
    JsonExtract(draft): JsonExtract<ListingDraft>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] POST /api/listings - user: {}, title: {}", requester.user_id, draft.title);
    let listing = app_state
        .session
        .add_listing(draft, requester.as_seller())
        .await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn delete_listing(
    State(app_state): State<AppState>,
    requester: Requester,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] DELETE /api/listings/{} - user: {}", id, requester.user_id);
    if !app_state.session.remove_listing(&id, &requester.user_id).await {
        return Err(AppError::NotFound(format!("No listing '{id}' owned by the requester")));
    }
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Listing removed.".to_string()),
        id: Some(id),
    }))
}

pub async fn export_listings(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let view = app_state.session.visible_listings().await;
    tracing::info!("[HANDLER] /api/listings/export - exporting {} listings", view.listings.len());
    let csv = listings_to_csv(&view.listings)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"listings.csv\""),
        ],
        csv,
    ))
}

fn listings_to_csv(listings: &[Listing]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for listing in listings {
        writer
            .serialize(ExportRow {
                id: &listing.id,
                title: &listing.title,
                price: &listing.price,
                category: &listing.category_id,
                country: &listing.location.country,
                state: &listing.location.state,
                city: &listing.location.city,
                seller: &listing.seller.id,
                post_date: listing.post_date.to_rfc3339(),
                featured: listing.featured,
            })
            .with_context(|| format!("Failed to write CSV row for listing {}", listing.id))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV export: {}", e.error()))
}

// --- Filter & suggestions ---

pub async fn get_filter(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.session.view().await)
}

pub async fn apply_filter_command(
    State(app_state): State<AppState>,
    JsonExtract(command): JsonExtract<FilterCommand>,
) -> impl IntoResponse {
    tracing::info!("[HANDLER] POST /api/filter - {:?}", command);
    Json(app_state.session.apply(command).await)
}

pub async fn get_suggestions(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(app_state.session.suggestions())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::routes::test_support::{app, get_json, send, send_json};

    fn ids(listings: &Value) -> Vec<&str> {
        listings
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn catalog_endpoints() {
        let app = app();
        let (status, categories) = get_json(&app, "/api/catalog/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(categories.as_array().unwrap().len(), 6);

        let (_, subcategories) = get_json(&app, "/api/catalog/subcategories?main=housing", None).await;
        assert!(subcategories
            .as_array()
            .unwrap()
            .iter()
            .any(|s| s["id"] == "housing-apartments"));
        let (_, subcategories) = get_json(&app, "/api/catalog/subcategories?main=nope", None).await;
        assert_eq!(subcategories, json!([]));

        let (_, locations) = get_json(&app, "/api/catalog/locations", None).await;
        assert!(locations["Nigeria"]["Lagos"].as_array().unwrap().contains(&json!("Ikeja")));

        let (_, cities) = get_json(&app, "/api/catalog/cities?state=Littoral", None).await;
        assert_eq!(cities, json!(["Cotonou", "Douala"]));

        let (_, cities) = get_json(&app, "/api/catalog/cities?state=Atlantis", None).await;
        assert_eq!(cities, json!([]));

        let (status, countries) = get_json(&app, "/api/catalog/countries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(countries[0], "Algeria");
        let (status, states) = get_json(&app, "/api/catalog/states?country=Kenya", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(states.as_array().unwrap().contains(&json!("Nairobi")));
        let (status, states) = get_json(&app, "/api/catalog/states?country=Atlantis", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(states, json!([]));
    }

    #[tokio::test]
    async fn filter_commands_narrow_the_listing_view() {
        let app = app();
        let (_, view) = get_json(&app, "/api/listings", None).await;
        assert_eq!(view["isSearchActive"], false);
        assert_eq!(view["listings"].as_array().unwrap().len(), 12);

        let (status, filter) = send_json(
            &app,
            "POST",
            "/api/filter",
            None,
            json!({ "action": "selectSubCategory", "value": "housing-apartments" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filter["filter"]["mainCategory"], "housing");
        assert_eq!(filter["suggestions"]["busy"], true);

        send_json(&app, "POST", "/api/filter", None, json!({ "action": "selectState", "value": "Nairobi" })).await;
        let (_, filter) = get_json(&app, "/api/filter", None).await;
        assert!(filter["cities"].as_array().unwrap().contains(&json!("Kilimani")));

        let (_, view) = get_json(&app, "/api/listings", None).await;
        assert_eq!(view["isSearchActive"], true);
        assert_eq!(ids(&view["listings"]), vec!["listing-kilimani-2br"]);

        send_json(&app, "POST", "/api/filter", None, json!({ "action": "reset" })).await;
        let (_, view) = get_json(&app, "/api/listings", None).await;
        assert_eq!(view["listings"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn unknown_filter_action_is_rejected() {
        let app = app();
        let (status, _) =
            send_json(&app, "POST", "/api/filter", None, json!({ "action": "sortByPrice" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test(start_paused = true)]
    async fn suggestions_follow_the_term() {
        let app = app();
        send_json(&app, "POST", "/api/filter", None, json!({ "action": "setTerm", "value": "rug" })).await;
        let (_, snapshot) = get_json(&app, "/api/suggestions", None).await;
        assert_eq!(snapshot["phase"], "debouncing");

        tokio::time::sleep(Duration::from_secs(1)).await;
        let (_, snapshot) = get_json(&app, "/api/suggestions", None).await;
        assert_eq!(snapshot["phase"], "settled");
        assert_eq!(snapshot["suggestions"], json!(["rug facet"]));
    }

    #[tokio::test]
    async fn posting_requires_a_requester_and_a_known_category() {
        let app = app();
        let draft = json!({
            "title": "Standing fan",
            "description": "Works well",
            "price": "₦25,000",
            "category": "for-sale-electronics",
            "location": { "country": "Nigeria", "state": "Lagos", "city": "Ikeja" }
        });

        let (status, _) = send_json(&app, "POST", "/api/listings", None, draft.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut bad = draft.clone();
        bad["category"] = json!("electronics");
        let (status, _) = send_json(&app, "POST", "/api/listings", Some("ada"), bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listing) = send_json(&app, "POST", "/api/listings", Some("ada"), draft).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(listing["seller"]["id"], "ada");
        let id = listing["id"].as_str().unwrap().to_string();

        let (_, mine) = get_json(&app, "/api/listings/mine", Some("ada")).await;
        assert_eq!(ids(&mine), vec![id.as_str()]);
        let (_, all) = get_json(&app, "/api/listings/all", None).await;
        assert_eq!(ids(&all)[0], id);
        let (status, fetched) = get_json(&app, &format!("/api/listings/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Standing fan");
        let (_, featured) = get_json(&app, "/api/listings/featured", None).await;
        assert!(!ids(&featured).contains(&id.as_str()));

        let uri = format!("/api/listings/{id}");
        let (status, _) = send_json(&app, "DELETE", &uri, Some("bayo"), Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = send_json(&app, "DELETE", &uri, Some("ada"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let (status, _) = get_json(&app, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_writes_visible_listings_as_csv() {
        let app = app();
        send_json(&app, "POST", "/api/filter", None, json!({ "action": "setTerm", "value": "toyota" })).await;

        let request = Request::get("/api/listings/export").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let mut reader = csv::Reader::from_reader(body.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert_eq!(&headers[8], "postDate");
        let ids: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        assert_eq!(ids, vec!["listing-corolla-2015", "listing-rav4-2018"]);
    }
}
