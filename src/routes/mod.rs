// Route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::AppState;

mod api;
mod assist;
mod saved_searches;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        // Catalog
        .route("/catalog/categories", get(api::get_categories))
        .route("/catalog/subcategories", get(api::get_subcategories))
        .route("/catalog/locations", get(api::get_locations))
        .route("/catalog/countries", get(api::get_countries))
        .route("/catalog/states", get(api::get_states))
        .route("/catalog/cities", get(api::get_cities))
        // Listings
        .route("/listings", get(api::get_listings).post(api::create_listing))
        .route("/listings/all", get(api::get_all_listings))
        .route("/listings/export", get(api::export_listings))
        .route("/listings/mine", get(api::get_my_listings))
        .route("/listings/featured", get(api::get_featured_listings))
        .route("/listings/:id", get(api::get_listing).delete(api::delete_listing))
        // Filter & suggestions
        .route("/filter", get(api::get_filter).post(api::apply_filter_command))
        .route("/suggestions", get(api::get_suggestions))
        // Saved searches (require X-User-Id)
        .route(
            "/saved-searches",
            get(saved_searches::list_saved_searches).post(saved_searches::save_search),
        )
        .route("/saved-searches/:id", delete(saved_searches::delete_saved_search))
        .route("/saved-searches/:id/open", post(saved_searches::open_saved_search))
        // Posting assistance
        .route("/assist/category", post(assist::suggest_category))
        .route("/assist/price", post(assist::suggest_price))
        .route("/assist/description", post(assist::generate_description))
        .with_state(app_state);

    Router::new().nest("/api", api_router)
}
