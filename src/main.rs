use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use reqwest::Client;
use serde::Deserialize;
use std::{env, fs, net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::CatalogIndex;
use crate::config::Settings;
use crate::listing_store::ListingStore;
use crate::saved_search::SavedSearchBook;
use crate::session::Session;
use crate::suggestion::{CoordinatorSettings, GeminiClient};

// Declare modules
mod catalog;
mod config;
mod error;
mod filter;
mod listing_store;
mod models;
mod requester;
mod routes;
mod saved_search;
mod session;
mod suggestion;

// Optional outbound proxy for the Gemini client
#[derive(Deserialize, Debug)]
struct ProxyConfig {
    http_proxy: Option<String>,
    https_proxy: Option<String>,
}

fn load_and_set_proxy_env_vars() -> Result<()> {
    let config_path = Path::new("proxyconfig.json");
    if !config_path.exists() {
        tracing::info!("proxyconfig.json not found, skipping proxy environment variable setup.");
        return Ok(());
    }

    let config_content = fs::read_to_string(config_path).context("Failed to read proxyconfig.json")?;
    let proxy_config: ProxyConfig =
        serde_json::from_str(&config_content).context("Failed to parse proxyconfig.json")?;

    for (name, value) in [
        ("HTTP_PROXY", proxy_config.http_proxy),
        ("HTTPS_PROXY", proxy_config.https_proxy),
    ] {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            // SAFETY: called at the start of main, before the HTTP client or
            // any other thread reads the environment.
            unsafe { env::set_var(name, value) };
            tracing::info!("Set {} environment variable from config.", name);
        }
    }
    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    session: Arc<Session>,
    assistant: Arc<GeminiClient>,
    saved_searches: Arc<SavedSearchBook>,
}

fn load_catalog(settings: &Settings) -> Result<CatalogIndex> {
    match &settings.catalog_path {
        Some(path) => CatalogIndex::load(Path::new(path)),
        None => CatalogIndex::builtin().context("Failed to parse built-in catalog"),
    }
}

fn load_listings(settings: &Settings) -> Result<ListingStore> {
    match &settings.listings_path {
        Some(path) => ListingStore::load(Path::new(path)),
        None if settings.seed_mock_listings => ListingStore::mock(),
        None => Ok(ListingStore::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    if let Err(e) = load_and_set_proxy_env_vars() {
        tracing::warn!("Failed to load or apply proxy configuration: {}", e);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "classifieds_discovery=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing classifieds discovery server...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let catalog = Arc::new(load_catalog(&settings)?);
    tracing::info!("Catalog ready with {} categories.", catalog.categories().len());
    let store = load_listings(&settings)?;
    if store.is_empty() {
        tracing::warn!("Listing store is empty; nothing will be visible until listings are posted.");
    } else {
        tracing::info!("Listing store ready with {} listings.", store.len());
    }

    // Built after the proxy env vars are set so that it picks them up
    let http_client = Arc::new(
        Client::builder()
            .timeout(settings.suggestion_timeout())
            .build()
            .context("Failed to build shared reqwest client")?,
    );
    let assistant = Arc::new(GeminiClient::new(http_client, &settings));
    if assistant.is_enabled() {
        tracing::info!("Gemini suggestions enabled (model: {}).", settings.gemini_model);
    }

    let session = Session::new(
        catalog,
        store,
        assistant.clone(),
        CoordinatorSettings::from_settings(&settings),
    );

    let app_state = AppState {
        session: Arc::new(session),
        assistant,
        saved_searches: Arc::new(SavedSearchBook::new()),
    };

    let app: Router = routes::create_router(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", settings.server_address))?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
