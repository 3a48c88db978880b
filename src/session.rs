//! The discovery session: one listing store, one filter and the suggestion
//! coordinator that follows it.
//!
//! Every filter command goes through [`Session::apply`], which is the only
//! place that tells the coordinator about query changes. Facet activation is
//! checked against the coordinator here, so `active_facets` never holds a
//! facet that was not offered for the current query.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::catalog::CatalogIndex;
use crate::error::{CaptureError, ListingError};
use crate::filter::{FilterCommand, FilterStateMachine};
use crate::listing_store::ListingStore;
use crate::models::{FilterState, Listing, ListingDraft, SavedSearch, SellerRef};
use crate::saved_search;
use crate::suggestion::{CoordinatorSettings, SuggestionCoordinator, SuggestionProvider, SuggestionSnapshot};

/// Everything the filter panel renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterView {
    pub filter: FilterState,
    pub cities: Vec<String>,
    pub is_search_active: bool,
    pub suggestions: SuggestionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingsView {
    pub listings: Vec<Listing>,
    pub is_search_active: bool,
    pub total: usize,
}

pub struct Session {
    catalog: Arc<CatalogIndex>,
    // Lock order: filter before store
    filter: RwLock<FilterStateMachine>,
    store: RwLock<ListingStore>,
    suggestions: SuggestionCoordinator,
    listing_seq: AtomicU64,
}

impl Session {
    pub fn new(
        catalog: Arc<CatalogIndex>,
        store: ListingStore,
        provider: Arc<dyn SuggestionProvider>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            filter: RwLock::new(FilterStateMachine::new(catalog.clone())),
            catalog,
            store: RwLock::new(store),
            suggestions: SuggestionCoordinator::new(provider, settings),
            listing_seq: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    /// Applies one user edit. Must be called from within a tokio runtime,
    /// since query changes start the debounce timer.
    pub async fn apply(&self, command: FilterCommand) -> FilterView {
        let mut filter = self.filter.write().await;
        tracing::debug!(?command, "Applying filter command");

        let query_changed = match command {
            FilterCommand::SetTerm(term) => filter.set_term(term),
            FilterCommand::SelectMainCategory(id) => filter.select_main_category(id),
            FilterCommand::SelectSubCategory(id) => filter.select_sub_category(id),
            FilterCommand::SelectState(state) => {
                filter.select_state(state);
                false
            }
            FilterCommand::SelectCity(city) => {
                filter.select_city(city);
                false
            }
            FilterCommand::ToggleFacet(facet) => {
                self.toggle_facet(&mut filter, &facet);
                false
            }
            FilterCommand::Reset => {
                filter.reset();
                // Always re-arm so that pins from a restored search go away
                true
            }
        };

        if query_changed {
            self.suggestions.query_changed(filter.query_key());
        }
        self.view_of(&filter)
    }

    // Deactivation is always allowed; activation only for offered facets
    fn toggle_facet(&self, filter: &mut FilterStateMachine, facet: &str) {
        if filter.has_facet(facet) || self.suggestions.offers(facet) {
            let active = filter.toggle_facet(facet);
            tracing::debug!(facet, active, "Facet toggled");
        } else {
            tracing::warn!(facet, "Ignoring facet that is not currently suggested");
        }
    }

    pub async fn view(&self) -> FilterView {
        let filter = self.filter.read().await;
        self.view_of(&filter)
    }

    fn view_of(&self, filter: &FilterStateMachine) -> FilterView {
        FilterView {
            filter: filter.state().clone(),
            cities: filter.cities(),
            is_search_active: filter.is_search_active(),
            suggestions: self.suggestions.snapshot(),
        }
    }

    pub fn suggestions(&self) -> SuggestionSnapshot {
        self.suggestions.snapshot()
    }

    /// Listings passing the current filter, in store order.
    pub async fn visible_listings(&self) -> ListingsView {
        let filter = self.filter.read().await;
        let store = self.store.read().await;
        let listings: Vec<Listing> = filter.apply(store.all()).into_iter().cloned().collect();
        ListingsView {
            is_search_active: filter.is_search_active(),
            total: store.len(),
            listings,
        }
    }

    pub async fn listings_by_date(&self) -> Vec<Listing> {
        self.store
            .read()
            .await
            .sorted_by_post_date()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn listing(&self, id: &str) -> Option<Listing> {
        self.store.read().await.get(id).cloned()
    }

    pub async fn featured_listings(&self) -> Vec<Listing> {
        self.store
            .read()
            .await
            .featured()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn my_listings(&self, user_id: &str) -> Vec<Listing> {
        self.store
            .read()
            .await
            .by_seller(user_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Publishes a draft for `seller`. The draft's category must be a known
    /// subcategory.
    pub async fn add_listing(&self, draft: ListingDraft, seller: SellerRef) -> Result<Listing, ListingError> {
        if draft.title.trim().is_empty() {
            return Err(ListingError::MissingTitle);
        }
        if self.catalog.subcategory(&draft.category_id).is_none() {
            return Err(ListingError::UnknownCategory(draft.category_id));
        }

        let now = Utc::now();
        let id = format!(
            "listing-{}-{}",
            now.timestamp_millis(),
            self.listing_seq.fetch_add(1, Ordering::Relaxed)
        );
        let listing = draft.into_listing(id, seller, now);
        self.store.write().await.add(listing.clone());
        Ok(listing)
    }

    pub async fn remove_listing(&self, id: &str, requester_id: &str) -> bool {
        self.store.write().await.remove(id, requester_id)
    }

    pub async fn capture(&self, name: &str) -> Result<SavedSearch, CaptureError> {
        let filter = self.filter.read().await;
        saved_search::capture(filter.state(), name)
    }

    /// Replaces the filter with a saved search and asks for fresh
    /// suggestions. The saved facets stay active and offered.
    pub async fn restore(&self, saved: &SavedSearch) -> FilterView {
        let mut filter = self.filter.write().await;
        filter.install(&saved_search::restore(saved));
        tracing::info!(id = %saved.id, name = %saved.name, "Saved search restored");
        self.suggestions
            .rearm(filter.query_key(), filter.state().active_facets.clone());
        self.view_of(&filter)
    }
}
