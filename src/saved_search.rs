// Saved searches: snapshot/restore of the filter state and per-user storage

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CaptureError;
use crate::models::{FilterState, SavedCategory, SavedLocation, SavedSearch};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Snapshots `filter` under `name`. Suggestion state is not part of the
/// record; restoring it asks for fresh suggestions.
pub fn capture(filter: &FilterState, name: &str) -> Result<SavedSearch, CaptureError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CaptureError::EmptyName);
    }
    Ok(SavedSearch {
        id: format!(
            "search-{}-{}",
            Utc::now().timestamp_millis(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ),
        name: name.to_string(),
        search_term: filter.search_term.clone(),
        location: SavedLocation {
            state: filter.state.clone().unwrap_or_default(),
            city: filter.city.clone().unwrap_or_default(),
        },
        category: SavedCategory {
            main: filter.main_category.clone(),
            sub: filter.sub_category.clone(),
        },
        filters: filter.active_facets.clone(),
    })
}

/// The filter state a saved search describes. Callers install it through
/// `FilterStateMachine::install` so that derivation rules apply and the
/// city is set after its state.
pub fn restore(saved: &SavedSearch) -> FilterState {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    FilterState {
        search_term: saved.search_term.clone(),
        main_category: saved.category.main.clone().filter(|s| !s.is_empty()),
        sub_category: saved.category.sub.clone().filter(|s| !s.is_empty()),
        state: non_empty(&saved.location.state),
        city: non_empty(&saved.location.city),
        active_facets: saved.filters.clone(),
    }
}

/// Saved searches per user, kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SavedSearchBook {
    by_user: RwLock<HashMap<String, Vec<SavedSearch>>>,
}

impl SavedSearchBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, user_id: &str, search: SavedSearch) {
        tracing::info!(user = user_id, id = %search.id, name = %search.name, "Saved search stored");
        self.by_user
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(search);
    }

    pub async fn list(&self, user_id: &str) -> Vec<SavedSearch> {
        self.by_user
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Option<SavedSearch> {
        self.by_user
            .read()
            .await
            .get(user_id)
            .and_then(|searches| searches.iter().find(|s| s.id == id).cloned())
    }

    // Unknown ids and other users' records are left alone
    pub async fn delete(&self, user_id: &str, id: &str) -> bool {
        let mut by_user = self.by_user.write().await;
        let Some(searches) = by_user.get_mut(user_id) else {
            return false;
        };
        let before = searches.len();
        searches.retain(|s| s.id != id);
        searches.len() < before
    }
}
