//! Filter state machine and the listing matching predicate.
//!
//! Mutations keep two invariants of [`FilterState`]: a selected subcategory
//! always carries its parent as the main category, and a city is only ever
//! held together with its state. Any change to the suggestion query fields
//! (term, main category, subcategory) drops the active facets, since facets
//! are only meaningful for the query they were suggested for.

use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::CatalogIndex;
use crate::models::{FilterState, Listing};
use crate::suggestion::QueryKey;

/// One user edit of the filter, as sent by the interface layer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", content = "value", rename_all = "camelCase")]
pub enum FilterCommand {
    SetTerm(String),
    SelectMainCategory(Option<String>),
    SelectSubCategory(Option<String>),
    SelectState(Option<String>),
    SelectCity(Option<String>),
    ToggleFacet(String),
    Reset,
}

#[derive(Debug, Clone)]
pub struct FilterStateMachine {
    catalog: Arc<CatalogIndex>,
    state: FilterState,
}

// Treat "" the same as no selection
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FilterStateMachine {
    pub fn new(catalog: Arc<CatalogIndex>) -> Self {
        Self {
            catalog,
            state: FilterState::default(),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn query_key(&self) -> QueryKey {
        QueryKey::new(
            self.state.search_term.clone(),
            self.catalog.display_name(
                self.state.main_category.as_deref(),
                self.state.sub_category.as_deref(),
            ),
        )
    }

    /// Cities selectable for the current state.
    pub fn cities(&self) -> Vec<String> {
        self.state
            .state
            .as_deref()
            .map(|s| self.catalog.cities_of(s))
            .unwrap_or_default()
    }

    pub fn is_search_active(&self) -> bool {
        let s = &self.state;
        !s.search_term.is_empty()
            || s.main_category.is_some()
            || s.sub_category.is_some()
            || s.state.is_some()
            || s.city.is_some()
            || !s.active_facets.is_empty()
    }

    /// Returns true when the suggestion query fields changed.
    pub fn set_term(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if term == self.state.search_term {
            return false;
        }
        self.state.search_term = term;
        self.query_changed();
        true
    }

    /// Selecting a main category clears any subcategory.
    pub fn select_main_category(&mut self, main_id: Option<String>) -> bool {
        let main_id = normalize(main_id);
        if let Some(id) = &main_id {
            if self.catalog.category(id).is_none() {
                tracing::warn!(category = %id, "Ignoring unknown main category");
                return false;
            }
        }
        if main_id == self.state.main_category && self.state.sub_category.is_none() {
            return false;
        }
        self.state.main_category = main_id;
        self.state.sub_category = None;
        self.query_changed();
        true
    }

    /// Selecting a subcategory always makes its parent the main category.
    /// Selecting none keeps the current main category ("all in category").
    pub fn select_sub_category(&mut self, sub_id: Option<String>) -> bool {
        let sub_id = normalize(sub_id);
        let main_id = match &sub_id {
            Some(id) => match self.derive_main_category(id) {
                Some(parent) => Some(parent),
                None => {
                    tracing::warn!(subcategory = %id, "Ignoring unknown subcategory");
                    return false;
                }
            },
            None => self.state.main_category.clone(),
        };
        if sub_id == self.state.sub_category && main_id == self.state.main_category {
            return false;
        }
        self.state.sub_category = sub_id;
        self.state.main_category = main_id;
        self.query_changed();
        true
    }

    fn derive_main_category(&self, sub_id: &str) -> Option<String> {
        self.catalog.parent_of(sub_id).map(str::to_string)
    }

    /// Any state change clears the city.
    pub fn select_state(&mut self, state: Option<String>) {
        self.state.state = normalize(state);
        self.state.city = None;
    }

    /// Returns false when the city was rejected: no state selected, or the
    /// catalog knows the state and the city is not one of its cities.
    pub fn select_city(&mut self, city: Option<String>) -> bool {
        let city = normalize(city);
        let Some(city_name) = city else {
            self.state.city = None;
            return true;
        };
        let Some(state) = self.state.state.as_deref() else {
            tracing::debug!(city = %city_name, "Ignoring city without a selected state");
            return false;
        };
        if self.catalog.knows_state(state) && !self.catalog.cities_of(state).contains(&city_name) {
            tracing::warn!(state, city = %city_name, "Ignoring city outside the selected state");
            return false;
        }
        self.state.city = Some(city_name);
        true
    }

    /// Adds the facet if absent, removes it otherwise. Returns whether it is
    /// active afterwards.
    pub fn toggle_facet(&mut self, facet: &str) -> bool {
        let facets = &mut self.state.active_facets;
        if let Some(position) = facets.iter().position(|f| f == facet) {
            facets.remove(position);
            false
        } else {
            facets.push(facet.to_string());
            true
        }
    }

    pub fn has_facet(&self, facet: &str) -> bool {
        self.state.active_facets.iter().any(|f| f == facet)
    }

    pub fn reset(&mut self) -> bool {
        let key_changed = !self.state.search_term.is_empty()
            || self.state.main_category.is_some()
            || self.state.sub_category.is_some();
        self.state = FilterState::default();
        key_changed
    }

    /// Installs a complete state through the regular mutations, so that
    /// the subcategory wins over a mismatching main category and the city
    /// is only applied after its state.
    pub fn install(&mut self, target: &FilterState) {
        self.state = FilterState::default();
        self.set_term(target.search_term.clone());
        self.select_main_category(target.main_category.clone());
        if target.sub_category.is_some() {
            self.select_sub_category(target.sub_category.clone());
        }
        self.select_state(target.state.clone());
        self.select_city(target.city.clone());
        for facet in &target.active_facets {
            if !self.has_facet(facet) {
                self.toggle_facet(facet);
            }
        }
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        matches(listing, &self.state, &self.catalog)
    }

    /// Filters in store order.
    pub fn apply<'a>(&self, listings: &'a [Listing]) -> Vec<&'a Listing> {
        listings.iter().filter(|listing| self.matches(listing)).collect()
    }

    fn query_changed(&mut self) {
        if !self.state.active_facets.is_empty() {
            tracing::debug!(
                cleared = self.state.active_facets.len(),
                "Query changed, clearing active facets"
            );
        }
        self.state.active_facets.clear();
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn text_matches(listing: &Listing, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    contains_ci(&listing.title, &needle) || contains_ci(&listing.description, &needle)
}

/// True iff the listing passes every clause: term, state, city, category
/// and all active facets.
pub fn matches(listing: &Listing, filter: &FilterState, catalog: &CatalogIndex) -> bool {
    let term_ok = filter.search_term.is_empty() || text_matches(listing, &filter.search_term);

    let state_ok = filter
        .state
        .as_deref()
        .is_none_or(|s| listing.location.state == s);

    let city_ok = filter
        .city
        .as_deref()
        .is_none_or(|c| listing.location.city == c);

    let category_ok = match (&filter.sub_category, &filter.main_category) {
        (Some(sub), _) => listing.category_id == *sub,
        (None, Some(main)) => catalog.is_member(main, &listing.category_id),
        (None, None) => true,
    };

    let facets_ok = filter
        .active_facets
        .iter()
        .all(|facet| text_matches(listing, facet));

    term_ok && state_ok && city_ok && category_ok && facets_ok
}
