//! Static category and location hierarchy.
//!
//! Loaded once at startup and never mutated; every lookup is total and
//! answers "not found" with an empty list or `None`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::CatalogError;
use crate::models::{Category, Subcategory};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

// country -> state/region -> ordered cities
pub type LocationTree = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    categories: Vec<Category>,
    #[serde(default)]
    locations: LocationTree,
}

#[derive(Debug, Clone)]
pub struct CatalogIndex {
    categories: Vec<Category>,
    locations: LocationTree,
    // subcategory id -> index of its parent in `categories`
    parents: HashMap<String, usize>,
}

impl CatalogIndex {
    pub fn new(categories: Vec<Category>, locations: LocationTree) -> Result<Self, CatalogError> {
        let mut parents = HashMap::new();
        for (index, category) in categories.iter().enumerate() {
            for sub in &category.subcategories {
                if let Some(previous) = parents.insert(sub.id.clone(), index) {
                    return Err(CatalogError::DuplicateSubcategory {
                        id: sub.id.clone(),
                        first: categories[previous].id.clone(),
                        second: category.id.clone(),
                    });
                }
            }
        }
        Ok(Self {
            categories,
            locations,
            parents,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::new(document.categories, document.locations)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let catalog = Self::from_json(&json)
            .with_context(|| format!("Failed to build catalog from {}", path.display()))?;
        tracing::info!(
            categories = catalog.categories.len(),
            countries = catalog.locations.len(),
            "Loaded catalog from {}",
            path.display()
        );
        Ok(catalog)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn locations(&self) -> &LocationTree {
        &self.locations
    }

    pub fn category(&self, main_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == main_id)
    }

    pub fn subcategory(&self, sub_id: &str) -> Option<&Subcategory> {
        let parent = &self.categories[*self.parents.get(sub_id)?];
        parent.subcategories.iter().find(|s| s.id == sub_id)
    }

    pub fn subcategories_of(&self, main_id: &str) -> &[Subcategory] {
        self.category(main_id)
            .map(|c| c.subcategories.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, sub_id: &str) -> Option<&str> {
        self.parents
            .get(sub_id)
            .map(|&index| self.categories[index].id.as_str())
    }

    pub fn is_member(&self, main_id: &str, sub_id: &str) -> bool {
        self.parent_of(sub_id) == Some(main_id)
    }

    /// Name used when asking the suggestion provider: the subcategory's
    /// name if one is selected, else the main category's, else empty.
    pub fn display_name(&self, main_id: Option<&str>, sub_id: Option<&str>) -> String {
        sub_id
            .and_then(|id| self.subcategory(id))
            .map(|s| s.name.clone())
            .or_else(|| main_id.and_then(|id| self.category(id)).map(|c| c.name.clone()))
            .unwrap_or_default()
    }

    pub fn countries(&self) -> Vec<&str> {
        self.locations.keys().map(String::as_str).collect()
    }

    pub fn states_of(&self, country: &str) -> Vec<&str> {
        self.locations
            .get(country)
            .map(|states| states.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn knows_state(&self, state: &str) -> bool {
        self.locations.values().any(|states| states.contains_key(state))
    }

    /// Cities of a state, searched across all countries. A state name shared
    /// by several countries yields the union of their cities, in country
    /// order, without duplicates.
    pub fn cities_of(&self, state: &str) -> Vec<String> {
        let mut cities: Vec<String> = Vec::new();
        for states in self.locations.values() {
            if let Some(list) = states.get(state) {
                for city in list {
                    if !cities.contains(city) {
                        cities.push(city.clone());
                    }
                }
            }
        }
        cities
    }
}
