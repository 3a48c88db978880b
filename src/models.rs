// Data structures shared across the discovery engine and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Location {
    pub country: String,
    pub state: String,
    pub city: String,
}

// Reference to the user who posted a listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SellerRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: String, // Display string ("₦350,000", "Request a Quote"), never parsed
    #[serde(rename = "category")]
    pub category_id: String, // Subcategory id
    pub location: Location,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub seller: SellerRef,
    pub post_date: DateTime<Utc>,
    #[serde(default, rename = "isFeatured")]
    pub featured: bool,
}

// What the posting flow submits; id, seller and post date are filled in server-side
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: String,
    #[serde(rename = "category")]
    pub category_id: String,
    pub location: Location,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default, rename = "isFeatured")]
    pub featured: bool,
}

impl ListingDraft {
    pub fn into_listing(self, id: String, seller: SellerRef, post_date: DateTime<Utc>) -> Listing {
        Listing {
            id,
            title: self.title,
            description: self.description,
            price: self.price,
            category_id: self.category_id,
            location: self.location,
            image_urls: self.image_urls,
            seller,
            post_date,
            featured: self.featured,
        }
    }
}

/// The current discovery query.
///
/// `main_category` always equals the parent of `sub_category` when the latter
/// is set, and `active_facets` only ever holds facets offered for the current
/// `(search_term, category)` pair. `FilterStateMachine` maintains both.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub search_term: String,
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub active_facets: Vec<String>,
}

// Saved search record, in the shape the profile UI stores it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub name: String,
    pub search_term: String,
    pub location: SavedLocation,
    pub category: SavedCategory,
    pub filters: Vec<String>,
}

// Unset state/city are stored as empty strings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SavedLocation {
    pub state: String,
    pub city: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SavedCategory {
    pub main: Option<String>,
    pub sub: Option<String>,
}
