// In-memory store of the listings known to the session

use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Listing;

const MOCK_LISTINGS: &str = include_str!("../data/listings.json");

/// Listings in insertion order, newest insert first. Listings are never
/// edited; they are added by the posting flow and removed by their seller.
#[derive(Debug, Default, Clone)]
pub struct ListingStore {
    listings: Vec<Listing>,
}

impl ListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Keeps the given order as-is
    pub fn from_listings(listings: Vec<Listing>) -> Self {
        Self { listings }
    }

    pub fn mock() -> Result<Self> {
        let listings: Vec<Listing> =
            serde_json::from_str(MOCK_LISTINGS).context("Failed to parse built-in mock listings")?;
        Ok(Self::from_listings(listings))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read listings file {}", path.display()))?;
        let listings: Vec<Listing> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse listings file {}", path.display()))?;
        tracing::info!("Loaded {} listings from {}", listings.len(), path.display());
        Ok(Self::from_listings(listings))
    }

    pub fn all(&self) -> &[Listing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id)
    }

    /// New listings go to the front.
    pub fn add(&mut self, listing: Listing) {
        tracing::info!(id = %listing.id, seller = %listing.seller.id, "Listing added");
        self.listings.insert(0, listing);
    }

    /// Removes the listing only when `requester_id` is its seller. Anything
    /// else (unknown id, someone else's listing) is a silent no-op.
    pub fn remove(&mut self, id: &str, requester_id: &str) -> bool {
        let before = self.listings.len();
        self.listings
            .retain(|l| l.id != id || l.seller.id != requester_id);
        let removed = self.listings.len() < before;
        if removed {
            tracing::info!(id, requester = requester_id, "Listing removed");
        } else {
            tracing::debug!(id, requester = requester_id, "Remove ignored: not found or not owner");
        }
        removed
    }

    pub fn by_seller(&self, seller_id: &str) -> Vec<&Listing> {
        self.listings.iter().filter(|l| l.seller.id == seller_id).collect()
    }

    pub fn featured(&self) -> Vec<&Listing> {
        self.listings.iter().filter(|l| l.featured).collect()
    }

    /// Newest post date first; ties keep store order.
    pub fn sorted_by_post_date(&self) -> Vec<&Listing> {
        let mut sorted: Vec<&Listing> = self.listings.iter().collect();
        sorted.sort_by(|a, b| b.post_date.cmp(&a.post_date));
        sorted
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::models::{Listing, Location, SellerRef};

    pub fn listing(id: &str, title: &str, category: &str, state: &str, city: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            price: "₦100,000".to_string(),
            category_id: category.to_string(),
            location: Location {
                country: "Nigeria".to_string(),
                state: state.to_string(),
                city: city.to_string(),
            },
            image_urls: Vec::new(),
            seller: SellerRef {
                id: "seller-1".to_string(),
                name: None,
            },
            post_date: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            featured: false,
        }
    }
}
