// Facet suggestions: provider seam, HTTP provider and the debouncing coordinator

use serde::Serialize;

mod coordinator;
mod gemini;
mod provider;

pub use coordinator::{CoordinatorSettings, SuggestionCoordinator, SuggestionPhase, SuggestionSnapshot};
pub use gemini::GeminiClient;
pub use provider::SuggestionProvider;

#[cfg(test)]
pub(crate) use coordinator::testing;

/// Most facets kept from a single provider reply.
pub const MAX_SUGGESTIONS: usize = 5;

/// The inputs a suggestion list is valid for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey {
    pub term: String,
    pub category: String, // Display name of the effective category
}

impl QueryKey {
    pub fn new(term: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            category: category.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.term.is_empty() && self.category.is_empty()
    }
}

/// Provider output is untrusted free text: trim, drop blanks and
/// duplicates, cap the count.
pub fn sanitize(raw: Vec<String>) -> Vec<String> {
    let mut facets: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
    for item in raw {
        let item = item.trim();
        if item.is_empty() || facets.iter().any(|f| f.eq_ignore_ascii_case(item)) {
            continue;
        }
        facets.push(item.to_string());
        if facets.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    facets
}
