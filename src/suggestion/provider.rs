use futures::future::BoxFuture;

use crate::error::SuggestionError;

/// External service that proposes short filter facets for a query.
///
/// Implementations may be slow or fail; the coordinator bounds every call
/// with a timeout and swallows failures.
pub trait SuggestionProvider: Send + Sync {
    fn suggest_facets<'a>(
        &'a self,
        search_term: &'a str,
        category_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, SuggestionError>>;
}
