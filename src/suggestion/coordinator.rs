//! Debounced, single-flight facet suggestions.
//!
//! Every query change restarts one debounce timer. When the timer fires the
//! coordinator issues a single provider request for the query that was
//! current at that moment. Requests already in flight are left to finish;
//! a reply is applied only if no query change happened since its request
//! went out, even when the query has since returned to an equal key.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::{provider::SuggestionProvider, sanitize, QueryKey, MAX_SUGGESTIONS};
use crate::config::Settings;
use crate::error::SuggestionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionPhase {
    Idle,
    Debouncing,
    Fetching,
    Settled,
    Failed,
}

/// What happened to a provider reply on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchOutcome {
    Stale,
    Success(Vec<String>),
    Failure,
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub debounce: Duration,
    pub timeout: Duration,
}

impl CoordinatorSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: settings.suggestion_debounce(),
            timeout: settings.suggestion_timeout(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(750),
            timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSnapshot {
    pub phase: SuggestionPhase,
    pub busy: bool,
    pub term: String,
    pub category: String,
    pub suggestions: Vec<String>,
}

struct CoordinatorState {
    query: QueryKey,
    phase: SuggestionPhase,
    suggestions: Vec<String>,
    // Facets restored from a saved search; kept offered until the query changes
    pinned: Vec<String>,
    // Bumped on every arm; timers and replies of older generations are ignored
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct SuggestionCoordinator {
    provider: Arc<dyn SuggestionProvider>,
    settings: CoordinatorSettings,
    state: Arc<Mutex<CoordinatorState>>,
}

impl SuggestionCoordinator {
    pub fn new(provider: Arc<dyn SuggestionProvider>, settings: CoordinatorSettings) -> Self {
        Self {
            provider,
            settings,
            state: Arc::new(Mutex::new(CoordinatorState {
                query: QueryKey::default(),
                phase: SuggestionPhase::Idle,
                suggestions: Vec::new(),
                pinned: Vec::new(),
                generation: 0,
                timer: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the current suggestions and restarts the debounce timer.
    /// Must be called from within a tokio runtime.
    pub fn query_changed(&self, key: QueryKey) {
        self.arm(key, Vec::new());
    }

    /// Like `query_changed`, but `pinned` facets stay offered through the
    /// next reply. Used when a saved search brings its own active facets.
    pub fn rearm(&self, key: QueryKey, pinned: Vec<String>) {
        self.arm(key, pinned);
    }

    fn arm(&self, key: QueryKey, pinned: Vec<String>) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.query = key;
        state.suggestions = pinned.clone();
        state.pinned = pinned;
        state.phase = SuggestionPhase::Debouncing;
        tracing::debug!(
            term = %state.query.term,
            category = %state.query.category,
            generation = state.generation,
            "Suggestion query changed, debouncing"
        );

        let generation = state.generation;
        let debounce = self.settings.debounce;
        let coordinator = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            coordinator.fire(generation);
        }));
    }

    fn fire(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            // Superseded between the sleep and the lock
            return;
        }
        state.timer = None;

        let key = state.query.clone();
        if key.is_empty() {
            state.phase = SuggestionPhase::Idle;
            state.suggestions = state.pinned.clone();
            tracing::debug!("Empty query, no suggestions requested");
            return;
        }
        state.phase = SuggestionPhase::Fetching;
        drop(state);

        tracing::info!(term = %key.term, category = %key.category, generation, "Requesting facet suggestions");
        let coordinator = self.clone();
        tokio::spawn(async move {
            let timeout = coordinator.settings.timeout;
            let result = match tokio::time::timeout(
                timeout,
                coordinator.provider.suggest_facets(&key.term, &key.category),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SuggestionError::Timeout(timeout)),
            };
            coordinator.complete(generation, result);
        });
    }

    /// Applies the reply of the request issued for `generation`. Only the
    /// most recently issued request, while still fetching, may update the
    /// list; anything else is discarded without touching state.
    fn complete(&self, generation: u64, result: Result<Vec<String>, SuggestionError>) -> FetchOutcome {
        let mut state = self.lock();
        if state.generation != generation || state.phase != SuggestionPhase::Fetching {
            tracing::debug!(
                generation,
                current = state.generation,
                phase = ?state.phase,
                "Discarding stale suggestion reply"
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(facets) => {
                let facets = merge_pinned(sanitize(facets), &state.pinned);
                tracing::debug!(count = facets.len(), "Suggestions settled");
                state.suggestions = facets.clone();
                state.phase = SuggestionPhase::Settled;
                FetchOutcome::Success(facets)
            }
            Err(e) => {
                tracing::warn!(error = %e, term = %state.query.term, "Failed to fetch filter suggestions");
                state.suggestions = state.pinned.clone();
                state.phase = SuggestionPhase::Failed;
                FetchOutcome::Failure
            }
        }
    }

    pub fn snapshot(&self) -> SuggestionSnapshot {
        let state = self.lock();
        SuggestionSnapshot {
            phase: state.phase,
            busy: matches!(state.phase, SuggestionPhase::Debouncing | SuggestionPhase::Fetching),
            term: state.query.term.clone(),
            category: state.query.category.clone(),
            suggestions: state.suggestions.clone(),
        }
    }

    /// Whether `facet` is currently offered and may be activated.
    pub fn offers(&self, facet: &str) -> bool {
        self.lock().suggestions.iter().any(|s| s == facet)
    }
}

// Pinned facets must stay offered with their exact spelling. A provider
// facet equal to a pin up to ASCII case is replaced by the pin, and provider
// facets are dropped from the end to stay within MAX_SUGGESTIONS.
fn merge_pinned(mut facets: Vec<String>, pinned: &[String]) -> Vec<String> {
    for pin in pinned {
        match facets.iter().position(|f| f.eq_ignore_ascii_case(pin)) {
            Some(index) => facets[index] = pin.clone(),
            None => facets.push(pin.clone()),
        }
    }
    while facets.len() > MAX_SUGGESTIONS {
        let Some(index) = facets.iter().rposition(|f| !pinned.contains(f)) else {
            break;
        };
        facets.remove(index);
    }
    facets
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    fn coordinator(provider: &Arc<ScriptedProvider>) -> SuggestionCoordinator {
        SuggestionCoordinator::new(provider.clone(), CoordinatorSettings::default())
    }

    fn key(term: &str) -> QueryKey {
        QueryKey::new(term, "")
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_issue_one_request_for_the_last_term() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);

        coordinator.query_changed(key("a"));
        sleep(Duration::from_millis(100)).await;
        coordinator.query_changed(key("ab"));
        sleep(Duration::from_millis(100)).await;
        coordinator.query_changed(key("abc"));

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Debouncing);
        assert!(snapshot.busy);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls(), vec![key("abc")]);
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Settled);
        assert_eq!(snapshot.suggestions, vec!["abc facet".to_string()]);
        assert!(!snapshot.busy);
    }

    #[tokio::test(start_paused = true)]
    async fn no_request_before_the_window_elapses() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);

        coordinator.query_changed(key("phone"));
        sleep(Duration::from_millis(700)).await;
        assert!(provider.calls().is_empty());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(provider.calls(), vec![key("phone")]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_for_previous_query_is_discarded() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with("phone", 1_000, Some(&["Phone facet"]))
                .with("laptop", 5_000, Some(&["Laptop facet"])),
        );
        let coordinator = coordinator(&provider);

        coordinator.query_changed(key("phone"));
        // phone request goes out at 750ms and answers at 1750ms
        sleep(Duration::from_millis(800)).await;
        assert_eq!(coordinator.snapshot().phase, SuggestionPhase::Fetching);
        coordinator.query_changed(key("laptop"));

        sleep(Duration::from_millis(1_200)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.term, "laptop");
        assert_eq!(snapshot.phase, SuggestionPhase::Fetching);
        assert!(snapshot.suggestions.is_empty());
        assert!(snapshot.busy);

        sleep(Duration::from_secs(10)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Settled);
        assert_eq!(snapshot.suggestions, vec!["Laptop facet".to_string()]);
        assert_eq!(provider.calls(), vec![key("phone"), key("laptop")]);
    }

    #[tokio::test]
    async fn replies_for_superseded_generations_are_discarded() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = SuggestionCoordinator::new(
            provider.clone(),
            CoordinatorSettings {
                debounce: Duration::from_secs(3600),
                timeout: Duration::from_secs(1),
            },
        );
        coordinator.query_changed(key("current"));
        let generation = coordinator.lock().generation;
        let before = coordinator.snapshot();

        // Still debouncing: even the current generation has no request out
        let outcome = coordinator.complete(generation, Ok(vec!["Early".to_string()]));
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(coordinator.snapshot(), before);

        coordinator.lock().phase = SuggestionPhase::Fetching;
        let outcome = coordinator.complete(generation - 1, Ok(vec!["Old".to_string()]));
        assert_eq!(outcome, FetchOutcome::Stale);
        let outcome = coordinator.complete(generation - 1, Err(SuggestionError::Disabled));
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(coordinator.snapshot().phase, SuggestionPhase::Fetching);

        let outcome = coordinator.complete(generation, Ok(vec!["New".to_string()]));
        assert_eq!(outcome, FetchOutcome::Success(vec!["New".to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn returning_to_an_earlier_query_ignores_its_first_reply() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with("phone", 2_000, Some(&["First phone reply"]))
                .with("laptop", 2_000, Some(&["Laptop facet"])),
        );
        let coordinator = coordinator(&provider);

        // phone goes out at 750ms and answers at 2750ms
        coordinator.query_changed(key("phone"));
        sleep(Duration::from_millis(800)).await;
        coordinator.query_changed(key("laptop"));
        sleep(Duration::from_millis(700)).await;
        coordinator.query_changed(key("phone"));
        sleep(Duration::from_millis(700)).await;
        coordinator.query_changed(key("laptop"));
        sleep(Duration::from_millis(450)).await;
        // Back on phone at 2650ms; its own request would go out at 3400ms
        coordinator.query_changed(key("phone"));

        sleep(Duration::from_millis(200)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.term, "phone");
        assert_eq!(snapshot.phase, SuggestionPhase::Debouncing);
        assert!(snapshot.busy);
        assert!(snapshot.suggestions.is_empty());

        sleep(Duration::from_secs(5)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Settled);
        assert!(!snapshot.busy);
        assert_eq!(provider.calls(), vec![key("phone"), key("phone")]);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_display_names_do_not_leak_replies() {
        // jobs-computer and services-computer are both named "Computer"
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);
        let computer = QueryKey::new("", "Computer");

        coordinator.query_changed(computer.clone());
        sleep(Duration::from_millis(755)).await;
        assert_eq!(coordinator.snapshot().phase, SuggestionPhase::Fetching);
        coordinator.query_changed(computer.clone());

        // The first reply lands at 760ms while the second key is debouncing
        sleep(Duration::from_millis(100)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Debouncing);
        assert!(snapshot.suggestions.is_empty());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(coordinator.snapshot().phase, SuggestionPhase::Settled);
        assert_eq!(provider.calls(), vec![computer.clone(), computer]);
    }

    #[test]
    fn pins_merge_case_insensitively_within_the_cap() {
        let facets = vec![
            "brand new".to_string(),
            "256GB".to_string(),
            "Ikeja".to_string(),
            "Pro Max".to_string(),
            "Unlocked".to_string(),
        ];
        let pinned = vec!["Brand New".to_string(), "UK Used".to_string()];
        assert_eq!(
            merge_pinned(facets, &pinned),
            vec!["Brand New", "256GB", "Ikeja", "Pro Max", "UK Used"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_query_goes_idle_without_a_request() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);

        coordinator.query_changed(QueryKey::default());
        sleep(Duration::from_secs(1)).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Idle);
        assert!(!snapshot.busy);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn category_alone_is_enough_to_fetch() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);

        coordinator.query_changed(QueryKey::new("", "Electronics"));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(provider.calls(), vec![QueryKey::new("", "Electronics")]);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_failure_leaves_an_empty_list() {
        let provider = Arc::new(ScriptedProvider::default().with("phone", 10, None));
        let coordinator = coordinator(&provider);

        coordinator.query_changed(key("phone"));
        sleep(Duration::from_secs(1)).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Failed);
        assert!(snapshot.suggestions.is_empty());
        assert!(!snapshot.busy);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out_and_clears_busy() {
        let provider = Arc::new(ScriptedProvider::default().with("phone", 600_000, Some(&["never"])));
        let coordinator = coordinator(&provider);

        coordinator.query_changed(key("phone"));
        sleep(Duration::from_secs(5)).await;
        assert!(coordinator.snapshot().busy);

        sleep(Duration::from_secs(5)).await;
        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, SuggestionPhase::Failed);
        assert!(!snapshot.busy);
    }

    #[tokio::test(start_paused = true)]
    async fn pinned_facets_stay_offered_until_the_query_changes() {
        let provider = Arc::new(ScriptedProvider::default());
        let coordinator = coordinator(&provider);

        coordinator.rearm(key("phone"), vec!["Brand New".to_string()]);
        assert!(coordinator.offers("Brand New"));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(
            coordinator.snapshot().suggestions,
            vec!["phone facet".to_string(), "Brand New".to_string()]
        );

        coordinator.query_changed(key("phones"));
        assert!(!coordinator.offers("Brand New"));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(coordinator.snapshot().suggestions, vec!["phones facet".to_string()]);
    }
}
