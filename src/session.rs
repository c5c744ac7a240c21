//! Multi-page search aggregation.
//!
//! A [`SearchSession`] remembers the current ingredient list, accumulates
//! every page fetched so far and knows whether the API has more to offer.
//! Only one fetch may run at a time; overlapping calls are rejected rather
//! than queued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::cache::normalize_ingredients;
use crate::error::SearchError;
use crate::model::{PaginatedRecipes, Recipe};
use crate::service::RecipeService;

#[derive(Debug)]
struct SessionState {
    ingredients: Vec<String>,
    results: Vec<Recipe>,
    /// Identifiers already in `results`
    seen: HashSet<String>,
    next_page: u32,
    has_more: bool,
    total_results: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            ingredients: Vec::new(),
            results: Vec::new(),
            seen: HashSet::new(),
            next_page: 1,
            has_more: true,
            total_results: 0,
        }
    }
}

/// Clears the in-flight flag when the fetch ends, including when the
/// caller drops the future half-way.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SearchSession {
    service: Arc<RecipeService>,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    cancel: watch::Sender<u64>,
}

impl SearchSession {
    pub fn new(service: Arc<RecipeService>) -> Self {
        let (cancel, _) = watch::channel(0);
        SearchSession {
            service,
            state: Mutex::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
            cancel,
        }
    }

    /// Reset the session and fetch the first page for `ingredients`.
    ///
    /// Returns the recipes of that first page. Fails with
    /// [`SearchError::Busy`] while another fetch is running.
    pub async fn start_search(&self, ingredients: &[String]) -> Result<Vec<Recipe>, SearchError> {
        let (_guard, cancelled) = self.begin().ok_or(SearchError::Busy)?;

        let ingredients = normalize_ingredients(ingredients);
        {
            let mut state = self.state();
            *state = SessionState {
                ingredients: ingredients.clone(),
                ..SessionState::default()
            };
        }

        info!("Starting search for [{}]", ingredients.join(", "));
        let page = self.fetch(&ingredients, 1, cancelled).await?;
        Ok(self.apply(1, page))
    }

    /// Fetch and append the next page.
    ///
    /// Returns an empty list, leaving the session untouched, when the last
    /// page was already reached or a fetch is in flight.
    pub async fn load_more(&self) -> Result<Vec<Recipe>, SearchError> {
        let Some((_guard, cancelled)) = self.begin() else {
            debug!("load_more ignored: a fetch is already in flight");
            return Ok(Vec::new());
        };

        let (ingredients, page) = {
            let state = self.state();
            if !state.has_more {
                return Ok(Vec::new());
            }
            (state.ingredients.clone(), state.next_page)
        };

        let result = self.fetch(&ingredients, page, cancelled).await?;
        Ok(self.apply(page, result))
    }

    /// Abort the in-flight fetch, if any. The pending call returns
    /// [`SearchError::Cancelled`] and the session keeps its previous pages.
    pub fn cancel(&self) {
        let _state = self.state();
        if self.is_loading() {
            self.cancel.send_modify(|generation| *generation += 1);
        }
    }

    pub fn results(&self) -> Vec<Recipe> {
        self.state().results.clone()
    }

    pub fn ingredients(&self) -> Vec<String> {
        self.state().ingredients.clone()
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn total_results(&self) -> u64 {
        self.state().total_results
    }

    /// Page that the next [`load_more`](Self::load_more) will request
    pub fn next_page(&self) -> u32 {
        self.state().next_page
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the session for one fetch.
    ///
    /// The flag is set and the cancellation receiver taken under the state
    /// lock, which [`cancel`](Self::cancel) also holds, so a cancel issued
    /// once the session reports loading is always delivered to this fetch.
    fn begin(&self) -> Option<(InFlightGuard<'_>, watch::Receiver<u64>)> {
        let _state = self.state();
        let guard = InFlightGuard::acquire(&self.in_flight)?;
        Some((guard, self.cancel.subscribe()))
    }

    async fn fetch(
        &self,
        ingredients: &[String],
        page: u32,
        mut cancelled: watch::Receiver<u64>,
    ) -> Result<PaginatedRecipes, SearchError> {
        tokio::select! {
            result = self.service.search(ingredients, page) => result,
            _ = cancelled.changed() => {
                info!("Search for page {} cancelled", page);
                Err(SearchError::Cancelled)
            }
        }
    }

    /// Append a fetched page, returning the recipes that were new to the session
    fn apply(&self, page: u32, result: PaginatedRecipes) -> Vec<Recipe> {
        let mut state = self.state();
        let mut added = Vec::with_capacity(result.recipes.len());
        for recipe in result.recipes {
            if !state.seen.insert(recipe.uri.clone()) {
                warn!("Dropping duplicate recipe {} on page {}", recipe.uri, page);
                continue;
            }
            state.results.push(recipe.clone());
            added.push(recipe);
        }

        state.has_more = result.next_page.is_some();
        state.next_page = result.next_page.unwrap_or(page.saturating_add(1));
        state.total_results = result.total_results;
        debug!(
            "Session holds {} of {} recipes (more: {})",
            state.results.len(),
            state.total_results,
            state.has_more
        );
        added
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::Url;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::error::TransportError;
    use crate::network::NetworkService;

    /// Serves `total` synthetic recipes, `page_size` at a time, based on the
    /// `from`/`to` query parameters
    struct PagedNetwork {
        total: usize,
        calls: AtomicUsize,
        fail_next: AtomicBool,
        gate: Option<Arc<Notify>>,
    }

    impl PagedNetwork {
        fn new(total: usize) -> Arc<Self> {
            Arc::new(PagedNetwork {
                total,
                calls: AtomicUsize::new(0),
                fail_next: AtomicBool::new(false),
                gate: None,
            })
        }

        fn gated(total: usize, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(PagedNetwork {
                total,
                calls: AtomicUsize::new(0),
                fail_next: AtomicBool::new(false),
                gate: Some(gate),
            })
        }
    }

    #[async_trait]
    impl NetworkService for PagedNetwork {
        async fn request(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err("offline".into());
            }

            let param = |name: &str| -> usize {
                url.query_pairs()
                    .find(|(k, _)| k == name)
                    .and_then(|(_, v)| v.parse().ok())
                    .unwrap_or(0)
            };
            let (from, to) = (param("from"), param("to").min(self.total));

            let hits: Vec<serde_json::Value> = (from..to)
                .map(|i| {
                    serde_json::json!({
                        "recipe": {
                            "uri": format!("recipe_{}", i),
                            "label": format!("Recipe {}", i),
                            "image": "",
                            "ingredientLines": ["1 egg"],
                            "calories": 10.0,
                            "url": ""
                        }
                    })
                })
                .collect();
            let body = serde_json::json!({ "hits": hits, "count": self.total });
            Ok(serde_json::to_vec(&body)?)
        }
    }

    /// Every page holds the same hits, whatever is requested
    struct RepeatingNetwork {
        uris: Vec<&'static str>,
        count: u64,
    }

    #[async_trait]
    impl NetworkService for RepeatingNetwork {
        async fn request(&self, _url: &Url) -> Result<Vec<u8>, TransportError> {
            let hits: Vec<serde_json::Value> = self
                .uris
                .iter()
                .map(|uri| {
                    serde_json::json!({
                        "recipe": {
                            "uri": uri,
                            "label": uri.to_uppercase(),
                            "image": "",
                            "ingredientLines": [],
                            "calories": 0.0,
                            "url": ""
                        }
                    })
                })
                .collect();
            let body = serde_json::json!({ "hits": hits, "count": self.count });
            Ok(serde_json::to_vec(&body)?)
        }
    }

    fn session(network: Arc<PagedNetwork>, page_size: u32) -> SearchSession {
        let service = RecipeService::new("id", "key", network)
            .with_base_url("https://api.example.com/search")
            .with_page_size(page_size);
        SearchSession::new(Arc::new(service))
    }

    fn query(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_initial_state() {
        let session = session(PagedNetwork::new(0), 20);
        assert!(session.has_more());
        assert_eq!(session.next_page(), 1);
        assert!(session.results().is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_paginates_until_exhausted() {
        let network = PagedNetwork::new(5);
        let session = session(network.clone(), 2);

        let first = session.start_search(&query(&["egg"])).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(session.has_more());
        assert_eq!(session.total_results(), 5);

        assert_eq!(session.load_more().await.unwrap().len(), 2);
        assert_eq!(session.load_more().await.unwrap().len(), 1);
        assert!(!session.has_more());

        let uris: Vec<String> = session.results().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            uris,
            vec!["recipe_0", "recipe_1", "recipe_2", "recipe_3", "recipe_4"]
        );
        assert_eq!(network.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_load_more_after_last_page_is_noop() {
        let network = PagedNetwork::new(1);
        let session = session(network.clone(), 20);

        session.start_search(&query(&["chicken", "rice"])).await.unwrap();
        assert!(!session.has_more());

        assert!(session.load_more().await.unwrap().is_empty());
        assert!(!session.has_more());
        assert!(session.load_more().await.unwrap().is_empty());
        assert_eq!(session.results().len(), 1);
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_search_resets() {
        let session = session(PagedNetwork::new(3), 2);

        session.start_search(&query(&["egg"])).await.unwrap();
        session.load_more().await.unwrap();
        assert_eq!(session.results().len(), 3);

        session.start_search(&query(&[" flour "])).await.unwrap();
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.ingredients(), vec!["flour"]);
        assert_eq!(session.next_page(), 2);
    }

    #[tokio::test]
    async fn test_page_only_advances_on_success() {
        let network = PagedNetwork::new(6);
        let session = session(network.clone(), 2);
        session.start_search(&query(&["egg"])).await.unwrap();

        network.fail_next.store(true, Ordering::SeqCst);
        let err = session.load_more().await.unwrap_err();
        assert!(matches!(err, SearchError::TransportFailure(_)));
        assert_eq!(session.next_page(), 2);
        assert!(session.has_more());
        assert!(!session.is_loading());

        assert_eq!(session.load_more().await.unwrap().len(), 2);
        assert_eq!(session.next_page(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_fetches_are_rejected() {
        let gate = Arc::new(Notify::new());
        let network = PagedNetwork::gated(10, gate.clone());
        let session = Arc::new(session(network, 2));

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.start_search(&query(&["egg"])).await })
        };
        while !session.is_loading() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(session.load_more().await.unwrap().is_empty());
        assert!(matches!(
            session.start_search(&query(&["rice"])).await,
            Err(SearchError::Busy)
        ));

        gate.notify_one();
        assert_eq!(running.await.unwrap().unwrap().len(), 2);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_fetch() {
        let gate = Arc::new(Notify::new());
        let network = PagedNetwork::gated(10, gate);
        let session = Arc::new(session(network, 2));

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.start_search(&query(&["egg"])).await })
        };
        while !session.is_loading() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        session.cancel();
        assert!(matches!(
            running.await.unwrap(),
            Err(SearchError::Cancelled)
        ));
        assert!(!session.is_loading());
        assert!(session.results().is_empty());
        assert_eq!(session.next_page(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_recipes_are_dropped() {
        let network = Arc::new(RepeatingNetwork {
            uris: vec!["a", "b", "a"],
            count: 6,
        });
        let service = RecipeService::new("id", "key", network)
            .with_base_url("https://api.example.com/search")
            .with_page_size(3);
        let session = SearchSession::new(Arc::new(service));

        let first = session.start_search(&query(&["egg"])).await.unwrap();
        let uris: Vec<String> = first.into_iter().map(|r| r.uri).collect();
        assert_eq!(uris, vec!["a", "b"]);

        // Same hits again on the next page
        assert!(session.load_more().await.unwrap().is_empty());
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.next_page(), 3);
    }

    #[tokio::test]
    async fn test_cancel_while_idle_does_not_affect_next_fetch() {
        let session = session(PagedNetwork::new(4), 2);

        session.cancel();
        assert_eq!(session.start_search(&query(&["egg"])).await.unwrap().len(), 2);

        session.cancel();
        assert_eq!(session.load_more().await.unwrap().len(), 2);
        assert_eq!(session.results().len(), 4);
    }
}
