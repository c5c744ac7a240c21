//! In-memory response cache for search pages.
//!
//! Entries never expire. When a capacity is configured the least recently
//! used key is evicted once the cache is full; without one the cache grows
//! for the lifetime of the owning [`crate::RecipeService`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;

use crate::error::SearchError;
use crate::model::PaginatedRecipes;

/// Composite key of normalized ingredients and page number
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    ingredients: String,
    page: u32,
}

impl CacheKey {
    pub fn new(ingredients: &[String], page: u32) -> Self {
        CacheKey {
            ingredients: normalize_ingredients(ingredients).join(",").to_lowercase(),
            page,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Trim every ingredient and drop the blank ones
pub fn normalize_ingredients(ingredients: &[String]) -> Vec<String> {
    ingredients
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
}

/// Page cache shared by every caller of one service.
///
/// Concurrent misses on the same key are coalesced into a single fetch;
/// different keys never wait on each other.
pub struct ResponseCache {
    /// `None` when caching is disabled
    pages: Option<Cache<CacheKey, PaginatedRecipes>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl ResponseCache {
    pub fn unbounded() -> Self {
        Self::build(None)
    }

    /// A capacity of zero disables caching entirely
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            return ResponseCache {
                pages: None,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: Arc::new(AtomicU64::new(0)),
            };
        }
        Self::build(Some(capacity as u64))
    }

    fn build(capacity: Option<u64>) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = evictions.clone();

        let mut builder = Cache::<CacheKey, PaginatedRecipes>::builder()
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(
                move |key: Arc<CacheKey>, _page: PaginatedRecipes, cause: RemovalCause| {
                    if matches!(cause, RemovalCause::Size) {
                        counter.fetch_add(1, Ordering::Relaxed);
                        debug!("Evicted cached page {} for '{}'", key.page, key.ingredients);
                    }
                },
            );
        if let Some(capacity) = capacity {
            builder = builder.max_capacity(capacity);
        }

        ResponseCache {
            pages: Some(builder.build()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<PaginatedRecipes> {
        let cached = match &self.pages {
            Some(pages) => pages.get(key).await,
            None => None,
        };

        match cached {
            Some(page) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for page {}", key.page);
                Some(page)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Return the cached page for `key`, or run `fetch` and cache its result.
    ///
    /// Failed fetches are not stored. Callers that arrive while another
    /// fetch for the same key is running wait for it and share its outcome.
    pub async fn get_or_fetch<F>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> Result<PaginatedRecipes, SearchError>
    where
        F: Future<Output = Result<PaginatedRecipes, SearchError>>,
    {
        if let Some(page) = self.get(&key).await {
            return Ok(page);
        }

        match &self.pages {
            Some(pages) => pages.try_get_with(key, fetch).await.map_err(unshare),
            None => fetch.await,
        }
    }

    pub async fn insert(&self, key: CacheKey, value: PaginatedRecipes) {
        if let Some(pages) = &self.pages {
            pages.insert(key, value).await;
        }
    }

    pub fn clear(&self) {
        if let Some(pages) = &self.pages {
            pages.invalidate_all();
        }
    }

    /// Apply pending insertions, evictions and invalidations
    pub async fn run_pending_tasks(&self) {
        if let Some(pages) = &self.pages {
            pages.run_pending_tasks().await;
        }
    }

    pub async fn len(&self) -> u64 {
        self.run_pending_tasks().await;
        self.pages.as_ref().map_or(0, |pages| pages.entry_count())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// A failed fetch hands the same error to every waiter; the last owner takes
/// it back, the others get an equivalent copy.
fn unshare(err: Arc<SearchError>) -> SearchError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| match &*shared {
        SearchError::InvalidRequest(message) => SearchError::InvalidRequest(message.clone()),
        SearchError::TransportFailure(cause) => {
            SearchError::TransportFailure(cause.to_string().into())
        }
        SearchError::DecodeFailure(e) => SearchError::DecodeFailure(e.clone()),
        SearchError::Busy => SearchError::Busy,
        SearchError::Cancelled => SearchError::Cancelled,
        SearchError::Config(e) => SearchError::Config(config::ConfigError::Message(e.to_string())),
    })
}
