use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::Url;

use crate::cache::{normalize_ingredients, CacheKey, CacheStats, ResponseCache};
use crate::config::{RecipleaseConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};
use crate::decode::decode_response;
use crate::error::SearchError;
use crate::model::PaginatedRecipes;
use crate::network::{NetworkService, ReqwestNetworkService};

/// Client for the ingredient search API.
///
/// Responses are cached per (ingredients, page); a repeated request for the
/// same key is answered from memory without touching the network. Errors
/// are returned as-is and never retried here.
pub struct RecipeService {
    app_id: String,
    app_key: String,
    base_url: String,
    page_size: u32,
    network: Arc<dyn NetworkService>,
    cache: ResponseCache,
}

impl RecipeService {
    pub fn new(
        app_id: impl Into<String>,
        app_key: impl Into<String>,
        network: Arc<dyn NetworkService>,
    ) -> Self {
        RecipeService {
            app_id: app_id.into(),
            app_key: app_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            network,
            cache: ResponseCache::unbounded(),
        }
    }

    /// Create a service with the reqwest transport from validated configuration
    pub fn from_config(config: &RecipleaseConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let network = ReqwestNetworkService::new(Some(config.timeout()))
            .map_err(SearchError::TransportFailure)?;
        Ok(Self::with_network(config, Arc::new(network)))
    }

    pub fn with_network(config: &RecipleaseConfig, network: Arc<dyn NetworkService>) -> Self {
        let cache = match config.cache_capacity {
            Some(capacity) => ResponseCache::with_capacity(capacity),
            None => ResponseCache::unbounded(),
        };

        RecipeService {
            app_id: config.app_id.clone(),
            app_key: config.app_key.clone(),
            base_url: config.base_url.clone(),
            page_size: config.page_size.max(1),
            network,
            cache,
        }
    }

    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Results per page; zero is raised to one
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ResponseCache::with_capacity(capacity);
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Search recipes containing `ingredients`, returning page `page` (1-based)
    pub async fn search(
        &self,
        ingredients: &[String],
        page: u32,
    ) -> Result<PaginatedRecipes, SearchError> {
        if page == 0 {
            return Err(SearchError::InvalidRequest(
                "page numbers start at 1".to_string(),
            ));
        }

        let key = CacheKey::new(ingredients, page);
        let ingredients = normalize_ingredients(ingredients);
        let url = self.build_url(&ingredients, page)?;

        self.cache
            .get_or_fetch(key, self.fetch_page(&ingredients, page, url))
            .await
    }

    async fn fetch_page(
        &self,
        ingredients: &[String],
        page: u32,
        url: Url,
    ) -> Result<PaginatedRecipes, SearchError> {
        info!(
            "Searching recipes for [{}] (page {})",
            ingredients.join(", "),
            page
        );
        let body = self
            .network
            .request(&url)
            .await
            .map_err(SearchError::TransportFailure)?;

        let response = decode_response(&body).map_err(|e| {
            warn!("Failed to decode search response: {}", e);
            e
        })?;

        let (from, _) = self.offsets(page);
        let seen = from.saturating_add(response.recipes.len() as u64);
        let next_page = if seen < response.count {
            page.checked_add(1)
        } else {
            None
        };
        debug!(
            "Fetched {} of {} recipes, next page: {:?}",
            seen, response.count, next_page
        );

        Ok(PaginatedRecipes {
            recipes: response.recipes,
            next_page,
            total_results: response.count,
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// `from`/`to` bounds for a 1-based page
    fn offsets(&self, page: u32) -> (u64, u64) {
        let size = self.page_size as u64;
        ((page as u64 - 1) * size, page as u64 * size)
    }

    fn build_url(&self, ingredients: &[String], page: u32) -> Result<Url, SearchError> {
        let (from, to) = self.offsets(page);

        Url::parse_with_params(
            &self.base_url,
            &[
                ("type", "public".to_string()),
                ("q", ingredients.join(",")),
                ("app_id", self.app_id.clone()),
                ("app_key", self.app_key.clone()),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ],
        )
        .map_err(|e| SearchError::InvalidRequest(format!("{}: {}", self.base_url, e)))
    }
}
