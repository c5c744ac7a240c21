//! UniFFI bindings for reciplease
//!
//! This module provides FFI-compatible types and objects for use with iOS and Android.
//! Each object owns a tokio runtime and exposes blocking methods on top of the async API.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    DecodeErrorKind, FavoriteEvent, FavoritesError, FavoritesStore, PaginatedRecipes, Recipe,
    RecipeService, RecipleaseConfig, SearchError, SearchSession,
};

// Re-export UniFFI macro
#[cfg(feature = "uniffi")]
uniffi::setup_scaffolding!();

/// FFI-compatible recipe structure
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Record))]
pub struct FfiRecipe {
    /// Stable identifier
    pub uri: String,
    /// Recipe title
    pub label: String,
    /// Image URL
    pub image: String,
    /// Ingredient description lines, in order
    pub ingredient_lines: Vec<String>,
    pub calories: f64,
    /// Instructions URL (empty string if none)
    pub url: String,
}

impl From<Recipe> for FfiRecipe {
    fn from(recipe: Recipe) -> Self {
        FfiRecipe {
            uri: recipe.uri,
            label: recipe.label,
            image: recipe.image,
            ingredient_lines: recipe.ingredient_lines,
            calories: recipe.calories,
            url: recipe.url,
        }
    }
}

impl From<FfiRecipe> for Recipe {
    fn from(ffi: FfiRecipe) -> Self {
        Recipe {
            uri: ffi.uri,
            label: ffi.label,
            image: ffi.image,
            ingredient_lines: ffi.ingredient_lines,
            calories: ffi.calories,
            url: ffi.url,
        }
    }
}

/// FFI-compatible page of results
#[derive(Debug, Clone)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Record))]
pub struct FfiRecipePage {
    pub recipes: Vec<FfiRecipe>,
    pub next_page: Option<u32>,
    pub total_results: u64,
}

impl From<PaginatedRecipes> for FfiRecipePage {
    fn from(page: PaginatedRecipes) -> Self {
        FfiRecipePage {
            recipes: page.recipes.into_iter().map(Into::into).collect(),
            next_page: page.next_page,
            total_results: page.total_results,
        }
    }
}

/// Configuration passed from the host app
#[derive(Debug, Clone)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Record))]
pub struct FfiSearchConfig {
    pub app_id: String,
    pub app_key: String,
    /// Optional endpoint override
    pub base_url: Option<String>,
    /// Optional timeout in seconds (uses default if not specified)
    pub timeout_seconds: Option<u64>,
    /// Optional bound on cached pages
    pub cache_capacity: Option<u64>,
}

impl From<FfiSearchConfig> for RecipleaseConfig {
    fn from(ffi: FfiSearchConfig) -> Self {
        let mut config = RecipleaseConfig::new(ffi.app_id, ffi.app_key);
        if let Some(base_url) = ffi.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = ffi.timeout_seconds {
            config.timeout = timeout;
        }
        config.cache_capacity = ffi.cache_capacity.map(|c| c as usize);
        config
    }
}

/// FFI-compatible search error
#[derive(Debug, Clone)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Error))]
pub enum FfiSearchError {
    InvalidRequest { message: String },
    TransportFailure { message: String },
    /// `field` names the offending key, e.g. "calories"
    DecodeFailure { field: String, message: String },
    Busy { message: String },
    Cancelled { message: String },
    ConfigError { message: String },
    RuntimeError { message: String },
}

impl fmt::Display for FfiSearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfiSearchError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            FfiSearchError::TransportFailure { message } => {
                write!(f, "Network error: {}", message)
            }
            FfiSearchError::DecodeFailure { message, .. } => {
                write!(f, "Decode error: {}", message)
            }
            FfiSearchError::Busy { message } => write!(f, "Busy: {}", message),
            FfiSearchError::Cancelled { message } => write!(f, "Cancelled: {}", message),
            FfiSearchError::ConfigError { message } => write!(f, "Config error: {}", message),
            FfiSearchError::RuntimeError { message } => write!(f, "Runtime error: {}", message),
        }
    }
}

impl std::error::Error for FfiSearchError {}

impl From<SearchError> for FfiSearchError {
    fn from(err: SearchError) -> Self {
        let message = err.to_string();
        match err {
            SearchError::InvalidRequest(_) => FfiSearchError::InvalidRequest { message },
            SearchError::TransportFailure(_) => FfiSearchError::TransportFailure { message },
            SearchError::DecodeFailure(e) => FfiSearchError::DecodeFailure {
                field: match e.kind {
                    DecodeErrorKind::DataCorrupted(_) => String::new(),
                    _ => e.field().to_string(),
                },
                message,
            },
            SearchError::Busy => FfiSearchError::Busy { message },
            SearchError::Cancelled => FfiSearchError::Cancelled { message },
            SearchError::Config(_) => FfiSearchError::ConfigError { message },
        }
    }
}

/// FFI-compatible favorites error
#[derive(Debug, Clone)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Error))]
pub enum FfiFavoritesError {
    PersistenceFailure { message: String },
    Corrupted { message: String },
    InvalidRecipe { message: String },
    RuntimeError { message: String },
}

impl fmt::Display for FfiFavoritesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfiFavoritesError::PersistenceFailure { message } => {
                write!(f, "Persistence error: {}", message)
            }
            FfiFavoritesError::Corrupted { message } => write!(f, "Corrupted: {}", message),
            FfiFavoritesError::InvalidRecipe { message } => {
                write!(f, "Invalid recipe: {}", message)
            }
            FfiFavoritesError::RuntimeError { message } => {
                write!(f, "Runtime error: {}", message)
            }
        }
    }
}

impl std::error::Error for FfiFavoritesError {}

impl From<FavoritesError> for FfiFavoritesError {
    fn from(err: FavoritesError) -> Self {
        match err {
            FavoritesError::Persistence(e) => FfiFavoritesError::PersistenceFailure {
                message: e.to_string(),
            },
            FavoritesError::Corrupted(e) => FfiFavoritesError::Corrupted {
                message: e.to_string(),
            },
            FavoritesError::InvalidRecipe(message) => FfiFavoritesError::InvalidRecipe { message },
        }
    }
}

/// Change notification delivered to [`FfiFavoritesObserver`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "uniffi", derive(uniffi::Enum))]
pub enum FfiFavoriteEvent {
    Saved { recipe: FfiRecipe },
    Deleted { recipe: FfiRecipe },
    Fetched { recipes: Vec<FfiRecipe> },
    ContextSaved,
    Failed { message: String },
}

impl From<FavoriteEvent> for FfiFavoriteEvent {
    fn from(event: FavoriteEvent) -> Self {
        match event {
            FavoriteEvent::Saved(recipe) => FfiFavoriteEvent::Saved {
                recipe: recipe.into(),
            },
            FavoriteEvent::Deleted(recipe) => FfiFavoriteEvent::Deleted {
                recipe: recipe.into(),
            },
            FavoriteEvent::Fetched(recipes) => FfiFavoriteEvent::Fetched {
                recipes: recipes.into_iter().map(Into::into).collect(),
            },
            FavoriteEvent::ContextSaved => FfiFavoriteEvent::ContextSaved,
            FavoriteEvent::Failed(message) => FfiFavoriteEvent::Failed { message },
        }
    }
}

/// Implemented by the host app to follow favorites changes.
///
/// Events are delivered one at a time, in order, from a single background task.
#[cfg_attr(feature = "uniffi", uniffi::export(callback_interface))]
pub trait FfiFavoritesObserver: Send + Sync {
    fn on_event(&self, event: FfiFavoriteEvent);
}

/// Create a new tokio runtime for FFI calls
fn create_runtime() -> Result<Runtime, std::io::Error> {
    tokio::runtime::Runtime::new()
}

/// Search client plus the pagination state of the current search
#[cfg_attr(feature = "uniffi", derive(uniffi::Object))]
pub struct FfiRecipeSearch {
    runtime: Runtime,
    service: Arc<RecipeService>,
    session: SearchSession,
}

#[cfg_attr(feature = "uniffi", uniffi::export)]
impl FfiRecipeSearch {
    #[cfg_attr(feature = "uniffi", uniffi::constructor)]
    pub fn new(config: FfiSearchConfig) -> Result<Arc<Self>, FfiSearchError> {
        let runtime = create_runtime().map_err(|e| FfiSearchError::RuntimeError {
            message: format!("Failed to create async runtime: {}", e),
        })?;
        let config: RecipleaseConfig = config.into();
        let service = Arc::new(RecipeService::from_config(&config)?);

        Ok(Arc::new(FfiRecipeSearch {
            runtime,
            session: SearchSession::new(service.clone()),
            service,
        }))
    }

    /// Fetch a single page directly (cached)
    pub fn search_page(
        &self,
        ingredients: Vec<String>,
        page: u32,
    ) -> Result<FfiRecipePage, FfiSearchError> {
        let page = self
            .runtime
            .block_on(self.service.search(&ingredients, page))?;
        Ok(page.into())
    }

    /// Start a new search; returns the first page of recipes
    pub fn start_search(&self, ingredients: Vec<String>) -> Result<Vec<FfiRecipe>, FfiSearchError> {
        let recipes = self
            .runtime
            .block_on(self.session.start_search(&ingredients))?;
        Ok(recipes.into_iter().map(Into::into).collect())
    }

    /// Fetch the next page of the current search; empty when there is nothing more
    pub fn load_more(&self) -> Result<Vec<FfiRecipe>, FfiSearchError> {
        let recipes = self.runtime.block_on(self.session.load_more())?;
        Ok(recipes.into_iter().map(Into::into).collect())
    }

    pub fn cancel(&self) {
        self.session.cancel();
    }

    pub fn results(&self) -> Vec<FfiRecipe> {
        self.session.results().into_iter().map(Into::into).collect()
    }

    pub fn has_more(&self) -> bool {
        self.session.has_more()
    }

    pub fn total_results(&self) -> u64 {
        self.session.total_results()
    }

    pub fn clear_cache(&self) {
        self.service.clear_cache();
    }
}

/// Favorites persisted in a JSON document
#[cfg_attr(feature = "uniffi", derive(uniffi::Object))]
pub struct FfiFavoritesStore {
    runtime: Runtime,
    store: FavoritesStore,
}

#[cfg_attr(feature = "uniffi", uniffi::export)]
impl FfiFavoritesStore {
    /// Open the store at `path`. Hosts should treat a failure here as fatal.
    #[cfg_attr(feature = "uniffi", uniffi::constructor)]
    pub fn open(path: String) -> Result<Arc<Self>, FfiFavoritesError> {
        let runtime = create_runtime().map_err(|e| FfiFavoritesError::RuntimeError {
            message: format!("Failed to create async runtime: {}", e),
        })?;
        let store = runtime.block_on(FavoritesStore::open_file(PathBuf::from(path)))?;
        Ok(Arc::new(FfiFavoritesStore { runtime, store }))
    }

    pub fn save(&self, recipe: FfiRecipe) -> Result<(), FfiFavoritesError> {
        let recipe: Recipe = recipe.into();
        self.runtime
            .block_on(self.store.save(&recipe))
            .map_err(Into::into)
    }

    pub fn delete(&self, recipe: FfiRecipe) -> Result<(), FfiFavoritesError> {
        let recipe: Recipe = recipe.into();
        self.runtime
            .block_on(self.store.delete(&recipe))
            .map_err(Into::into)
    }

    pub fn is_saved(&self, recipe: FfiRecipe) -> bool {
        let recipe: Recipe = recipe.into();
        self.runtime.block_on(self.store.is_saved(&recipe))
    }

    pub fn fetch_all(&self) -> Result<Vec<FfiRecipe>, FfiFavoritesError> {
        let recipes = self.runtime.block_on(self.store.fetch_all())?;
        Ok(recipes.into_iter().map(Into::into).collect())
    }

    /// Forward every subsequent change to `observer`
    pub fn add_observer(&self, observer: Box<dyn FfiFavoritesObserver>) {
        let mut events = self.store.subscribe();
        self.runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => observer.on_event(event.into()),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Favorites observer lagged, {} events dropped", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Get the library version
#[cfg_attr(feature = "uniffi", uniffi::export)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
