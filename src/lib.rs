//! Ingredient-based recipe search.
//!
//! [`RecipeService`] queries the recipe API page by page and caches every
//! page it has seen, [`SearchSession`] aggregates pages for one ingredient
//! list, and [`FavoritesStore`] keeps favorite recipes on local storage.

pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod favorites;
pub mod model;
pub mod network;
pub mod service;
pub mod session;

// UniFFI bindings module
pub mod uniffi_bindings;

pub use cache::{CacheKey, CacheStats};
pub use crate::config::RecipleaseConfig;
pub use error::{DecodeError, DecodeErrorKind, FavoritesError, SearchError, TransportError};
pub use favorites::{FavoriteEvent, FavoritesBackend, FavoritesStore, JsonFileBackend, MemoryBackend};
pub use model::{PaginatedRecipes, Recipe};
pub use network::{NetworkService, ReqwestNetworkService};
pub use service::RecipeService;
pub use session::SearchSession;

/// Search one page using configuration from `config.toml` and the environment
///
/// # Example
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let page = reciplease::search_recipes(&["chicken".to_string(), "rice".to_string()], 1).await?;
/// println!("{} of {} recipes", page.recipes.len(), page.total_results);
/// # Ok(())
/// # }
/// ```
pub async fn search_recipes(
    ingredients: &[String],
    page: u32,
) -> Result<PaginatedRecipes, SearchError> {
    let config = RecipleaseConfig::load()?;
    RecipeService::from_config(&config)?
        .search(ingredients, page)
        .await
}
