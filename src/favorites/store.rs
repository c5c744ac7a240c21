use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::{broadcast, Mutex};

use super::backend::{FavoriteRecord, FavoritesBackend, JsonFileBackend};
use crate::error::FavoritesError;
use crate::model::Recipe;

const EVENT_CAPACITY: usize = 64;

/// Change notifications published by [`FavoritesStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum FavoriteEvent {
    Saved(Recipe),
    Deleted(Recipe),
    /// Full list after a [`FavoritesStore::fetch_all`]
    Fetched(Vec<Recipe>),
    /// Current state was written out by [`FavoritesStore::flush`]
    ContextSaved,
    /// A persistence operation failed; the in-memory view was rolled back
    Failed(String),
}

/// Locally persisted favorite recipes, keyed by recipe identifier.
///
/// All access to the backend goes through one async mutex, and events are
/// sent while it is held, so every subscriber sees changes in the order
/// they were applied.
pub struct FavoritesStore {
    backend: Arc<dyn FavoritesBackend>,
    records: Mutex<Vec<FavoriteRecord>>,
    events: broadcast::Sender<FavoriteEvent>,
}

impl FavoritesStore {
    /// Open the store, loading whatever the backend already holds
    pub async fn open(backend: Arc<dyn FavoritesBackend>) -> Result<Self, FavoritesError> {
        let records = backend.load().await?;
        info!("Loaded {} favorite recipes", records.len());

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(FavoritesStore {
            backend,
            records: Mutex::new(records),
            events,
        })
    }

    /// Open a store backed by a JSON document at `path`
    pub async fn open_file(path: impl Into<std::path::PathBuf>) -> Result<Self, FavoritesError> {
        Self::open(Arc::new(JsonFileBackend::new(path))).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FavoriteEvent> {
        self.events.subscribe()
    }

    /// Insert or overwrite the favorite with this recipe's identifier
    pub async fn save(&self, recipe: &Recipe) -> Result<(), FavoritesError> {
        if recipe.uri.trim().is_empty() {
            return Err(FavoritesError::InvalidRecipe(
                "recipe identifier must not be empty".to_string(),
            ));
        }

        let mut records = self.records.lock().await;
        let mut updated = records.clone();
        let mut record = FavoriteRecord::from_recipe(recipe);
        match updated.iter_mut().find(|r| r.uri == recipe.uri) {
            Some(existing) => {
                record.saved_at = existing.saved_at;
                *existing = record;
            }
            None => updated.push(record),
        }

        self.commit(&mut records, updated).await?;
        debug!("Recipe saved: {}", recipe.label);
        self.notify(FavoriteEvent::Saved(recipe.clone()));
        Ok(())
    }

    /// Remove the favorite with this recipe's identifier; absent is a no-op
    pub async fn delete(&self, recipe: &Recipe) -> Result<(), FavoritesError> {
        let mut records = self.records.lock().await;
        if !records.iter().any(|r| r.uri == recipe.uri) {
            return Ok(());
        }

        let updated: Vec<FavoriteRecord> = records
            .iter()
            .filter(|r| r.uri != recipe.uri)
            .cloned()
            .collect();

        self.commit(&mut records, updated).await?;
        debug!("Recipe deleted: {}", recipe.label);
        self.notify(FavoriteEvent::Deleted(recipe.clone()));
        Ok(())
    }

    pub async fn is_saved(&self, recipe: &Recipe) -> bool {
        self.records
            .lock()
            .await
            .iter()
            .any(|r| r.uri == recipe.uri)
    }

    pub async fn get(&self, uri: &str) -> Option<Recipe> {
        self.records
            .lock()
            .await
            .iter()
            .find(|r| r.uri == uri)
            .map(FavoriteRecord::to_recipe)
    }

    /// Reload every favorite from the backend, in insertion order
    pub async fn fetch_all(&self) -> Result<Vec<Recipe>, FavoritesError> {
        let mut records = self.records.lock().await;
        let loaded = match self.backend.load().await {
            Ok(loaded) => loaded,
            Err(e) => return Err(self.fail(e)),
        };
        *records = loaded;

        let recipes: Vec<Recipe> = records.iter().map(FavoriteRecord::to_recipe).collect();
        self.notify(FavoriteEvent::Fetched(recipes.clone()));
        Ok(recipes)
    }

    /// Write the current in-memory state back to the backend
    pub async fn flush(&self) -> Result<(), FavoritesError> {
        let records = self.records.lock().await;
        if let Err(e) = self.backend.persist(&records).await {
            return Err(self.fail(e));
        }
        self.notify(FavoriteEvent::ContextSaved);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Persist `updated`, replacing `current` only when the write succeeded
    async fn commit(
        &self,
        current: &mut Vec<FavoriteRecord>,
        updated: Vec<FavoriteRecord>,
    ) -> Result<(), FavoritesError> {
        match self.backend.persist(&updated).await {
            Ok(()) => {
                *current = updated;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&self, err: FavoritesError) -> FavoritesError {
        error!("Favorites persistence failed: {}", err);
        self.notify(FavoriteEvent::Failed(err.to_string()));
        err
    }

    fn notify(&self, event: FavoriteEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
