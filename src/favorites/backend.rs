use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::FavoritesError;
use crate::model::Recipe;

/// Flattened, persisted form of a favorite recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub uri: String,
    pub label: String,
    pub image: String,
    #[serde(alias = "ingredient_lines")]
    pub ingredient_lines: Vec<String>,
    pub calories: f64,
    pub url: String,
    /// Seconds since the Unix epoch at which the recipe was first saved
    #[serde(default, alias = "saved_at")]
    pub saved_at: u64,
}

impl FavoriteRecord {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        FavoriteRecord {
            uri: recipe.uri.clone(),
            label: recipe.label.clone(),
            image: recipe.image.clone(),
            ingredient_lines: recipe.ingredient_lines.clone(),
            calories: recipe.calories,
            url: recipe.url.clone(),
            saved_at: now_secs(),
        }
    }

    pub fn to_recipe(&self) -> Recipe {
        Recipe {
            uri: self.uri.clone(),
            label: self.label.clone(),
            image: self.image.clone(),
            ingredient_lines: self.ingredient_lines.clone(),
            calories: self.calories,
            url: self.url.clone(),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Storage engine behind [`super::FavoritesStore`].
///
/// Backends load and persist the whole collection; the store serializes
/// every call so implementations need no locking of their own.
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    async fn load(&self) -> Result<Vec<FavoriteRecord>, FavoritesError>;
    async fn persist(&self, records: &[FavoriteRecord]) -> Result<(), FavoritesError>;
}

/// JSON document on disk
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileBackend { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FavoritesBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<FavoriteRecord>, FavoritesError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No favorites at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&content)?)
    }

    async fn persist(&self, records: &[FavoriteRecord]) -> Result<(), FavoritesError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write to a sibling first so a crash never leaves a truncated document
        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            "Persisted {} favorites to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Volatile backend, mainly for tests
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<FavoriteRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Vec<FavoriteRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FavoritesBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<FavoriteRecord>, FavoritesError> {
        Ok(self.records().clone())
    }

    async fn persist(&self, records: &[FavoriteRecord]) -> Result<(), FavoritesError> {
        *self.records() = records.to_vec();
        Ok(())
    }
}
