mod backend;
mod store;

pub use backend::{FavoriteRecord, FavoritesBackend, JsonFileBackend, MemoryBackend};
pub use store::{FavoriteEvent, FavoritesStore};
