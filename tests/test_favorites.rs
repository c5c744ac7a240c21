use std::sync::Arc;

use reciplease::{FavoriteEvent, FavoritesError, FavoritesStore, JsonFileBackend, Recipe};

fn recipe(uri: &str, label: &str) -> Recipe {
    Recipe {
        uri: uri.to_string(),
        label: label.to_string(),
        image: format!("https://img.example.com/{}.jpg", uri),
        ingredient_lines: vec!["2 eggs".to_string(), "1 | 2 cup milk".to_string()],
        calories: 250.0,
        url: String::new(),
    }
}

#[tokio::test]
async fn test_favorites_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.json");
    let r1 = recipe("r1", "Pancakes");
    let r2 = recipe("r2", "Omelette");

    {
        let store = FavoritesStore::open_file(&path).await.unwrap();
        store.save(&r1).await.unwrap();
        store.save(&r2).await.unwrap();
        store.save(&r1).await.unwrap();
    }

    let store = FavoritesStore::open_file(&path).await.unwrap();
    let all = store.fetch_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.contains(&r1));
    assert!(all.contains(&r2));
    assert!(store.is_saved(&r1).await);
}

#[tokio::test]
async fn test_delete_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.json");
    let r1 = recipe("r1", "Pancakes");

    let store = FavoritesStore::open_file(&path).await.unwrap();
    store.save(&r1).await.unwrap();
    store.delete(&r1).await.unwrap();
    drop(store);

    let reopened = FavoritesStore::open_file(&path).await.unwrap();
    assert!(!reopened.is_saved(&r1).await);
    assert!(reopened.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupted_document_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.json");
    std::fs::write(&path, "[{\"uri\": 42}]").unwrap();

    let err = FavoritesStore::open_file(&path).await.err().unwrap();
    assert!(matches!(err, FavoritesError::Corrupted(_)));
}

#[tokio::test]
async fn test_external_corruption_reported_on_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("favorites.json");
    let store = FavoritesStore::open(Arc::new(JsonFileBackend::new(&path)))
        .await
        .unwrap();
    let mut events = store.subscribe();

    store.save(&recipe("r1", "Pancakes")).await.unwrap();
    std::fs::write(&path, "garbage").unwrap();

    assert!(store.fetch_all().await.is_err());
    assert!(matches!(events.recv().await.unwrap(), FavoriteEvent::Saved(_)));
    assert!(matches!(events.recv().await.unwrap(), FavoriteEvent::Failed(_)));
}
