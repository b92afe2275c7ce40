use std::sync::Arc;

use storage::{KeyValueStore, MemoryStore, SqliteStore};

async fn exercise(store: Arc<dyn KeyValueStore>) {
    assert!(store.get("chat").await.expect("initial get").is_none());

    store.set("chat", b"first").await.expect("write first");
    store.set("other", b"x").await.expect("write other");
    store.set("chat", b"second").await.expect("rewrite");

    assert_eq!(
        store.get("chat").await.expect("get chat"),
        Some(b"second".to_vec())
    );
    assert_eq!(store.get("other").await.expect("get other"), Some(b"x".to_vec()));
}

#[tokio::test]
async fn sqlite_store_behaves_like_a_key_value_map() {
    let store = SqliteStore::new("sqlite::memory:").await.expect("db");
    exercise(Arc::new(store)).await;
}

#[tokio::test]
async fn memory_store_behaves_like_a_key_value_map() {
    exercise(Arc::new(MemoryStore::new())).await;
}
