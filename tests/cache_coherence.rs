mod common;

use std::sync::Arc;
use std::time::Duration;

use layered_store::prelude::*;

async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_write_on_one_node_is_seen_by_the_other() {
    let (_dir, db) = common::sqlite_db().await;
    let bus = LocalBus::new();

    let node_a = Store::builder()
        .primary(db.clone())
        .cache_settings(CacheSettings::default())
        .cluster(Arc::new(bus.join("a")))
        .build()
        .unwrap();
    let node_b = Store::builder()
        .primary(db)
        .cache_settings(CacheSettings::default())
        .cluster(Arc::new(bus.join("b")))
        .build()
        .unwrap();
    let cache_a = node_a.cache().unwrap().unwrap();
    let cache_b = node_b.cache().unwrap().unwrap();

    let saved = must(node_a.product().save(Product::new("kettle", 30.0))).await;

    // Warm both caches.
    assert_eq!(node_a.product().get(&saved.id).recv().await.unwrap().price, 30.0);
    assert_eq!(node_b.product().get(&saved.id).recv().await.unwrap().price, 30.0);
    assert!(cache_a.contains(CacheKind::Products, &saved.id));
    assert!(cache_b.contains(CacheKind::Products, &saved.id));

    let mut changed = saved.clone();
    changed.price = 35.0;
    node_a.product().update(changed).recv().await.unwrap();
    assert!(!cache_a.contains(CacheKind::Products, &saved.id));

    eventually("node b to drop the product", || !cache_b.contains(CacheKind::Products, &saved.id)).await;
    assert_eq!(node_b.product().get(&saved.id).recv().await.unwrap().price, 35.0);

    node_b.product().delete(&saved.id).recv().await.unwrap();
    eventually("node a to drop the product", || !cache_a.contains(CacheKind::Products, &saved.id)).await;
    let err = node_a.product().get(&saved.id).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tree_changes_purge_categories_everywhere() {
    let (_dir, db) = common::sqlite_db().await;
    let bus = LocalBus::new();

    let node_a = Store::builder()
        .primary(db.clone())
        .cache_settings(CacheSettings::default())
        .cluster(Arc::new(bus.join("a")))
        .build()
        .unwrap();
    let node_b = Store::builder()
        .primary(db)
        .cache_settings(CacheSettings::default())
        .cluster(Arc::new(bus.join("b")))
        .build()
        .unwrap();
    let cache_b = node_b.cache().unwrap().unwrap();

    let root = must(node_a.category().create(None, "root")).await;
    let child = must(node_a.category().create(Some(&root.id), "child")).await;

    // The root's interval grew with the insert, so node b must not have a stale copy.
    let seen = node_b.category().get(&root.id).recv().await.unwrap();
    assert_eq!(seen.rgt, 4);
    assert!(cache_b.contains(CacheKind::Categories, &root.id));

    must(node_a.category().create(Some(&child.id), "grandchild")).await;
    eventually("node b to purge categories", || {
        !cache_b.contains(CacheKind::Categories, &root.id)
    })
    .await;
    assert_eq!(node_b.category().get(&root.id).recv().await.unwrap().rgt, 6);
}

#[tokio::test]
async fn hints_bypass_the_cache() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder()
        .primary(db)
        .cache_settings(CacheSettings::default())
        .build()
        .unwrap();
    let cache = store.cache().unwrap().unwrap();

    let saved = must(store.product().save(Product::new("mug", 4.0))).await;
    store
        .product()
        .get_with(&saved.id, Hints::default().no_cache())
        .recv()
        .await
        .unwrap();
    assert!(!cache.contains(CacheKind::Products, &saved.id));

    store.product().get(&saved.id).recv().await.unwrap();
    assert!(cache.contains(CacheKind::Products, &saved.id));

    store.purge_cache(CacheKind::Products).await.unwrap();
    assert!(!cache.contains(CacheKind::Products, &saved.id));
}
