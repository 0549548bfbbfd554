mod common;

use std::collections::HashMap;
use std::sync::Arc;

use layered_store::entity::new_id;
use layered_store::prelude::*;

struct Timeline {
    store:   Arc<Store>,
    channel: String,
    user:    String,
    /// Name to id.
    ids:     HashMap<String, String>,
}

impl Timeline {
    // p0..p{n-1}, created one second apart in that order.
    async fn new(store: Arc<Store>, n: usize) -> Self {
        let mut tl = Self {
            store,
            channel: new_id(),
            user: new_id(),
            ids: HashMap::new(),
        };
        for i in 0..n {
            let name = format!("p{i}");
            let mut msg = Message::new(&tl.channel, &tl.user, &name);
            msg.create_at = 1_000_000 + i as i64 * 1000;
            let saved = must(tl.store.message().save(msg)).await;
            tl.ids.insert(name, saved.id);
        }
        tl
    }

    fn id(&self, name: &str) -> String {
        self.ids[name].clone()
    }

    async fn names(&self, cursor: Cursor) -> Vec<String> {
        let list = self.store.message().list(&self.channel, cursor).recv().await.unwrap();
        assert!(list.is_consistent());
        list.into_ordered().into_iter().map(|m| m.message).collect()
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn before_is_reversed_into_chronological_order() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 13).await;

    assert_eq!(tl.names(Cursor::before(tl.id("p10"), 0, 3)).await, names(&["p7", "p8", "p9"]));
    assert_eq!(tl.names(Cursor::before(tl.id("p10"), 1, 3)).await, names(&["p4", "p5", "p6"]));
    assert_eq!(tl.names(Cursor::after(tl.id("p6"), 0, 3)).await, names(&["p7", "p8", "p9"]));
    assert_eq!(tl.names(Cursor::before(tl.id("p1"), 0, 3)).await, names(&["p0"]));
    assert!(tl.names(Cursor::after(tl.id("p12"), 0, 3)).await.is_empty());
}

#[tokio::test]
async fn before_and_after_walk_the_same_window() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 13).await;

    for (anchor, k) in [("p0", 4usize), ("p3", 4), ("p5", 2), ("p2", 7)] {
        let forward = tl.names(Cursor::after(tl.id(anchor), 0, k as u64)).await;
        assert_eq!(forward.len(), k);
        let last: usize = forward[k - 1][1..].parse().unwrap();
        let next = format!("p{}", last + 1);
        let backward = tl.names(Cursor::before(tl.id(&next), 0, k as u64)).await;
        assert_eq!(backward, forward, "after {anchor} vs before {next}");
    }
}

#[tokio::test]
async fn pages_show_most_recently_updated_first() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 8).await;

    assert_eq!(tl.names(Cursor::page(0, 3)).await, names(&["p7", "p6", "p5"]));
    assert_eq!(tl.names(Cursor::page(2, 3)).await, names(&["p1", "p0"]));
    assert!(tl.names(Cursor::page(3, 3)).await.is_empty());

    // Another channel does not leak in.
    let other = Timeline::new(tl.store.clone(), 2).await;
    assert_eq!(other.names(Cursor::page(0, 10)).await, names(&["p1", "p0"]));
}

#[tokio::test]
async fn deleted_rows_are_skipped_in_every_mode() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 13).await;
    let p8 = tl.id("p8");

    tl.store.message().delete(&p8).recv().await.unwrap();

    assert_eq!(tl.names(Cursor::before(tl.id("p10"), 0, 3)).await, names(&["p6", "p7", "p9"]));
    assert_eq!(tl.names(Cursor::after(tl.id("p6"), 0, 3)).await, names(&["p7", "p9", "p10"]));
    assert!(!tl.names(Cursor::page(0, 20)).await.contains(&"p8".to_string()));
    assert!(tl.names(Cursor::since(0)).await.iter().all(|n| n != "p8"));

    // A deleted row still works as an anchor.
    assert_eq!(tl.names(Cursor::before(&p8, 0, 3)).await, names(&["p5", "p6", "p7"]));

    let err = tl.store.message().get(&p8).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let deleted = tl.store.message().get_with(&p8, Hints::default().include_deleted()).recv().await.unwrap();
    assert!(deleted.is_deleted());

    let err = tl.store.message().delete(&p8).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn unknown_anchor_yields_nothing() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 3).await;

    assert!(tl.names(Cursor::before(new_id(), 0, 10)).await.is_empty());
    assert!(tl.names(Cursor::after(new_id(), 0, 10)).await.is_empty());
}

#[tokio::test]
async fn anchor_from_another_scope_yields_nothing() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 3).await;
    let other = Timeline::new(tl.store.clone(), 3).await;

    assert!(tl.names(Cursor::after(other.id("p0"), 0, 10)).await.is_empty());
    assert!(tl.names(Cursor::before(other.id("p2"), 0, 10)).await.is_empty());
    assert_eq!(tl.names(Cursor::after(tl.id("p0"), 0, 10)).await, names(&["p1", "p2"]));

    let product = must(tl.store.product().save(Product::new("widget", 1.0))).await;
    let bobs = must(tl.store.order().save(Order::new("bob", &product.id, 1))).await;
    must(tl.store.order().save(Order::new("alice", &product.id, 1))).await;
    let list = tl
        .store
        .order()
        .list_for_customer("alice", Cursor::before(&bobs.id, 0, 10))
        .recv()
        .await
        .unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
async fn oversized_pages_are_refused() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).max_per_page(50).build().unwrap();

    let err = store.product().list(Cursor::page(0, 51)).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadCursor);
    let err = store.product().list(Cursor::page(0, 0)).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadCursor);
    assert!(store.product().list(Cursor::page(0, 50)).recv().await.unwrap().is_empty());
}

#[tokio::test]
async fn page_far_past_the_end_is_refused() {
    let (_dir, db) = common::sqlite_db().await;
    let tl = Timeline::new(Store::builder().primary(db).build().unwrap(), 3).await;

    let err = tl.store.product().list(Cursor::page(u64::MAX, 60)).recv().await.unwrap_err();
    assert_eq!(err.code(), "store.cursor.page.invalid");
    let err = tl
        .store
        .message()
        .list(&tl.channel, Cursor::before(tl.id("p2"), u64::MAX / 2, 60))
        .recv()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadCursor);

    // Large but representable offsets are plain empty pages.
    assert!(tl.names(Cursor::page(1 << 40, 60)).await.is_empty());
}

#[tokio::test]
async fn since_brings_thread_roots_along() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).build().unwrap();
    let channel = new_id();
    let user = new_id();

    let mut root = Message::new(&channel, &user, "root");
    root.create_at = 1_000;
    let root = must(store.message().save(root)).await;

    let mut reply = Message::new(&channel, &user, "reply").reply_to(&root.id);
    reply.create_at = 5_000;
    let reply = must(store.message().save(reply)).await;

    let list = store.message().list(&channel, Cursor::since(2_000)).recv().await.unwrap();
    assert_eq!(list.order(), &[reply.id.clone()]);
    assert_eq!(list.get(&root.id), Some(&root));
    assert_eq!(list.len(), 1);
    assert!(list.is_consistent());

    let list = store.message().list(&channel, Cursor::since(0)).recv().await.unwrap();
    assert_eq!(list.order(), &[root.id.clone(), reply.id.clone()]);
}

#[tokio::test]
async fn orders_scope_by_customer() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).build().unwrap();
    let product = must(store.product().save(Product::new("widget", 9.5))).await;

    for customer in ["alice", "bob", "alice"] {
        must(store.order().save(Order::new(customer, &product.id, 1))).await;
    }

    let all = store.order().list(Cursor::page(0, 10)).recv().await.unwrap();
    assert_eq!(all.len(), 3);
    let alice = store.order().list_for_customer("alice", Cursor::page(0, 10)).recv().await.unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.iter().all(|o| o.customer_id == "alice"));
}

#[tokio::test]
async fn crud_round_trip() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).build().unwrap();

    let saved = must(store.product().save(Product::new("lamp", 20.0))).await;
    assert!(is_valid(&saved.id));
    assert_eq!(saved.create_at, saved.update_at);

    let err = store.product().save(saved.clone()).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = store.product().save(Product::new("", 1.0)).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut changed = saved.clone();
    changed.price = 25.0;
    let updated = store.product().update(changed).recv().await.unwrap();
    assert_eq!(updated.create_at, saved.create_at);
    assert!(updated.update_at >= saved.update_at);
    assert_eq!(store.product().get(&saved.id).recv().await.unwrap().price, 25.0);

    let mut ghost = Product::new("ghost", 1.0);
    ghost.id = new_id();
    let err = store.product().update(ghost).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_neither_deletes_nor_revives() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).build().unwrap();
    let saved = must(store.product().save(Product::new("lamp", 20.0))).await;

    let mut marked = saved.clone();
    marked.delete_at = 7;
    let updated = store.product().update(marked).recv().await.unwrap();
    assert_eq!(updated.delete_at, 0);
    assert!(!store.product().get(&saved.id).recv().await.unwrap().is_deleted());

    store.product().delete(&saved.id).recv().await.unwrap();
    let mut late = saved.clone();
    late.price = 30.0;
    let err = store.product().update(late).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let row = store
        .product()
        .get_with(&saved.id, Hints::default().include_deleted())
        .recv()
        .await
        .unwrap();
    assert!(row.is_deleted());
    assert_eq!(row.price, 20.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn updates_racing_deletes_never_revive_rows() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db).build().unwrap();

    for i in 0..25 {
        let saved = must(store.product().save(Product::new(format!("item {i}"), 1.0))).await;
        let mut changed = saved.clone();
        changed.price = 2.0;

        let update = store.product().update(changed);
        let delete = store.product().delete(&saved.id);
        let (updated, deleted) = tokio::join!(update.recv(), delete.recv());

        deleted.unwrap();
        if let Err(err) = updated {
            assert_eq!(err.kind(), ErrorKind::NotFound, "item {i}");
        }
        let err = store.product().get(&saved.id).recv().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "item {i} came back");
    }
}

fn is_valid(id: &str) -> bool {
    layered_store::entity::is_valid_id(id)
}
