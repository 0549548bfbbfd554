mod common;

use layered_store::entity::new_id;
use layered_store::prelude::*;
use layered_store::sql::category;
use layered_store::tree::verify_nested_set;
use sea_orm::DatabaseConnection;

async fn assert_well_formed(db: &DatabaseConnection) {
    let nodes = category::all(db).await.unwrap();
    if let Err(problem) = verify_nested_set(&nodes) {
        panic!("broken tree: {problem}\n{nodes:#?}");
    }
}

async fn names(list: StoreChannel<EntityList<Category>>) -> Vec<String> {
    list.recv().await.unwrap().into_ordered().into_iter().map(|c| c.name).collect()
}

fn strs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn inserts_build_a_well_formed_forest() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db.clone()).build().unwrap();
    let categories = store.category();

    let shop = must(categories.create(None, "shop")).await;
    let kitchen = must(categories.create(Some(&shop.id), "kitchen")).await;
    let garden = must(categories.create(Some(&shop.id), "garden")).await;
    let pots = must(categories.create(Some(&kitchen.id), "pots")).await;
    let blog = must(categories.create(None, "blog")).await;
    assert_well_formed(&db).await;

    assert_eq!((pots.lft, pots.rgt, pots.depth), (3, 4, 2));
    assert_eq!((blog.lft, blog.rgt), (9, 10));
    let shop = categories.get(&shop.id).recv().await.unwrap();
    assert_eq!((shop.lft, shop.rgt), (1, 8));
    assert_eq!(shop.descendant_count(), 3);

    assert_eq!(names(categories.descendants(&shop.id)).await, strs(&["kitchen", "pots", "garden"]));
    assert_eq!(names(categories.path(&pots.id)).await, strs(&["shop", "kitchen", "pots"]));
    assert_eq!(names(categories.roots()).await, strs(&["shop", "blog"]));
    assert_eq!(
        names(categories.get_by_ids(vec![garden.id.clone(), shop.id.clone(), new_id()])).await,
        strs(&["shop", "garden"])
    );
    assert!(categories.descendants(&garden.id).recv().await.unwrap().is_empty());
}

#[tokio::test]
async fn moves_reorders_and_deletes_keep_the_tree_intact() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db.clone()).build().unwrap();
    let categories = store.category();

    let a = must(categories.create(None, "a")).await;
    let b = must(categories.create(Some(&a.id), "b")).await;
    let c = must(categories.create(Some(&a.id), "c")).await;
    let d = must(categories.create(Some(&a.id), "d")).await;
    let e = must(categories.create(Some(&b.id), "e")).await;
    let f = must(categories.create(None, "f")).await;
    assert_well_formed(&db).await;

    // Subtree b moves under f.
    let moved = must(categories.move_to(&b.id, Some(&f.id))).await;
    assert_eq!(moved.parent_id.as_deref(), Some(f.id.as_str()));
    assert_eq!(moved.depth, 1);
    assert_well_formed(&db).await;
    assert_eq!(names(categories.path(&e.id)).await, strs(&["f", "b", "e"]));
    assert_eq!(names(categories.descendants(&a.id)).await, strs(&["c", "d"]));

    // And back, as a root.
    must(categories.move_to(&b.id, None)).await;
    assert_well_formed(&db).await;
    assert_eq!(names(categories.roots()).await, strs(&["a", "f", "b"]));
    assert_eq!(categories.get(&e.id).recv().await.unwrap().depth, 1);

    // d first among a's children, then c last.
    must(categories.order(&d.id, 0)).await;
    assert_well_formed(&db).await;
    assert_eq!(names(categories.descendants(&a.id)).await, strs(&["d", "c"]));
    must(categories.order(&d.id, 99)).await;
    assert_well_formed(&db).await;
    assert_eq!(names(categories.descendants(&a.id)).await, strs(&["c", "d"]));

    // Roots can be reordered too.
    must(categories.order(&b.id, 0)).await;
    assert_well_formed(&db).await;
    assert_eq!(names(categories.roots()).await, strs(&["b", "a", "f"]));

    let before = categories.get(&c.id).recv().await.unwrap();
    let renamed = must(categories.rename(&c.id, "see")).await;
    assert_eq!(renamed.name, "see");
    assert_eq!((renamed.lft, renamed.rgt), (before.lft, before.rgt));

    categories.delete(&b.id).recv().await.unwrap();
    assert_well_formed(&db).await;
    for gone in [&b.id, &e.id] {
        let err = categories.get(gone).recv().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
    assert_eq!(names(categories.roots()).await, strs(&["a", "f"]));
}

#[tokio::test]
async fn impossible_mutations_are_rejected_without_damage() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db.clone()).build().unwrap();
    let categories = store.category();

    let a = must(categories.create(None, "a")).await;
    let b = must(categories.create(Some(&a.id), "b")).await;
    let c = must(categories.create(Some(&b.id), "c")).await;

    let err = categories.move_to(&a.id, Some(&c.id)).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = categories.move_to(&b.id, Some(&b.id)).recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let unknown = new_id();
    for err in [
        categories.create(Some(&unknown), "orphan").recv().await.unwrap_err(),
        categories.move_to(&unknown, None).recv().await.unwrap_err(),
        categories.order(&unknown, 0).recv().await.unwrap_err(),
        categories.delete(&unknown).recv().await.unwrap_err(),
        categories.path(&unknown).recv().await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let err = categories.create(None, "").recv().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_well_formed(&db).await;
    assert_eq!(names(categories.path(&c.id)).await, strs(&["a", "b", "c"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_do_not_interleave() {
    let (_dir, db) = common::sqlite_db().await;
    let store = Store::builder().primary(db.clone()).build().unwrap();
    let root = must(store.category().create(None, "root")).await;

    let pending: Vec<_> = (0..16)
        .map(|i| store.category().create(Some(&root.id), &format!("n{i}")))
        .collect();
    for channel in pending {
        channel.recv().await.unwrap();
    }

    assert_well_formed(&db).await;
    assert_eq!(store.category().descendants(&root.id).recv().await.unwrap().len(), 16);
}
