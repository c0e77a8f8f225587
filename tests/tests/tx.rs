//! Transactions.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_commit_persists() {
    // GIVEN
    let fx = Fixture::new();
    let tx = fx.client.tx(&fx.ctx).unwrap();
    let committed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&committed);
    tx.on_commit(move || flag.store(true, Ordering::SeqCst));

    // WHEN
    new_user(tx.client(), "a8m").exec(&fx.ctx).unwrap();
    assert_eq!(tx.client().query("User").must().count(&fx.ctx).unwrap(), 1);
    tx.commit().unwrap();

    // THEN
    assert!(committed.load(Ordering::SeqCst));
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 1);
}

#[test]
fn test_rollback_discards() {
    let fx = Fixture::new();

    let result: Result<()> = fx.client.with_tx(&fx.ctx, |tx| {
        new_user(tx.client(), "a8m").exec(&fx.ctx)?;
        new_user(tx.client(), "a8m").exec(&fx.ctx)
    });

    assert!(result.unwrap_err().is_constraint());
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_dropped_tx_rolls_back() {
    let fx = Fixture::new();

    {
        let tx = fx.client.tx(&fx.ctx).unwrap();
        new_user(tx.client(), "a8m").exec(&fx.ctx).unwrap();
    }

    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_parallel_saves_share_the_connection() {
    // GIVEN
    let fx = Fixture::new();
    let seed = fx.user("seed", 30);

    // WHEN
    let workers: Vec<_> = (0..8)
        .map(|t| {
            let client = fx.client.clone();
            let seed = seed.clone();
            thread::spawn(move || {
                let ctx = Context::background();
                (0..20)
                    .filter(|i| {
                        new_user(&client, &format!("u{t}-{i}"))
                            .add_edge_ids("friends", [seed.clone()])
                            .save(&ctx)
                            .is_err()
                    })
                    .count()
            })
        })
        .collect();
    let failed: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    // THEN
    assert_eq!(failed, 0);
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 161);
    let seed = fx.client.get(&fx.ctx, "User", seed).unwrap();
    assert_eq!(seed.query_edge("friends").unwrap().count(&fx.ctx).unwrap(), 160);
}

#[test]
fn test_nested_tx_on_a_tx_client() {
    let fx = Fixture::new();
    let tx = fx.client.tx(&fx.ctx).unwrap();

    assert!(matches!(tx.client().tx(&fx.ctx), Err(Error::TxStarted)));
    tx.rollback().unwrap();
}

#[test]
fn test_unwrap_after_commit_rebinds_to_the_client() {
    // GIVEN
    let fx = Fixture::new();
    let tx = fx.client.tx(&fx.ctx).unwrap();
    let user = new_user(tx.client(), "a8m").save(&fx.ctx).unwrap();
    tx.commit().unwrap();

    // WHEN
    let user = user.unwrap().unwrap();

    // THEN
    assert!(!user.client().driver().in_tx());
    let user = user.update().set("age", 31).save(&fx.ctx).unwrap();
    assert_eq!(user.get("age"), Some(&Value::Int(31)));
    assert!(user.query_edge("pets").unwrap().all(&fx.ctx).unwrap().is_empty());
}

#[test]
fn test_unwrap_of_a_non_transactional_entity() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);

    let user = fx.client.get(&fx.ctx, "User", id).unwrap();

    assert!(matches!(user.unwrap(), Err(Error::NotTransactional)));
}

#[test]
#[should_panic(expected = "closed transaction")]
fn test_update_of_an_entity_from_a_closed_tx_panics() {
    // GIVEN
    let fx = Fixture::new();
    let tx = fx.client.tx(&fx.ctx).unwrap();
    let user = new_user(tx.client(), "a8m").save(&fx.ctx).unwrap();
    tx.commit().unwrap();

    // WHEN
    let _ = user.update();
}

#[test]
fn test_queried_entities_are_bound_to_the_tx() {
    let fx = Fixture::new();
    fx.user("a8m", 30);

    fx.client
        .with_tx(&fx.ctx, |tx| {
            let user = tx.client().query("User").must().only(&fx.ctx)?;
            assert!(user.client().driver().in_tx());
            user.update().add("age", 1).exec(&fx.ctx)
        })
        .unwrap();

    let user = fx.client.query("User").must().only(&fx.ctx).unwrap();
    assert_eq!(user.get("age"), Some(&Value::Int(31)));
}
