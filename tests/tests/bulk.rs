//! Bulk creation.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_ids_are_assigned_in_input_order() {
    // GIVEN
    let (mock, client) = mock_client();
    mock.expect_query(
        &["id"],
        vec![vec![Value::Int(5)], vec![Value::Int(6)], vec![Value::Int(7)]],
    );
    let builders = ["A", "B", "C"].map(|name| new_user(&client, name));

    // WHEN
    let users = client.create_bulk(builders).save(&Context::background()).unwrap();

    // THEN
    let pairs: Vec<(Value, Value)> = users
        .iter()
        .map(|u| (u.get("name").cloned().unwrap_or(Value::Null), u.id()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Value::from("A"), Value::Int(5)),
            (Value::from("B"), Value::Int(6)),
            (Value::from("C"), Value::Int(7)),
        ]
    );
    assert_eq!(
        mock.sql_log(),
        vec![
            r#"INSERT INTO "users" ("name", "email", "role", "tenant") VALUES (?, ?, ?, ?), (?, ?, ?, ?), (?, ?, ?, ?) RETURNING "id""#
        ]
    );
}

#[test]
fn test_every_mutation_passes_its_hooks_with_one_insert() {
    // GIVEN
    let (mock, client) = mock_client();
    mock.expect_query(&["id"], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    client.use_hook(hook_fn(move |next, ctx, m| {
        counter.fetch_add(1, Ordering::SeqCst);
        m.set_field("age", 18)?;
        next.mutate(ctx, m)
    }));

    // WHEN
    let users = client
        .create_bulk([new_user(&client, "a8m"), new_user(&client, "nati")])
        .save(&Context::background())
        .unwrap();

    // THEN
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(mock.sql_log().len(), 1);
    assert!(users.iter().all(|u| u.get("age") == Some(&Value::Int(18))));
}

#[test]
fn test_bulk_against_sqlite() {
    let fx = Fixture::new();
    let builders = (0..5).map(|i| new_user(&fx.client, &format!("user{i}")).set("age", i));

    let users = fx.client.create_bulk(builders).save(&fx.ctx).unwrap();

    for user in &users {
        let stored = fx.client.get(&fx.ctx, "User", user.id()).unwrap();
        assert_eq!(stored.get("name"), user.get("name"));
    }
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 5);
}

#[test]
fn test_failed_validation_inserts_nothing() {
    let fx = Fixture::new();

    let err = fx
        .client
        .create_bulk([
            new_user(&fx.client, "a8m"),
            fx.client.create("User").must().set("name", "nati"),
        ])
        .save(&fx.ctx)
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_bulk_upsert() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);

    // WHEN
    fx.client
        .create_bulk([
            new_user(&fx.client, "a8m").set("age", 31),
            new_user(&fx.client, "nati").set("age", 28),
        ])
        .on_conflict_columns(&["email"])
        .update_new_values()
        .exec(&fx.ctx)
        .unwrap();

    // THEN
    let users = fx.client.query("User").must().order_asc("id").all(&fx.ctx).unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].get("age"), Some(&Value::Int(31)));
}

#[test]
fn test_bulk_upsert_returns_stored_rows() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);

    // WHEN
    let users = fx
        .client
        .create_bulk([
            new_user(&fx.client, "a8m").set("age", 99),
            new_user(&fx.client, "nati").set("age", 28),
        ])
        .on_conflict_columns(&["email"])
        .ignore()
        .save(&fx.ctx)
        .unwrap();

    // THEN
    let ages: Vec<_> = users.iter().map(|u| u.get("age").cloned()).collect();
    assert_eq!(ages, vec![Some(Value::Int(30)), Some(Value::Int(28))]);
}

#[test]
fn test_empty_bulk() {
    let (mock, client) = mock_client();

    let users = client.create_bulk(Vec::new()).save(&Context::background()).unwrap();

    assert!(users.is_empty());
    assert!(mock.sql_log().is_empty());
}
