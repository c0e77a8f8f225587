//! Deleting entities.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_delete_by_predicate() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);
    fx.user("nati", 28);
    fx.user("alex", 35);

    // WHEN
    let n = fx
        .client
        .delete("User")
        .must()
        .where_(Predicate::ge("age", 30))
        .exec(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(n, 2);
    let left = fx.client.query("User").must().only(&fx.ctx).unwrap();
    assert_eq!(left.get("name"), Some(&Value::from("nati")));
}

#[test]
fn test_delete_one() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);
    let pet = fx.pet("pedro", Some(&id));

    fx.client
        .get(&fx.ctx, "User", id.clone())
        .unwrap()
        .delete()
        .exec(&fx.ctx)
        .unwrap();

    assert!(fx.client.get(&fx.ctx, "User", id.clone()).unwrap_err().is_not_found());
    let pet = fx.client.get(&fx.ctx, "Pet", pet).unwrap();
    assert_eq!(pet.get("owner_id"), Some(&Value::Null));

    let err = fx.client.delete_one_id("User", id).must().exec(&fx.ctx).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_delete_one_respects_predicates() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);

    let err = fx
        .client
        .delete_one_id("User", id)
        .must()
        .where_(Predicate::eq("name", "nati"))
        .exec(&fx.ctx)
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 1);
}

#[test]
fn test_delete_statement() {
    let (mock, client) = mock_client();
    mock.expect_exec(1, None);

    client
        .delete_one_id("User", 1)
        .must()
        .where_(Predicate::eq("name", "a8m"))
        .exec(&Context::background())
        .unwrap();

    assert_eq!(
        mock.sql_log(),
        vec![r#"DELETE FROM "users" WHERE ("users"."id" = ? AND "users"."name" = ?)"#]
    );
}
