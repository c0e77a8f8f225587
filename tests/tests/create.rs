//! Creating entities.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_create_writes_set_and_defaulted_fields() {
    // GIVEN
    let fx = Fixture::new();

    // WHEN
    let user = new_user(&fx.client, "Ariel").save(&fx.ctx).unwrap();

    // THEN
    assert_eq!(user.get("name"), Some(&Value::from("Ariel")));
    assert_eq!(user.get("role"), Some(&Value::from("user")));
    assert_eq!(user.get("tenant"), Some(&Value::Int(1)));
    assert_eq!(user.get("age"), Some(&Value::Null));
}

#[test]
fn test_created_entity_matches_stored_row() {
    // GIVEN
    let fx = Fixture::new();
    let created = new_user(&fx.client, "Ariel")
        .set("age", 30)
        .set("role", "admin")
        .save(&fx.ctx)
        .unwrap();

    // WHEN
    let stored = fx.client.get(&fx.ctx, "User", created.id()).unwrap();

    // THEN
    assert_eq!(stored.record().len(), created.record().len());
    for (column, value) in created.record().iter() {
        assert_eq!(stored.get(column), Some(value), "column {column}");
    }
}

#[test]
fn test_missing_required_field() {
    let fx = Fixture::new();

    let err = fx
        .client
        .create("User")
        .must()
        .set("name", "Ariel")
        .save(&fx.ctx)
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        r#"entgraph: validation failed: missing required field "User.email""#
    );
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_validator_rejects_before_insert() {
    let fx = Fixture::new();

    let err = new_user(&fx.client, "Ariel").set("age", -1).save(&fx.ctx).unwrap_err();

    assert!(err.is_validation());
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_unique_violation_is_a_constraint_error() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("Ariel", 30);

    // WHEN
    let err = new_user(&fx.client, "Ariel").save(&fx.ctx).unwrap_err();

    // THEN
    assert!(err.is_constraint(), "{err:?}");
}

#[test]
fn test_create_with_edges() {
    // GIVEN
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    let nati = fx.user("nati", 28);
    let pedro = fx.pet("pedro", None);

    // WHEN
    let alex = new_user(&fx.client, "alex")
        .add_edge_ids("pets", [pedro.clone()])
        .add_edge_ids("friends", [a8m.clone(), nati.clone()])
        .save(&fx.ctx)
        .unwrap();

    // THEN
    let owner = fx.client.get(&fx.ctx, "Pet", pedro).unwrap().query_edge("owner").unwrap();
    assert_eq!(owner.only_id(&fx.ctx).unwrap(), alex.id());

    let friends_of_a8m = fx
        .client
        .get(&fx.ctx, "User", a8m)
        .unwrap()
        .query_edge("friends")
        .unwrap()
        .ids(&fx.ctx)
        .unwrap();
    assert_eq!(friends_of_a8m, vec![alex.id()]);

    let mut friends = alex.query_edge("friends").unwrap().ids(&fx.ctx).unwrap();
    friends.sort_by_key(|v| v.as_int());
    assert_eq!(friends, vec![Value::Int(1), nati]);
}

#[test]
fn test_create_with_m2o_edge_writes_the_foreign_key() {
    let fx = Fixture::new();
    let owner = fx.user("a8m", 30);

    let pet = fx
        .client
        .create("Pet")
        .must()
        .set("name", "pedro")
        .set_edge_id("owner", owner.clone())
        .save(&fx.ctx)
        .unwrap();

    assert_eq!(pet.get("owner_id"), Some(&owner));
}

#[test]
fn test_unknown_field_surfaces_at_save() {
    let fx = Fixture::new();

    let err = new_user(&fx.client, "Ariel")
        .set("nickname", "ari")
        .save(&fx.ctx)
        .unwrap_err();

    assert!(matches!(err, Error::Mutation(_)), "{err:?}");
}

#[test]
fn test_create_with_supplied_id() {
    let fx = Fixture::new();

    let user = new_user(&fx.client, "Ariel").set_id(42).save(&fx.ctx).unwrap();

    assert_eq!(user.id(), Value::Int(42));
    assert!(fx.client.get(&fx.ctx, "User", Value::Int(42)).is_ok());
}
