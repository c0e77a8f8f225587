//! Upserts and conflict resolution.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;

fn stored(fx: &Fixture, email: &str) -> Entity {
    fx.client
        .query("User")
        .must()
        .where_(Predicate::eq("email", email))
        .only(&fx.ctx)
        .unwrap()
}

fn seed(fx: &Fixture) -> Value {
    new_user(&fx.client, "a8m")
        .set("age", 30)
        .set("tenant", 1)
        .save(&fx.ctx)
        .unwrap()
        .id()
}

#[test]
fn test_ignore_registered_after_new_values_wins() {
    // GIVEN
    let fx = Fixture::new();
    let id = seed(&fx);

    // WHEN
    let upserted = new_user(&fx.client, "a8m")
        .set("age", 31)
        .set("tenant", 2)
        .on_conflict([
            ConflictOption::columns(["email"]),
            ConflictOption::ResolveWithNewValues,
            ConflictOption::resolve_with(|s: &mut UpdateSet| {
                s.set_ignore("tenant");
            }),
        ])
        .id(&fx.ctx)
        .unwrap();

    // THEN
    let user = stored(&fx, "a8m@example.com");
    assert_eq!(upserted, id);
    assert_eq!(user.get("age"), Some(&Value::Int(31)));
    assert_eq!(user.get("tenant"), Some(&Value::Int(1)));
}

#[test]
fn test_new_values_registered_last_overwrite_an_earlier_ignore() {
    // GIVEN
    let fx = Fixture::new();
    seed(&fx);

    // WHEN
    new_user(&fx.client, "a8m")
        .set("age", 31)
        .set("tenant", 2)
        .on_conflict([
            ConflictOption::columns(["email"]),
            ConflictOption::resolve_with(|s: &mut UpdateSet| {
                s.set_ignore("tenant");
            }),
            ConflictOption::ResolveWithNewValues,
        ])
        .exec(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(stored(&fx, "a8m@example.com").get("tenant"), Some(&Value::Int(2)));
}

#[test]
fn test_update_new_values_keeps_immutable_fields_in_any_order() {
    // GIVEN
    let fx = Fixture::new();
    seed(&fx);

    // WHEN
    new_user(&fx.client, "a8m")
        .set("age", 31)
        .set("tenant", 2)
        .on_conflict_columns(&["email"])
        .update_new_values()
        .exec(&fx.ctx)
        .unwrap();
    new_user(&fx.client, "a8m")
        .set("age", 32)
        .set("tenant", 3)
        .on_conflict_columns(&["email"])
        .update(|s| {
            s.set_ignore("tenant");
        })
        .update_new_values()
        .exec(&fx.ctx)
        .unwrap();

    // THEN
    let user = stored(&fx, "a8m@example.com");
    assert_eq!(user.get("age"), Some(&Value::Int(32)));
    assert_eq!(user.get("tenant"), Some(&Value::Int(1)));
}

#[test]
fn test_upsert_add_and_update_field() {
    let fx = Fixture::new();
    seed(&fx);

    new_user(&fx.client, "Ariel")
        .set("email", "a8m@example.com")
        .on_conflict_columns(&["email"])
        .add("age", 5)
        .update_field("name")
        .exec(&fx.ctx)
        .unwrap();

    let user = stored(&fx, "a8m@example.com");
    assert_eq!(user.get("age"), Some(&Value::Int(35)));
    assert_eq!(user.get("name"), Some(&Value::from("Ariel")));
}

#[test]
fn test_upsert_ignore_keeps_the_row() {
    // GIVEN
    let fx = Fixture::new();
    let id = seed(&fx);

    // WHEN
    let upserted = new_user(&fx.client, "a8m")
        .set("age", 99)
        .on_conflict_columns(&["email"])
        .ignore()
        .save(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(upserted.id(), id);
    assert_eq!(upserted.get("age"), Some(&Value::Int(30)));
    assert_eq!(stored(&fx, "a8m@example.com").get("age"), Some(&Value::Int(30)));
}

#[test]
fn test_upserted_entity_reflects_the_stored_row() {
    // GIVEN
    let fx = Fixture::new();
    seed(&fx);

    // WHEN
    let upserted = new_user(&fx.client, "Ariel")
        .set("email", "a8m@example.com")
        .set("age", 99)
        .on_conflict_columns(&["email"])
        .add("age", 1)
        .save(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(upserted.get("age"), Some(&Value::Int(31)));
    assert_eq!(upserted.get("name"), Some(&Value::from("a8m")));
    assert_eq!(upserted.get("tenant"), Some(&Value::Int(1)));
}

#[test]
fn test_update_new_values_keeps_the_owner_in_any_order() {
    // GIVEN
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    let nati = fx.user("nati", 28);
    let pet = fx.pet("pedro", Some(&a8m));
    let upsert = |name: &str| {
        fx.client
            .create("Pet")
            .must()
            .set_id(pet.clone())
            .set("name", name)
            .set_edge_id("owner", nati.clone())
            .on_conflict_columns(&["id"])
    };

    // WHEN
    let first = upsert("xabi").update_new_values().save(&fx.ctx).unwrap();
    let second = upsert("coco")
        .update(|s| {
            s.set_ignore("owner_id");
        })
        .update_new_values()
        .save(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(first.get("name"), Some(&Value::from("xabi")));
    assert_eq!(first.get("owner_id"), Some(&a8m));
    assert_eq!(second.get("name"), Some(&Value::from("coco")));
    assert_eq!(second.get("owner_id"), Some(&a8m));
    let owner = fx.client.get(&fx.ctx, "Pet", pet).unwrap().query_edge("owner").unwrap();
    assert_eq!(owner.only(&fx.ctx).unwrap().id(), a8m);
    assert_eq!(fx.client.query("Pet").must().count(&fx.ctx).unwrap(), 1);
}

#[test]
fn test_upsert_inserts_without_conflict() {
    let fx = Fixture::new();
    seed(&fx);

    new_user(&fx.client, "nati")
        .on_conflict_columns(&["email"])
        .update_new_values()
        .exec(&fx.ctx)
        .unwrap();

    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 2);
}

#[test]
fn test_upsert_statement() {
    let (mock, client) = mock_client();
    mock.expect_query(&["id"], vec![vec![Value::Int(1)]]);

    new_user(&client, "a8m")
        .on_conflict_columns(&["email"])
        .do_nothing()
        .exec(&Context::background())
        .unwrap();

    assert_eq!(
        mock.sql_log(),
        vec![
            r#"INSERT INTO "users" ("name", "email", "role", "tenant") VALUES (?, ?, ?, ?) ON CONFLICT ("email") DO NOTHING RETURNING "id""#
        ]
    );
}
