//! Updating entities.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_set_after_add_wins() {
    // GIVEN
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);

    // WHEN
    let user = fx
        .client
        .update_one_id("User", id)
        .must()
        .add("age", 5)
        .set("age", 10)
        .save(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(user.get("age"), Some(&Value::Int(10)));
}

#[test]
fn test_add_is_applied_in_the_store() {
    let fx = Fixture::new();
    fx.user("a8m", 30);
    fx.user("nati", 28);

    let n = fx.client.update("User").must().add("age", 1).save(&fx.ctx).unwrap();

    assert_eq!(n, 2);
    let ages = fx
        .client
        .query("User")
        .must()
        .order_asc("name")
        .all(&fx.ctx)
        .unwrap()
        .iter()
        .map(|u| u.get("age").cloned())
        .collect::<Vec<_>>();
    assert_eq!(ages, vec![Some(Value::Int(31)), Some(Value::Int(29))]);
}

#[test]
fn test_reset_field_forgets_every_change() {
    // GIVEN
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);
    let mut update = fx.client.update_one_id("User", id).must();

    // WHEN
    let m = update.mutation_mut();
    m.set_field("age", 10).unwrap();
    m.add_field("age", 1).unwrap();
    m.clear_field("age").unwrap();
    m.reset_field("age").unwrap();

    // THEN
    let m = update.mutation();
    assert!(!m.fields().contains(&"age"));
    assert!(!m.added_fields().contains(&"age"));
    assert!(!m.cleared_fields().contains(&"age"));
    let user = update.save(&fx.ctx).unwrap();
    assert_eq!(user.get("age"), Some(&Value::Int(30)));
}

#[test]
fn test_update_one_by_predicates() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);
    fx.user("nati", 28);

    let n = fx
        .client
        .update("User")
        .must()
        .where_(Predicate::eq("name", "a8m"))
        .set("role", "admin")
        .save(&fx.ctx)
        .unwrap();
    assert_eq!(n, 1);

    let user = fx
        .client
        .get(&fx.ctx, "User", id.clone())
        .unwrap()
        .update()
        .where_(Predicate::eq("name", "a8m"))
        .clear("age")
        .save(&fx.ctx)
        .unwrap();
    assert_eq!(user.id(), id);
    assert_eq!(user.get("age"), Some(&Value::Null));
}

#[test]
fn test_update_one_without_matches_is_not_found() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);
    let entity = fx.client.query("User").must().only(&fx.ctx).unwrap();

    // WHEN
    let err = fx
        .client
        .update_one(&entity)
        .must()
        .where_(Predicate::eq("name", "nati"))
        .set("age", 1)
        .save(&fx.ctx)
        .unwrap_err();

    // THEN
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_update_one_with_predicates_only_and_no_match() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);

    // WHEN
    let err = fx
        .client
        .update_one_where("User", Predicate::eq("name", "nati"))
        .must()
        .set("age", 1)
        .save(&fx.ctx)
        .unwrap_err();

    // THEN
    assert!(err.is_not_found(), "{err:?}");
}

#[test]
fn test_update_one_with_predicates_only() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);
    fx.user("a8m-too", 30);

    let user = fx
        .client
        .update_one_where("User", Predicate::eq("name", "a8m"))
        .must()
        .set("age", 31)
        .save(&fx.ctx)
        .unwrap();
    assert_eq!(user.id(), id);
    assert_eq!(user.get("age"), Some(&Value::Int(31)));

    let err = fx
        .client
        .update_one_where("User", Predicate::eq("age", 30))
        .must()
        .set("age", 1)
        .save(&fx.ctx)
        .unwrap_err();
    assert!(err.is_not_singular(), "{err:?}");
}

#[test]
fn test_immutable_field_is_rejected_on_update() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);

    let err = fx
        .client
        .update_one_id("User", id)
        .must()
        .set("tenant", 2)
        .save(&fx.ctx)
        .unwrap_err();

    assert!(err.is_validation() || matches!(err, Error::Mutation(_)), "{err:?}");
}

#[test]
fn test_update_select_reads_back_selected_fields() {
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);

    let user = fx
        .client
        .update_one_id("User", id.clone())
        .must()
        .set("name", "Ariel")
        .select(&["name"])
        .save(&fx.ctx)
        .unwrap();

    assert_eq!(user.id(), id);
    assert_eq!(user.get("name"), Some(&Value::from("Ariel")));
    assert_eq!(user.get("age"), None);
}

#[test]
fn test_update_edges() {
    // GIVEN
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    let nati = fx.user("nati", 28);
    let pedro = fx.pet("pedro", Some(&a8m));
    let xabi = fx.pet("xabi", Some(&a8m));

    // WHEN
    fx.client
        .update_one_id("User", a8m.clone())
        .must()
        .remove_edge_ids("pets", [pedro.clone()])
        .add_edge_ids("friends", [nati.clone()])
        .exec(&fx.ctx)
        .unwrap();

    // THEN
    let user = fx.client.get(&fx.ctx, "User", a8m.clone()).unwrap();
    assert_eq!(user.query_edge("pets").unwrap().ids(&fx.ctx).unwrap(), vec![xabi]);
    assert_eq!(user.query_edge("friends").unwrap().ids(&fx.ctx).unwrap(), vec![nati.clone()]);

    fx.client
        .update_one_id("User", nati)
        .must()
        .clear_edge("friends")
        .exec(&fx.ctx)
        .unwrap();
    assert!(!user.query_edge("friends").unwrap().exist(&fx.ctx).unwrap());
    let orphan = fx.client.get(&fx.ctx, "Pet", pedro).unwrap();
    assert_eq!(orphan.get("owner_id"), Some(&Value::Null));
}
