//! Reading entities and their edges.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;

fn names(users: &[Entity]) -> Vec<String> {
    users
        .iter()
        .filter_map(|u| u.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[test]
fn test_filter_order_and_paginate() {
    // GIVEN
    let fx = Fixture::new();
    fx.user("a8m", 30);
    fx.user("nati", 28);
    fx.user("alex", 35);
    fx.user("ariel", 19);

    // WHEN
    let adults = fx
        .client
        .query("User")
        .must()
        .where_(Predicate::ge("age", 20))
        .order_desc("age")
        .limit(2)
        .offset(1)
        .all(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(names(&adults), vec!["a8m", "nati"]);
}

#[test]
fn test_first_only_count_exist() {
    let fx = Fixture::new();
    let ctx = &fx.ctx;
    let query = || fx.client.query("User").must();

    assert!(query().first(ctx).unwrap_err().is_not_found());
    assert!(!query().exist(ctx).unwrap());

    fx.user("a8m", 30);
    fx.user("nati", 28);

    assert_eq!(query().count(ctx).unwrap(), 2);
    assert!(query().exist(ctx).unwrap());
    assert!(query().only(ctx).unwrap_err().is_not_singular());
    assert_eq!(
        query().where_(Predicate::has_prefix("name", "na")).only_id(ctx).unwrap(),
        Value::Int(2)
    );
    assert_eq!(query().order_asc("age").first_id(ctx).unwrap(), Value::Int(2));
}

#[test]
fn test_get_missing_entity() {
    let fx = Fixture::new();

    let err = fx.client.get(&fx.ctx, "User", Value::Int(7)).unwrap_err();

    assert!(err.is_not_found());
}

#[test]
fn test_unknown_field_in_query() {
    let fx = Fixture::new();

    let err = fx
        .client
        .query("User")
        .must()
        .order_asc("nickname")
        .all(&fx.ctx)
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains(r#"invalid field "nickname" for query"#));
}

#[test]
fn test_select_reads_only_selected_fields() {
    let fx = Fixture::new();
    fx.user("a8m", 30);
    fx.user("nati", 30);

    let users = fx
        .client
        .query("User")
        .must()
        .select(&["age"])
        .all(&fx.ctx)
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].get("name"), None);
    assert_eq!(users[0].get("age"), Some(&Value::Int(30)));
}

#[test]
fn test_eager_load_o2m_and_m2o() {
    // GIVEN
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    fx.user("nati", 28);
    fx.pet("pedro", Some(&a8m));
    fx.pet("xabi", Some(&a8m));
    fx.pet("stray", None);

    // WHEN
    let users = fx
        .client
        .query("User")
        .must()
        .order_asc("name")
        .with_edge("pets")
        .all(&fx.ctx)
        .unwrap();
    let pets = fx
        .client
        .query("Pet")
        .must()
        .order_asc("name")
        .with_edge("owner")
        .all(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(users[0].edges("pets").unwrap().len(), 2);
    assert!(users[1].edges("pets").unwrap().is_empty());
    let owners: Vec<usize> = pets.iter().map(|p| p.edges("owner").unwrap().len()).collect();
    assert_eq!(owners, vec![1, 0, 1]);
    assert_eq!(pets[0].edges("owner").unwrap()[0].id(), a8m);
}

#[test]
fn test_eager_load_bidi_m2m_with_predicate() {
    // GIVEN
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    let nati = fx.user("nati", 28);
    let alex = fx.user("alex", 35);
    fx.client
        .update_one_id("User", a8m.clone())
        .must()
        .add_edge_ids("friends", [nati.clone(), alex])
        .exec(&fx.ctx)
        .unwrap();

    // WHEN
    let users = fx
        .client
        .query("User")
        .must()
        .where_(Predicate::eq("id", a8m))
        .with_edge_where("friends", Some(Predicate::lt("age", 30)))
        .all(&fx.ctx)
        .unwrap();
    let nati = fx
        .client
        .query("User")
        .must()
        .where_(Predicate::eq("id", nati))
        .with_edge("friends")
        .only(&fx.ctx)
        .unwrap();

    // THEN
    assert_eq!(names(users[0].edges("friends").unwrap()), vec!["nati"]);
    assert_eq!(names(nati.edges("friends").unwrap()), vec!["a8m"]);
}

#[test]
fn test_edges_not_loaded() {
    let fx = Fixture::new();
    fx.user("a8m", 30);

    let user = fx.client.query("User").must().only(&fx.ctx).unwrap();

    assert!(user.edges("pets").unwrap_err().is_not_loaded());
}

#[test]
fn test_has_edge_predicate() {
    let fx = Fixture::new();
    let a8m = fx.user("a8m", 30);
    fx.user("nati", 28);
    fx.pet("pedro", Some(&a8m));

    let owners = fx
        .client
        .get(&fx.ctx, "Pet", Value::Int(1))
        .unwrap()
        .query_edge("owner")
        .unwrap()
        .all(&fx.ctx)
        .unwrap();

    assert_eq!(names(&owners), vec!["a8m"]);
}

#[test]
fn test_canceled_context() {
    let fx = Fixture::new();
    let (ctx, cancel) = fx.ctx.with_cancel();
    cancel.cancel();

    let err = fx.client.query("User").must().all(&ctx).unwrap_err();

    assert!(err.is_canceled(), "{err:?}");
}
