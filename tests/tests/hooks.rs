//! Mutation hooks.

use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<Vec<String>>>;

fn traced(trace: &Trace, name: &'static str) -> hook::Hook {
    let trace = Arc::clone(trace);
    hook_fn(move |next, ctx, m| {
        trace.lock().unwrap().push(format!("{name}:pre"));
        let outcome = next.mutate(ctx, m);
        trace.lock().unwrap().push(format!("{name}:post"));
        outcome
    })
}

#[test]
fn test_hooks_run_in_onion_order() {
    // GIVEN
    let fx = Fixture::new();
    let trace = Trace::default();
    fx.client.use_hook(traced(&trace, "h1"));
    fx.client.use_hook(traced(&trace, "h2"));

    // WHEN
    fx.user("a8m", 30);

    // THEN
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["h1:pre", "h2:pre", "h2:post", "h1:post"]
    );
}

#[test]
fn test_early_return_skips_inner_hooks_and_apply() {
    // GIVEN
    let fx = Fixture::new();
    let trace = Trace::default();
    fx.client.use_hook(hook_fn(|_, _, m| Ok(Outcome::Affected(m.fields().len()))));
    fx.client.use_hook(traced(&trace, "inner"));

    // WHEN
    let err = new_user(&fx.client, "a8m").save(&fx.ctx).unwrap_err();

    // THEN
    assert!(matches!(err, Error::UnexpectedOutcome { .. }), "{err:?}");
    assert!(trace.lock().unwrap().is_empty());
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 0);
}

#[test]
fn test_hook_modifies_mutation_before_apply() {
    let fx = Fixture::new();
    fx.client.use_hook_for(
        "User",
        hook::on(
            hook_fn(|next, ctx, m| {
                if let Some(name) = m.field("name").and_then(Value::as_str) {
                    let name = name.to_uppercase();
                    m.set_field("name", name)?;
                }
                next.mutate(ctx, m)
            }),
            Op::CREATE | Op::UPDATE_ONE,
        ),
    );

    let id = fx.user("a8m", 30);
    fx.pet("pedro", None);

    let user = fx.client.get(&fx.ctx, "User", id).unwrap();
    assert_eq!(user.get("name"), Some(&Value::from("A8M")));
    let pet = fx.client.query("Pet").must().only(&fx.ctx).unwrap();
    assert_eq!(pet.get("name"), Some(&Value::from("pedro")));
}

#[test]
fn test_hook_sees_the_outcome() {
    let fx = Fixture::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    fx.client.use_hook(hook_fn(move |next, ctx, m| {
        let outcome = next.mutate(ctx, m)?;
        *sink.lock().unwrap() = m.id().cloned();
        Ok(outcome)
    }));

    let id = fx.user("a8m", 30);

    assert_eq!(*seen.lock().unwrap(), Some(id));
}

#[test]
fn test_reject_deletes() {
    // GIVEN
    let fx = Fixture::new();
    let id = fx.user("a8m", 30);
    fx.client
        .use_hook_for("User", hook::reject(Op::DELETE | Op::DELETE_ONE));

    // WHEN
    let err = fx
        .client
        .delete_one_id("User", id)
        .must()
        .exec(&fx.ctx)
        .unwrap_err();

    // THEN
    assert!(matches!(err, Error::Mutation(_)), "{err:?}");
    assert_eq!(fx.client.query("User").must().count(&fx.ctx).unwrap(), 1);
}

#[test]
fn test_conditional_hook() {
    let fx = Fixture::new();
    let trace = Trace::default();
    fx.client.use_hook(hook::if_(
        traced(&trace, "age"),
        hook::has_fields(&["age"]),
    ));

    fx.user("a8m", 30);
    fx.pet("pedro", None);

    assert_eq!(*trace.lock().unwrap(), vec!["age:pre", "age:post"]);
}

#[test]
fn test_hooks_from_options() {
    let (mock, _) = mock_client();
    let trace = Trace::default();
    let client = Client::builder(Arc::new(mock.clone()), schema())
        .hook(traced(&trace, "global"))
        .build();
    mock.expect_query(&["id"], vec![vec![Value::Int(1)]]);

    new_user(&client, "a8m").exec(&Context::background()).unwrap();

    assert_eq!(*trace.lock().unwrap(), vec!["global:pre", "global:post"]);
    assert_eq!(mock.sql_log().len(), 1);
}
