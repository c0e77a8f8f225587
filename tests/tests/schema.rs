//! Entities whose tables live in another schema.

use entgraph_dialect::SqliteDriver;
use entgraph_schema::{Annotation, EdgeDef, FieldDef, Schema, SchemaBuilder};
use entgraph_tests::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const DDL: &str = r#"
ATTACH DATABASE ':memory:' AS "auth";
CREATE TABLE "auth"."accounts" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL
);
CREATE TABLE "pets" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL,
    "owner_id" INTEGER
);
"#;

fn schema() -> Arc<Schema> {
    let mut b = SchemaBuilder::new();
    b.add_entity("User")
        .annotate(Annotation::schema_table("auth", "accounts"))
        .field(FieldDef::string("name"))
        .edge(EdgeDef::o2m("pets", "Pet").column("owner_id"))
        .done()
        .unwrap();
    b.add_entity("Pet")
        .field(FieldDef::string("name"))
        .edge(EdgeDef::m2o("owner", "User").inverse().column("owner_id"))
        .done()
        .unwrap();
    Arc::new(b.build().unwrap())
}

fn client() -> Client {
    init_tracing();
    let driver = SqliteDriver::open_in_memory().unwrap();
    driver.execute_batch(DDL).unwrap();
    Client::builder(Arc::new(driver), schema()).debug(true).build()
}

#[test]
fn test_entity_in_attached_schema() {
    // GIVEN
    let client = client();
    let ctx = Context::background();
    let user = client.create("User").must().set("name", "a8m").save(&ctx).unwrap();
    client
        .create("Pet")
        .must()
        .set("name", "pedro")
        .set_edge_id("owner", user.id())
        .exec(&ctx)
        .unwrap();

    // WHEN
    let user = user.update().set("name", "Ariel").save(&ctx).unwrap();
    let pets = user.query_edge("pets").unwrap().all(&ctx).unwrap();
    let owner = client
        .query("Pet")
        .must()
        .only(&ctx)
        .unwrap()
        .query_edge("owner")
        .unwrap()
        .only(&ctx)
        .unwrap();

    // THEN
    assert_eq!(user.get("name"), Some(&Value::from("Ariel")));
    assert_eq!(pets.len(), 1);
    assert_eq!(owner.id(), user.id());
    client.delete_one(&user).unwrap().exec(&ctx).unwrap();
    assert_eq!(client.query("User").must().count(&ctx).unwrap(), 0);
}

#[test]
fn test_schema_qualified_statement() {
    let mock = MockDriver::new(entgraph_dialect::Dialect::Sqlite);
    mock.expect_query(&["id"], vec![vec![Value::Int(1)]]);
    let client = Client::new(Arc::new(mock.clone()), schema());

    client
        .create("User")
        .must()
        .set("name", "a8m")
        .exec(&Context::background())
        .unwrap();

    assert_eq!(
        mock.sql_log(),
        vec![r#"INSERT INTO "auth"."accounts" ("name") VALUES (?) RETURNING "id""#]
    );
}
