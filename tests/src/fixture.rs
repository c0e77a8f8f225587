//! Fixture schema and database.

use entgraph_client::{Client, Context, Create, Must};
use entgraph_core::Value;
use entgraph_dialect::mock::MockDriver;
use entgraph_dialect::{Dialect, SqliteDriver};
use entgraph_schema::{EdgeDef, FieldDef, Schema, SchemaBuilder};
use std::sync::{Arc, Once};

/// Tables of the fixture schema.
pub const DDL: &str = r#"
CREATE TABLE "users" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL,
    "email" TEXT NOT NULL UNIQUE,
    "age" INTEGER,
    "role" TEXT NOT NULL,
    "tenant" INTEGER NOT NULL
);
CREATE TABLE "pets" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL,
    "owner_id" INTEGER REFERENCES "users" ("id") ON DELETE SET NULL
);
CREATE TABLE "user_friends" (
    "user_id" INTEGER NOT NULL REFERENCES "users" ("id") ON DELETE CASCADE,
    "friend_id" INTEGER NOT NULL REFERENCES "users" ("id") ON DELETE CASCADE,
    PRIMARY KEY ("user_id", "friend_id")
);
"#;

/// User { name, email (unique), age?, role = "user", tenant = 1 (immutable) }
/// with pets and friends; Pet { name } with an optional owner.
pub fn schema() -> Arc<Schema> {
    let mut b = SchemaBuilder::new();
    b.add_entity("User")
        .field(FieldDef::string("name").not_empty())
        .field(FieldDef::string("email").unique())
        .field(FieldDef::int("age").optional().nullable().range(Some(Value::Int(0)), None))
        .field(FieldDef::enumeration("role", ["user", "admin"]).default_value("user"))
        .field(FieldDef::int("tenant").immutable().default_value(1))
        .edge(EdgeDef::o2m("pets", "Pet").column("owner_id"))
        .edge(
            EdgeDef::m2m("friends", "User")
                .table("user_friends")
                .columns("user_id", "friend_id")
                .bidi(),
        )
        .done()
        .expect("fixture schema: User");
    b.add_entity("Pet")
        .field(FieldDef::string("name"))
        .edge(EdgeDef::m2o("owner", "User").inverse().column("owner_id"))
        .done()
        .expect("fixture schema: Pet");
    Arc::new(b.build().expect("fixture schema"))
}

/// Install a test subscriber once; `RUST_LOG=entgraph=debug` shows SQL.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A client over a fresh in-memory database.
pub struct Fixture {
    pub ctx: Context,
    pub driver: SqliteDriver,
    pub client: Client,
}

impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let driver = SqliteDriver::open_in_memory().expect("open sqlite");
        driver.execute_batch(DDL).expect("load fixture tables");
        let client = Client::builder(Arc::new(driver.clone()), schema())
            .debug(true)
            .build();
        Self {
            ctx: Context::background(),
            driver,
            client,
        }
    }

    /// Insert a user and return its id.
    pub fn user(&self, name: &str, age: i64) -> Value {
        new_user(&self.client, name)
            .set("age", age)
            .save(&self.ctx)
            .must()
            .id()
    }

    pub fn pet(&self, name: &str, owner: Option<&Value>) -> Value {
        let mut create = self.client.create("Pet").must().set("name", name);
        if let Some(owner) = owner {
            create = create.set_edge_id("owner", owner.clone());
        }
        create.save(&self.ctx).must().id()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create builder for a user named `name` with a derived email.
pub fn new_user(client: &Client, name: &str) -> Create {
    client
        .create("User")
        .must()
        .set("name", name)
        .set("email", format!("{}@example.com", name.to_lowercase()))
}

/// A client over a scripted driver, for assertions on the exact statements.
pub fn mock_client() -> (MockDriver, Client) {
    let mock = MockDriver::new(Dialect::Sqlite);
    let client = Client::new(Arc::new(mock.clone()), schema());
    (mock, client)
}
