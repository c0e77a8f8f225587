//! Node updates.

use crate::edges::{add_edges, clear_edges, display_ids, is_external};
use crate::query::{query_nodes, select_ids, where_clause};
use crate::{
    with_tx, ConstraintError, EdgeMut, FieldMut, Predicate, QuerySpec, Rel, SqlGraphError,
    SqlGraphResult, UpdateSet, UpdateSpec,
};
use entgraph_core::{Context, Record, Value};
use entgraph_dialect::sql::Builder;
use entgraph_dialect::Driver;
use tracing::debug;

/// Update one node and return its row as stored afterwards.
///
/// The node must exist and match the spec's predicate, otherwise the update
/// fails with a not-found error and nothing is written.
pub fn update_node(ctx: &Context, drv: &dyn Driver, spec: UpdateSpec) -> SqlGraphResult<Record> {
    let id = spec
        .node
        .id
        .value
        .clone()
        .ok_or_else(|| SqlGraphError::invalid_spec("missing id for single-node update"))?;
    with_tx(ctx, drv, |tx| {
        let table = &spec.node.table;
        let found = select_ids(ctx, tx, table, &spec.node.id, spec.scope().as_ref())?;
        if found.is_empty() {
            return Err(SqlGraphError::not_found(table.clone(), Some(id.clone())));
        }
        let set = assignments(&spec.fields, &spec.edges)?;
        let by_id = Predicate::eq(spec.node.id.column.clone(), id.clone());
        exec_update(ctx, tx, table, &set, Some(&by_id))?;
        apply_edges(ctx, tx, std::slice::from_ref(&id), &spec.edges)?;

        let mut select = QuerySpec::new(spec.node.clone());
        select.node.id.value = Some(id.clone());
        query_nodes(ctx, tx, &select)?
            .into_iter()
            .next()
            .ok_or_else(|| SqlGraphError::not_found(table.clone(), Some(id.clone())))
    })
}

/// Update every node matching the spec, returning how many were matched.
pub fn update_nodes(ctx: &Context, drv: &dyn Driver, spec: UpdateSpec) -> SqlGraphResult<usize> {
    let set = assignments(&spec.fields, &spec.edges)?;
    let table = &spec.node.table;
    if !spec.edges.touches_other_tables() {
        if set.is_empty() {
            return Ok(0);
        }
        return exec_update(ctx, drv, table, &set, spec.scope().as_ref());
    }
    with_tx(ctx, drv, |tx| {
        let ids = select_ids(ctx, tx, table, &spec.node.id, spec.scope().as_ref())?;
        if ids.is_empty() {
            return Ok(0);
        }
        if ids.len() > 1 {
            check_unique_adds(&ids, &spec.edges)?;
        }
        let in_ids = Predicate::in_values(spec.node.id.column.clone(), ids.clone());
        exec_update(ctx, tx, table, &set, Some(&in_ids))?;
        apply_edges(ctx, tx, &ids, &spec.edges)?;
        debug!(table = %table, count = ids.len(), "nodes updated");
        Ok(ids.len())
    })
}

// Clears first, then sets, then deltas; a later write to a column wins.
fn assignments(fields: &FieldMut, edges: &EdgeMut) -> SqlGraphResult<UpdateSet> {
    let mut set = UpdateSet::default();
    for field in &fields.clear {
        set.set_null(field.column.as_str());
    }
    for edge in edges.clear.iter().filter(|e| e.owns_fk()) {
        set.set_null(edge.from_column()?);
    }
    for field in &fields.set {
        set.set(field.column.as_str(), field.value_or_null());
    }
    for edge in edges.add.iter().filter(|e| e.owns_fk()) {
        if let Some(node) = edge.target.nodes.first() {
            set.set(edge.from_column()?, node.clone());
        }
    }
    for field in &fields.add {
        set.add(field.column.as_str(), field.value_or_null());
    }
    Ok(set)
}

fn exec_update(
    ctx: &Context,
    drv: &dyn Driver,
    table: &str,
    set: &UpdateSet,
    predicate: Option<&Predicate>,
) -> SqlGraphResult<usize> {
    if set.is_empty() {
        return Ok(0);
    }
    let mut b = Builder::new(drv.dialect());
    b.push("UPDATE ").ident(table).push(" SET ");
    set.render_update(table, &mut b)?;
    where_clause(&mut b, table, predicate)?;
    let res = drv.exec(ctx, &b.finish())?;
    Ok(res.rows_affected as usize)
}

fn apply_edges(ctx: &Context, drv: &dyn Driver, ids: &[Value], edges: &EdgeMut) -> SqlGraphResult<()> {
    clear_edges(ctx, drv, ids, &edges.clear)?;
    for id in ids {
        add_edges(ctx, drv, id, &edges.add)?;
    }
    Ok(())
}

// A target of a unique external edge can only point back at one node.
fn check_unique_adds(ids: &[Value], edges: &EdgeMut) -> SqlGraphResult<()> {
    let unique = edges.add.iter().find(|e| {
        is_external(e) && e.rel != Rel::M2M && !e.target.nodes.is_empty()
    });
    match unique {
        Some(edge) => Err(ConstraintError::new(format!(
            "cannot connect {} {} to more than one node: {}",
            edge.table,
            display_ids(&edge.target.nodes),
            display_ids(ids)
        ))
        .into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeSpec, EdgeTarget, FieldSpec, NodeSpec};
    use entgraph_core::FieldType;
    use entgraph_dialect::mock::MockDriver;
    use entgraph_dialect::Dialect;
    use pretty_assertions::assert_eq;

    fn users(id: Option<i64>) -> NodeSpec {
        let mut node = NodeSpec::new("users", FieldSpec::new("id", FieldType::Int))
            .column(FieldSpec::new("name", FieldType::String));
        node.id.value = id.map(Value::Int);
        node
    }

    fn field(column: &str, value: Value) -> FieldSpec {
        let field_type = if value.is_numeric() {
            FieldType::Int
        } else {
            FieldType::String
        };
        FieldSpec::with_value(column, field_type, value).unwrap()
    }

    fn pets(nodes: Vec<i64>) -> EdgeSpec {
        EdgeSpec {
            rel: Rel::O2M,
            inverse: false,
            table: "pets".into(),
            columns: vec!["owner_id".into()],
            bidi: false,
            target: EdgeTarget {
                id_spec: FieldSpec::new("id", FieldType::Int),
                nodes: nodes.into_iter().map(Value::Int).collect(),
            },
        }
    }

    #[test]
    fn test_update_one_missing_is_not_found() {
        // GIVEN
        let drv = MockDriver::new(Dialect::Sqlite);
        let mut spec = UpdateSpec::new(users(Some(9)));
        spec.fields.set.push(field("name", Value::from("x")));

        // WHEN
        let err = update_node(&Context::background(), &drv, spec).unwrap_err();

        // THEN
        assert!(err.is_not_found());
        assert_eq!(
            drv.sql_log(),
            vec![
                "BEGIN",
                r#"SELECT "users"."id" FROM "users" WHERE "users"."id" = ?"#,
                "ROLLBACK",
            ]
        );
    }

    #[test]
    fn test_update_one_clear_set_add_and_reselect() {
        // GIVEN
        let drv = MockDriver::new(Dialect::Sqlite);
        drv.expect_query(&["id"], vec![vec![Value::Int(1)]])
            .expect_exec(1, None)
            .expect_query(&["id", "name"], vec![vec![Value::Int(1), Value::from("b")]]);
        let mut spec = UpdateSpec::new(users(Some(1)));
        spec.fields.clear.push(FieldSpec::new("nickname", FieldType::String));
        spec.fields.set.push(field("name", Value::from("b")));
        spec.fields.add.push(field("age", Value::Int(2)));

        // WHEN
        let record = update_node(&Context::background(), &drv, spec).unwrap();

        // THEN
        let log = drv.sql_log();
        assert_eq!(
            log[2],
            r#"UPDATE "users" SET "nickname" = NULL, "name" = ?, "age" = COALESCE("age", 0) + ? WHERE "users"."id" = ?"#
        );
        assert_eq!(
            log[3],
            r#"SELECT "users"."id", "users"."name" FROM "users" WHERE "users"."id" = ?"#
        );
        assert_eq!(record.get("name"), Some(&Value::from("b")));
    }

    #[test]
    fn test_update_many_without_edges_is_single_statement() {
        let drv = MockDriver::new(Dialect::Postgres);
        drv.expect_exec(4, None);
        let mut spec = UpdateSpec::new(users(None));
        spec.predicate = Some(Predicate::gt("age", 30));
        spec.fields.set.push(field("name", Value::from("x")));

        let n = update_nodes(&Context::background(), &drv, spec).unwrap();

        assert_eq!(n, 4);
        assert_eq!(
            drv.sql_log(),
            vec![r#"UPDATE "users" SET "name" = $1 WHERE "users"."age" > $2"#]
        );
    }

    #[test]
    fn test_update_many_unique_edge_to_several_nodes_fails() {
        // GIVEN
        let drv = MockDriver::new(Dialect::Sqlite);
        drv.expect_query(&["id"], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        let mut spec = UpdateSpec::new(users(None));
        spec.edges.add.push(pets(vec![7]));

        // WHEN
        let err = update_nodes(&Context::background(), &drv, spec).unwrap_err();

        // THEN
        assert!(err.is_constraint());
        assert_eq!(drv.sql_log().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_update_many_with_edges_returns_matched() {
        // GIVEN
        let drv = MockDriver::new(Dialect::Sqlite);
        drv.expect_query(&["id"], vec![vec![Value::Int(1)]])
            .expect_exec(1, None)
            .expect_exec(1, None);
        let mut spec = UpdateSpec::new(users(None));
        spec.edges.clear.push(pets(vec![]));
        spec.edges.add.push(pets(vec![7]));

        // WHEN
        let n = update_nodes(&Context::background(), &drv, spec).unwrap();

        // THEN
        assert_eq!(n, 1);
        assert_eq!(
            drv.sql_log(),
            vec![
                "BEGIN",
                r#"SELECT "users"."id" FROM "users""#,
                r#"UPDATE "pets" SET "owner_id" = NULL WHERE "owner_id" IN (?)"#,
                r#"UPDATE "pets" SET "owner_id" = ? WHERE "id" IN (?) AND "owner_id" IS NULL"#,
                "COMMIT",
            ]
        );
    }
}
