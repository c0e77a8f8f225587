//! Node inserts.

use crate::edges::{add_edges, is_external};
use crate::{
    resolve, with_tx, BatchCreateSpec, ConflictOption, CreateSpec, SqlGraphError, SqlGraphResult,
};
use entgraph_core::{Context, FieldType, Value};
use entgraph_dialect::sql::{Builder, Statement};
use entgraph_dialect::{Dialect, Driver};
use tracing::debug;

/// Insert one node and connect its edges, returning the node id.
///
/// The insert and the edge statements run in one transaction whenever edges
/// need statements beyond the inserted row.
pub fn create_node(ctx: &Context, drv: &dyn Driver, spec: CreateSpec) -> SqlGraphResult<Value> {
    if spec.edges.iter().any(is_external) {
        with_tx(ctx, drv, |tx| insert_node(ctx, tx, &spec))
    } else {
        insert_node(ctx, drv, &spec)
    }
}

/// Insert many nodes of one table with a single multi-row INSERT and
/// connect their edges. Ids are returned in input order.
pub fn batch_create(
    ctx: &Context,
    drv: &dyn Driver,
    spec: BatchCreateSpec,
) -> SqlGraphResult<Vec<Value>> {
    if spec.nodes.is_empty() {
        return Ok(Vec::new());
    }
    let external = spec
        .nodes
        .iter()
        .any(|n| n.edges.iter().any(is_external));
    if external {
        with_tx(ctx, drv, |tx| insert_batch(ctx, tx, &spec))
    } else {
        insert_batch(ctx, drv, &spec)
    }
}

fn insert_node(ctx: &Context, drv: &dyn Driver, spec: &CreateSpec) -> SqlGraphResult<Value> {
    let (columns, values) = row(spec)?;
    let stmt = insert_statement(
        drv,
        &spec.table,
        spec.id_column(),
        &columns,
        vec![values],
        &spec.on_conflict,
    )?;
    let id = if drv.dialect().supports_returning() {
        let returned = drv.query(ctx, &stmt)?.first_column().into_iter().next();
        match (returned, spec.supplied_id()) {
            (Some(raw), _) => decode_id(spec, raw)?,
            // The conflicting row was left untouched.
            (None, Some(id)) => id.clone(),
            (None, None) => return Err(SqlGraphError::NoRows),
        }
    } else {
        let res = drv.exec(ctx, &stmt)?;
        match (spec.supplied_id(), res.last_insert_id) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => Value::Int(id),
            (None, None) => return Err(SqlGraphError::NoRows),
        }
    };
    debug!(table = %spec.table, id = %id, "node created");
    add_edges(ctx, drv, &id, &spec.edges)?;
    Ok(id)
}

fn insert_batch(
    ctx: &Context,
    drv: &dyn Driver,
    spec: &BatchCreateSpec,
) -> SqlGraphResult<Vec<Value>> {
    let first = &spec.nodes[0];
    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(spec.nodes.len());
    for node in &spec.nodes {
        if node.table != first.table {
            return Err(SqlGraphError::invalid_spec(format!(
                "batch mixes tables {} and {}",
                first.table, node.table
            )));
        }
        let (cols, values) = row(node)?;
        for col in &cols {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
        rows.push((cols, values));
    }
    // Union of the columns; a row missing one writes NULL.
    let rows: Vec<Vec<Value>> = rows
        .into_iter()
        .map(|(cols, values)| {
            columns
                .iter()
                .map(|c| {
                    cols.iter()
                        .position(|x| x == c)
                        .map_or(Value::Null, |i| values[i].clone())
                })
                .collect()
        })
        .collect();

    let stmt = insert_statement(
        drv,
        &first.table,
        first.id_column(),
        &columns,
        rows,
        &spec.on_conflict,
    )?;
    let supplied: Option<Vec<Value>> = spec
        .nodes
        .iter()
        .map(|n| n.supplied_id().cloned())
        .collect();
    let ids = if drv.dialect().supports_returning() {
        let returned = drv.query(ctx, &stmt)?.first_column();
        match supplied {
            _ if returned.len() == spec.nodes.len() => returned
                .into_iter()
                .map(|raw| decode_id(first, raw))
                .collect::<SqlGraphResult<Vec<_>>>()?,
            Some(ids) => ids,
            None => {
                return Err(SqlGraphError::invalid_spec(format!(
                    "batch insert returned {} ids for {} nodes",
                    returned.len(),
                    spec.nodes.len()
                )))
            }
        }
    } else {
        let res = drv.exec(ctx, &stmt)?;
        match (supplied, res.last_insert_id) {
            (Some(ids), _) => ids,
            // MySQL reports the first id of a multi-row insert.
            (None, Some(start)) => (0..spec.nodes.len() as i64)
                .map(|i| Value::Int(start + i))
                .collect(),
            (None, None) => return Err(SqlGraphError::NoRows),
        }
    };
    debug!(table = %first.table, count = ids.len(), "nodes created");
    for (node, id) in spec.nodes.iter().zip(&ids) {
        add_edges(ctx, drv, id, &node.edges)?;
    }
    Ok(ids)
}

// Columns and values written by one insert: the supplied id, the fields
// and the FK columns of edges owned by the row.
fn row(spec: &CreateSpec) -> SqlGraphResult<(Vec<String>, Vec<Value>)> {
    let mut columns: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    let mut put = |column: &str, value: Value| {
        match columns.iter().position(|c| c == column) {
            Some(i) => values[i] = value,
            None => {
                columns.push(column.to_string());
                values.push(value);
            }
        }
    };
    if let Some(id) = spec.supplied_id() {
        put(spec.id_column(), id.clone());
    }
    for field in &spec.fields {
        if let Some(value) = &field.value {
            put(&field.column, value.clone());
        }
    }
    for edge in spec.edges.iter().filter(|e| e.owns_fk()) {
        if let Some(node) = edge.target.nodes.first() {
            put(edge.from_column()?, node.clone());
        }
    }
    Ok((columns, values))
}

fn insert_statement(
    drv: &dyn Driver,
    table: &str,
    id_column: &str,
    columns: &[String],
    rows: Vec<Vec<Value>>,
    on_conflict: &[ConflictOption],
) -> SqlGraphResult<Statement> {
    let dialect = drv.dialect();
    let mut b = Builder::new(dialect);
    b.push("INSERT INTO ").ident(table);
    if columns.is_empty() {
        match dialect {
            Dialect::MySql => b.push(" () VALUES ").join(&rows, ", ", |b, _| {
                b.push("()");
            }),
            _ => b.push(" DEFAULT VALUES"),
        };
    } else {
        b.push(" (")
            .idents(columns)
            .push(") VALUES ")
            .join(rows, ", ", |b, values| {
                b.push("(").args(values).push(")");
            });
    }
    if let Some(clause) = resolve(on_conflict, columns) {
        clause.render(table, id_column, &mut b)?;
    }
    if dialect.supports_returning() {
        b.push(" RETURNING ").ident(id_column);
    }
    Ok(b.finish())
}

fn decode_id(spec: &CreateSpec, raw: Value) -> SqlGraphResult<Value> {
    let field_type = spec.id.as_ref().map_or(FieldType::Int, |id| id.field_type);
    field_type
        .decode(raw)
        .map_err(|source| SqlGraphError::Scan {
            column: spec.id_column().to_string(),
            source,
        })
}
