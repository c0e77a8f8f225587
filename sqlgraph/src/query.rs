//! Node and edge reads.

use crate::{FieldSpec, NodeSpec, Predicate, QuerySpec, Rel, SqlGraphError, SqlGraphResult, Step};
use entgraph_core::{Context, Record, Value};
use entgraph_dialect::sql::Builder;
use entgraph_dialect::{Dialect, Driver};

/// Select the nodes matching a query, decoded by the node's column types.
pub fn query_nodes(ctx: &Context, drv: &dyn Driver, spec: &QuerySpec) -> SqlGraphResult<Vec<Record>> {
    let mut b = Builder::new(drv.dialect());
    select(&mut b, spec)?;
    let rows = drv.query(ctx, &b.finish())?;
    rows.rows
        .into_iter()
        .map(|row| decode_row(&spec.node.columns, row))
        .collect()
}

/// Ids of the nodes matching a query, in query order.
pub fn query_ids(ctx: &Context, drv: &dyn Driver, spec: &QuerySpec) -> SqlGraphResult<Vec<Value>> {
    let mut ids_only = spec.clone();
    ids_only.node.columns = vec![FieldSpec::new(
        spec.node.id.column.clone(),
        spec.node.id.field_type,
    )];
    let records = query_nodes(ctx, drv, &ids_only)?;
    Ok(records
        .into_iter()
        .filter_map(|mut r| r.take(&spec.node.id.column))
        .collect())
}

/// Number of nodes matching a query.
pub fn count_nodes(ctx: &Context, drv: &dyn Driver, spec: &QuerySpec) -> SqlGraphResult<usize> {
    let mut b = Builder::new(drv.dialect());
    if spec.limit.is_some() || spec.offset.is_some() {
        let mut inner = Builder::new(drv.dialect());
        let mut windowed = spec.clone();
        windowed.order.clear();
        select(&mut inner, &windowed)?;
        b.push("SELECT COUNT(*) FROM (").nested(inner).push(") AS ").ident("t1");
    } else {
        let table = &spec.node.table;
        b.push("SELECT COUNT(");
        if spec.unique {
            b.push("DISTINCT ").qualified(table, &spec.node.id.column);
        } else {
            b.push("*");
        }
        b.push(") FROM ").ident(table);
        where_clause(&mut b, table, spec.scope().as_ref())?;
    }
    let rows = drv.query(ctx, &b.finish())?;
    let count = rows
        .first_column()
        .into_iter()
        .next()
        .and_then(|v| v.as_int())
        .ok_or(SqlGraphError::NoRows)?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Ids of the nodes in `table` matching `predicate`.
pub(crate) fn select_ids(
    ctx: &Context,
    drv: &dyn Driver,
    table: &str,
    id: &FieldSpec,
    predicate: Option<&Predicate>,
) -> SqlGraphResult<Vec<Value>> {
    let mut b = Builder::new(drv.dialect());
    b.push("SELECT ")
        .qualified(table, &id.column)
        .push(" FROM ")
        .ident(table);
    where_clause(&mut b, table, predicate)?;
    let rows = drv.query(ctx, &b.finish())?;
    rows.first_column()
        .into_iter()
        .map(|raw| decode(id, raw))
        .collect()
}

fn select(b: &mut Builder, spec: &QuerySpec) -> SqlGraphResult<()> {
    let table = &spec.node.table;
    b.push(if spec.unique { "SELECT DISTINCT " } else { "SELECT " })
        .join(&spec.node.columns, ", ", |b, c| {
            b.qualified(table, &c.column);
        })
        .push(" FROM ")
        .ident(table);
    where_clause(b, table, spec.scope().as_ref())?;
    if !spec.order.is_empty() {
        b.push(" ORDER BY ").join(&spec.order, ", ", |b, o| {
            b.qualified(table, &o.column)
                .push(if o.desc { " DESC" } else { " ASC" });
        });
    }
    window(b, spec.limit, spec.offset);
    Ok(())
}

fn window(b: &mut Builder, limit: Option<usize>, offset: Option<usize>) {
    match (limit, offset, b.dialect()) {
        (Some(limit), _, _) => {
            b.push(&format!(" LIMIT {limit}"));
        }
        // OFFSET requires a LIMIT outside Postgres.
        (None, Some(_), Dialect::Sqlite) => {
            b.push(" LIMIT -1");
        }
        (None, Some(_), Dialect::MySql) => {
            b.push(" LIMIT 18446744073709551615");
        }
        _ => {}
    }
    if let Some(offset) = offset {
        b.push(&format!(" OFFSET {offset}"));
    }
}

pub(crate) fn where_clause(
    b: &mut Builder,
    table: &str,
    predicate: Option<&Predicate>,
) -> SqlGraphResult<()> {
    if let Some(p) = predicate {
        b.push(" WHERE ");
        p.render(table, b)?;
    }
    Ok(())
}

fn decode(spec: &FieldSpec, raw: Value) -> SqlGraphResult<Value> {
    spec.field_type
        .decode(raw)
        .map_err(|source| SqlGraphError::Scan {
            column: spec.column.clone(),
            source,
        })
}

fn decode_row(columns: &[FieldSpec], row: Vec<Value>) -> SqlGraphResult<Record> {
    let mut record = Record::new();
    for (spec, raw) in columns.iter().zip(row) {
        record.insert(spec.column.clone(), decode(spec, raw)?);
    }
    Ok(record)
}

/// Eager load of the neighbors of a set of nodes through one edge.
#[derive(Debug, Clone)]
pub struct EdgeLoadSpec {
    pub step: Step,
    /// Ids of the start nodes, or their FK values when the start table
    /// owns the FK.
    pub keys: Vec<Value>,
    /// The neighbor table and the columns to read.
    pub node: NodeSpec,
    pub predicate: Option<Predicate>,
}

/// Load neighbors, each paired with the key it was reached from.
///
/// When the start table owns the FK the key is the neighbor's id; for O2M
/// edges it is the neighbor's FK value; for M2M edges it is the join-table
/// column pointing at the start node.
pub fn load_edges(
    ctx: &Context,
    drv: &dyn Driver,
    spec: &EdgeLoadSpec,
) -> SqlGraphResult<Vec<(Value, Record)>> {
    if spec.keys.is_empty() {
        return Ok(Vec::new());
    }
    let step = &spec.step;
    let table = &spec.node.table;
    let columns = &spec.node.columns;
    let mut b = Builder::new(drv.dialect());
    b.push("SELECT ");
    let key_at_front = step.rel == Rel::M2M;
    if key_at_front {
        b.qualified(&step.edge_table, step.from_column()?).push(", ");
    }
    b.join(columns, ", ", |b, c| {
        b.qualified(table, &c.column);
    });
    let key_column = if step.owns_fk() {
        b.push(" FROM ").ident(table).push(" WHERE ").qualified(table, &step.to_id);
        None
    } else if key_at_front {
        let from = step.from_column()?;
        b.push(" FROM ")
            .ident(table)
            .push(" JOIN ")
            .ident(&step.edge_table)
            .push(" ON ")
            .qualified(&step.edge_table, step.to_column()?)
            .push(" = ")
            .qualified(table, &step.to_id)
            .push(" WHERE ")
            .qualified(&step.edge_table, from);
        None
    } else {
        let fk = step.from_column()?;
        b.push(", ")
            .qualified(table, fk)
            .push(" FROM ")
            .ident(table)
            .push(" WHERE ")
            .qualified(table, fk);
        Some(fk)
    };
    b.push(" IN (").args(spec.keys.iter().cloned()).push(")");
    if let Some(p) = &spec.predicate {
        b.push(" AND ");
        p.render(table, &mut b)?;
    }

    let rows = drv.query(ctx, &b.finish())?;
    let mut out = Vec::with_capacity(rows.len());
    for mut row in rows.rows {
        let key = if key_at_front {
            if row.is_empty() {
                return Err(SqlGraphError::NoRows);
            }
            Some(row.remove(0))
        } else if key_column.is_some() {
            row.pop()
        } else {
            None
        };
        let record = decode_row(columns, row)?;
        let key = match key {
            Some(key) => key,
            None => record
                .get(&spec.node.id.column)
                .cloned()
                .unwrap_or(Value::Null),
        };
        out.push((key, record));
    }
    Ok(out)
}
