//! Edge writes that touch tables other than the node's own row.

use crate::{ConstraintError, EdgeSpec, Rel, SqlGraphResult};
use entgraph_core::{Context, Value};
use entgraph_dialect::sql::Builder;
use entgraph_dialect::Driver;
use tracing::debug;

/// Whether an edge needs statements beyond the node's own row.
pub(crate) fn is_external(edge: &EdgeSpec) -> bool {
    !edge.owns_fk() || edge.bidi
}

/// Connect node `id` to the targets of every external edge.
pub(crate) fn add_edges(
    ctx: &Context,
    drv: &dyn Driver,
    id: &Value,
    edges: &[EdgeSpec],
) -> SqlGraphResult<()> {
    for edge in edges.iter().filter(|e| is_external(e)) {
        if edge.target.nodes.is_empty() {
            continue;
        }
        match edge.rel {
            Rel::M2M => add_m2m(ctx, drv, id, edge)?,
            _ => add_fk(ctx, drv, id, edge)?,
        }
    }
    Ok(())
}

// Point the FK of every target row at `id`. Targets already pointing
// elsewhere are left untouched and reported.
fn add_fk(ctx: &Context, drv: &dyn Driver, id: &Value, edge: &EdgeSpec) -> SqlGraphResult<()> {
    let fk = edge.from_column()?;
    let nodes = &edge.target.nodes;
    let mut b = Builder::new(drv.dialect());
    b.push("UPDATE ")
        .ident(&edge.table)
        .push(" SET ")
        .ident(fk)
        .push(" = ")
        .arg(id.clone())
        .push(" WHERE ")
        .ident(&edge.target.id_spec.column)
        .push(" IN (")
        .args(nodes.iter().cloned())
        .push(") AND ")
        .ident(fk)
        .push(" IS NULL");
    let res = drv.exec(ctx, &b.finish())?;
    if (res.rows_affected as usize) < nodes.len() {
        return Err(ConstraintError::new(format!(
            "one of {} is already connected to a different {}",
            display_ids(nodes),
            fk
        ))
        .into());
    }
    Ok(())
}

fn add_m2m(ctx: &Context, drv: &dyn Driver, id: &Value, edge: &EdgeSpec) -> SqlGraphResult<()> {
    let from = edge.from_column()?;
    let to = edge.to_column()?;
    let mut pairs: Vec<(Value, Value)> = Vec::new();
    for node in &edge.target.nodes {
        let pair = (id.clone(), node.clone());
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
        if edge.bidi {
            let reverse = (node.clone(), id.clone());
            if !pairs.contains(&reverse) {
                pairs.push(reverse);
            }
        }
    }
    let mut b = Builder::new(drv.dialect());
    b.push("INSERT INTO ")
        .ident(&edge.table)
        .push(" (")
        .ident(from)
        .push(", ")
        .ident(to)
        .push(") VALUES ")
        .join(pairs, ", ", |b, (a, z)| {
            b.push("(").arg(a).push(", ").arg(z).push(")");
        });
    drv.exec(ctx, &b.finish())?;
    Ok(())
}

/// Remove connections of the nodes `ids`. An edge without target nodes
/// drops every connection; with nodes, only the connections to them.
pub(crate) fn clear_edges(
    ctx: &Context,
    drv: &dyn Driver,
    ids: &[Value],
    edges: &[EdgeSpec],
) -> SqlGraphResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    for edge in edges.iter().filter(|e| is_external(e)) {
        let mut b = Builder::new(drv.dialect());
        let nodes = &edge.target.nodes;
        match edge.rel {
            Rel::M2M => {
                let from = edge.from_column()?;
                let to = edge.to_column()?;
                b.push("DELETE FROM ").ident(&edge.table).push(" WHERE ");
                if edge.bidi {
                    b.push("(");
                    pair_filter(&mut b, from, ids, to, nodes);
                    b.push(") OR (");
                    pair_filter(&mut b, to, ids, from, nodes);
                    b.push(")");
                } else {
                    pair_filter(&mut b, from, ids, to, nodes);
                }
            }
            _ => {
                let fk = edge.from_column()?;
                b.push("UPDATE ")
                    .ident(&edge.table)
                    .push(" SET ")
                    .ident(fk)
                    .push(" = NULL WHERE ");
                pair_filter(&mut b, fk, ids, &edge.target.id_spec.column, nodes);
            }
        }
        let stmt = b.finish();
        let res = drv.exec(ctx, &stmt)?;
        debug!(table = %edge.table, rows = res.rows_affected, "edges cleared");
    }
    Ok(())
}

fn pair_filter(b: &mut Builder, left: &str, ids: &[Value], right: &str, nodes: &[Value]) {
    b.ident(left)
        .push(" IN (")
        .args(ids.iter().cloned())
        .push(")");
    if !nodes.is_empty() {
        b.push(" AND ")
            .ident(right)
            .push(" IN (")
            .args(nodes.iter().cloned())
            .push(")");
    }
}

pub(crate) fn display_ids(ids: &[Value]) -> String {
    let parts: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}
