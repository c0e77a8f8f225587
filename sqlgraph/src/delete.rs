use crate::query::where_clause;
use crate::spec::scope;
use crate::{DeleteSpec, SqlGraphResult};
use entgraph_core::Context;
use entgraph_dialect::sql::Builder;
use entgraph_dialect::Driver;

/// Delete the nodes selected by the spec, returning how many were removed.
/// Edge rows are left to the store's referential actions.
pub fn delete_nodes(ctx: &Context, drv: &dyn Driver, spec: DeleteSpec) -> SqlGraphResult<usize> {
    let table = &spec.node.table;
    let mut b = Builder::new(drv.dialect());
    b.push("DELETE FROM ").ident(table);
    where_clause(&mut b, table, scope(&spec.node, spec.predicate.clone()).as_ref())?;
    let res = drv.exec(ctx, &b.finish())?;
    Ok(res.rows_affected as usize)
}
