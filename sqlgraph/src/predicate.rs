//! Composable filters over node columns and edges.

use crate::{owns_fk, Rel, SqlGraphError, SqlGraphResult};
use entgraph_core::Value;
use entgraph_dialect::sql::Builder;
use entgraph_dialect::Dialect;

/// Comparison operator of a column predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => " = ",
            CmpOp::Ne => " <> ",
            CmpOp::Gt => " > ",
            CmpOp::Ge => " >= ",
            CmpOp::Lt => " < ",
            CmpOp::Le => " <= ",
        }
    }
}

/// Pattern operator of a string predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Contains,
    HasPrefix,
    HasSuffix,
    EqualFold,
}

/// One hop from a node table to the nodes it is connected to.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub rel: Rel,
    pub inverse: bool,
    pub bidi: bool,
    /// Id column of the table the hop starts from.
    pub from_id: String,
    /// Table holding the FK, or the join table.
    pub edge_table: String,
    /// FK column, or `[owner, target]` join-table columns.
    pub edge_columns: Vec<String>,
    pub to_table: String,
    pub to_id: String,
}

impl Step {
    fn column(&self, index: usize) -> SqlGraphResult<&str> {
        self.edge_columns
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                SqlGraphError::invalid_spec(format!(
                    "step through {} is missing column #{}",
                    self.edge_table, index
                ))
            })
    }

    /// The FK column, or the join-table column pointing at the start node.
    pub(crate) fn from_column(&self) -> SqlGraphResult<&str> {
        self.column(usize::from(self.rel == Rel::M2M && self.inverse))
    }

    /// The join-table column pointing at the end node.
    pub(crate) fn to_column(&self) -> SqlGraphResult<&str> {
        self.column(usize::from(!self.inverse))
    }

    pub(crate) fn owns_fk(&self) -> bool {
        owns_fk(self.rel, self.inverse, self.bidi)
    }
}

/// A filter tree rendered into a WHERE fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Cmp {
        column: String,
        op: CmpOp,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negate: bool,
    },
    Null {
        column: String,
        negate: bool,
    },
    Match {
        column: String,
        op: MatchOp,
        value: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Nodes with at least one neighbor through `step`, optionally
    /// restricted to neighbors matching the inner predicate.
    HasEdge {
        step: Step,
        with: Option<Box<Predicate>>,
    },
}

macro_rules! cmp_constructor {
    ($($name:ident => $op:ident),+ $(,)?) => {
        $(
            pub fn $name(column: impl Into<String>, value: impl Into<Value>) -> Self {
                Predicate::Cmp {
                    column: column.into(),
                    op: CmpOp::$op,
                    value: value.into(),
                }
            }
        )+
    };
}

impl Predicate {
    cmp_constructor! {
        eq => Eq,
        ne => Ne,
        gt => Gt,
        ge => Ge,
        lt => Lt,
        le => Le,
    }

    pub fn in_values<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: false,
        }
    }

    pub fn not_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: true,
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::Null {
            column: column.into(),
            negate: false,
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Predicate::Null {
            column: column.into(),
            negate: true,
        }
    }

    pub fn contains(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::matching(column, MatchOp::Contains, value)
    }

    pub fn has_prefix(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::matching(column, MatchOp::HasPrefix, value)
    }

    pub fn has_suffix(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::matching(column, MatchOp::HasSuffix, value)
    }

    pub fn equal_fold(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::matching(column, MatchOp::EqualFold, value)
    }

    fn matching(column: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Predicate::Match {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    pub fn has_edge(step: Step) -> Self {
        Predicate::HasEdge { step, with: None }
    }

    pub fn has_edge_with(step: Step, predicate: Predicate) -> Self {
        Predicate::HasEdge {
            step,
            with: Some(Box::new(predicate)),
        }
    }

    /// Render the predicate with columns qualified by `table`.
    pub fn render(&self, table: &str, b: &mut Builder) -> SqlGraphResult<()> {
        match self {
            Predicate::Cmp {
                column,
                op: op @ (CmpOp::Eq | CmpOp::Ne),
                value: Value::Null,
            } => {
                let sql = if *op == CmpOp::Eq { " IS NULL" } else { " IS NOT NULL" };
                b.qualified(table, column).push(sql);
            }
            Predicate::Cmp { column, op, value } => {
                b.qualified(table, column).push(op.as_sql()).arg(value.clone());
            }
            Predicate::In { values, negate, .. } if values.is_empty() => {
                b.push(if *negate { "1 = 1" } else { "1 = 0" });
            }
            Predicate::In {
                column,
                values,
                negate,
            } => {
                b.qualified(table, column)
                    .push(if *negate { " NOT IN (" } else { " IN (" })
                    .args(values.iter().cloned())
                    .push(")");
            }
            Predicate::Null { column, negate } => {
                b.qualified(table, column)
                    .push(if *negate { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::Match { column, op, value } => render_match(table, column, *op, value, b),
            Predicate::And(ps) => render_list(table, ps, " AND ", "1 = 1", b)?,
            Predicate::Or(ps) => render_list(table, ps, " OR ", "1 = 0", b)?,
            Predicate::Not(p) => {
                b.push("NOT (");
                p.render(table, b)?;
                b.push(")");
            }
            Predicate::HasEdge { step, with } => render_has_edge(table, step, with.as_deref(), b)?,
        }
        Ok(())
    }
}

fn render_list(
    table: &str,
    ps: &[Predicate],
    sep: &str,
    empty: &str,
    b: &mut Builder,
) -> SqlGraphResult<()> {
    match ps {
        [] => {
            b.push(empty);
        }
        [p] => p.render(table, b)?,
        _ => {
            b.push("(");
            for (i, p) in ps.iter().enumerate() {
                if i > 0 {
                    b.push(sep);
                }
                p.render(table, b)?;
            }
            b.push(")");
        }
    }
    Ok(())
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_match(table: &str, column: &str, op: MatchOp, value: &str, b: &mut Builder) {
    if op == MatchOp::EqualFold {
        b.push("LOWER(")
            .qualified(table, column)
            .push(") = LOWER(")
            .arg(Value::from(value))
            .push(")");
        return;
    }
    let escaped = escape_like(value);
    let pattern = match op {
        MatchOp::Contains => format!("%{}%", escaped),
        MatchOp::HasPrefix => format!("{}%", escaped),
        _ => format!("%{}", escaped),
    };
    b.qualified(table, column).push(" LIKE ").arg(Value::String(pattern));
    if b.dialect() != Dialect::MySql {
        b.push(" ESCAPE '\\'");
    }
}

fn render_has_edge(
    table: &str,
    step: &Step,
    with: Option<&Predicate>,
    b: &mut Builder,
) -> SqlGraphResult<()> {
    let fk = step.from_column()?;
    if step.owns_fk() {
        // The FK sits on the start row.
        b.qualified(table, fk);
        let Some(p) = with else {
            b.push(" IS NOT NULL");
            return Ok(());
        };
        b.push(" IN (SELECT ")
            .qualified(&step.to_table, &step.to_id)
            .push(" FROM ")
            .ident(&step.to_table)
            .push(" WHERE ");
        p.render(&step.to_table, b)?;
        b.push(")");
        return Ok(());
    }

    b.qualified(table, &step.from_id).push(" IN (SELECT ");
    if step.rel == Rel::M2M {
        b.qualified(&step.edge_table, fk)
            .push(" FROM ")
            .ident(&step.edge_table);
        if let Some(p) = with {
            let to = step.to_column()?;
            b.push(" JOIN ")
                .ident(&step.to_table)
                .push(" ON ")
                .qualified(&step.edge_table, to)
                .push(" = ")
                .qualified(&step.to_table, &step.to_id)
                .push(" WHERE ");
            p.render(&step.to_table, b)?;
        }
    } else {
        // O2M/O2O: the FK sits on the end rows.
        b.qualified(&step.edge_table, fk)
            .push(" FROM ")
            .ident(&step.edge_table)
            .push(" WHERE ")
            .qualified(&step.edge_table, fk)
            .push(" IS NOT NULL");
        if let Some(p) = with {
            b.push(" AND ");
            p.render(&step.to_table, b)?;
        }
    }
    b.push(")");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(p: &Predicate) -> (String, Vec<Value>) {
        let mut b = Builder::new(Dialect::Sqlite);
        p.render("users", &mut b).unwrap();
        let stmt = b.finish();
        (stmt.sql, stmt.args)
    }

    fn pets_step() -> Step {
        Step {
            rel: Rel::O2M,
            inverse: false,
            bidi: false,
            from_id: "id".into(),
            edge_table: "pets".into(),
            edge_columns: vec!["owner_id".into()],
            to_table: "pets".into(),
            to_id: "id".into(),
        }
    }

    #[test]
    fn test_render_nested_tree() {
        // GIVEN
        let p = Predicate::and(vec![
            Predicate::ge("age", 30),
            Predicate::or(vec![
                Predicate::eq("name", "a8m"),
                Predicate::not(Predicate::in_values("role", ["admin", "owner"])),
            ]),
        ]);

        // WHEN
        let (sql, args) = render(&p);

        // THEN
        assert_eq!(
            sql,
            r#"("users"."age" >= ? AND ("users"."name" = ? OR NOT ("users"."role" IN (?, ?))))"#
        );
        assert_eq!(
            args,
            vec![Value::Int(30), Value::from("a8m"), Value::from("admin"), Value::from("owner")]
        );
    }

    #[test]
    fn test_empty_lists_render_constants() {
        assert_eq!(render(&Predicate::and(vec![])).0, "1 = 1");
        assert_eq!(render(&Predicate::or(vec![])).0, "1 = 0");
        assert_eq!(render(&Predicate::in_values("id", Vec::<i64>::new())).0, "1 = 0");
    }

    #[test]
    fn test_eq_null_renders_is_null() {
        assert_eq!(render(&Predicate::eq("nickname", Value::Null)).0, r#""users"."nickname" IS NULL"#);
        assert_eq!(render(&Predicate::ne("nickname", Value::Null)).0, r#""users"."nickname" IS NOT NULL"#);
    }

    #[test]
    fn test_like_escapes_wildcards() {
        let (sql, args) = render(&Predicate::contains("name", "50%_off"));

        assert_eq!(sql, r#""users"."name" LIKE ? ESCAPE '\'"#);
        assert_eq!(args, vec![Value::from("%50\\%\\_off%")]);
    }

    #[test]
    fn test_has_edge_o2m() {
        let (sql, _) = render(&Predicate::has_edge(pets_step()));

        assert_eq!(
            sql,
            r#""users"."id" IN (SELECT "pets"."owner_id" FROM "pets" WHERE "pets"."owner_id" IS NOT NULL)"#
        );
    }

    #[test]
    fn test_has_edge_with_m2m() {
        // GIVEN
        let step = Step {
            rel: Rel::M2M,
            inverse: true,
            bidi: false,
            from_id: "id".into(),
            edge_table: "group_users".into(),
            edge_columns: vec!["group_id".into(), "user_id".into()],
            to_table: "groups".into(),
            to_id: "id".into(),
        };

        // WHEN
        let (sql, args) = render(&Predicate::has_edge_with(step, Predicate::eq("name", "GitHub")));

        // THEN
        assert_eq!(
            sql,
            r#""users"."id" IN (SELECT "group_users"."user_id" FROM "group_users" JOIN "groups" ON "group_users"."group_id" = "groups"."id" WHERE "groups"."name" = ?)"#
        );
        assert_eq!(args, vec![Value::from("GitHub")]);
    }

    #[test]
    fn test_has_edge_with_m2o() {
        let step = Step {
            rel: Rel::M2O,
            inverse: true,
            bidi: false,
            from_id: "id".into(),
            edge_table: "pets".into(),
            edge_columns: vec!["owner_id".into()],
            to_table: "users".into(),
            to_id: "id".into(),
        };
        let mut b = Builder::new(Dialect::Postgres);

        Predicate::has_edge_with(step, Predicate::eq("name", "a8m"))
            .render("pets", &mut b)
            .unwrap();

        assert_eq!(
            b.finish().sql,
            r#""pets"."owner_id" IN (SELECT "users"."id" FROM "users" WHERE "users"."name" = $1)"#
        );
    }
}
