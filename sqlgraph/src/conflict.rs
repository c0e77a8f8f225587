//! Upsert resolution.
//!
//! Conflict options are registered in order and folded left to right into a
//! single `OnConflict`: later options overwrite what earlier ones set for the
//! same column. `UpdateSet` is also the assignment list of plain UPDATEs.

use crate::{SqlGraphError, SqlGraphResult};
use entgraph_core::Value;
use entgraph_dialect::sql::Builder;
use entgraph_dialect::Dialect;
use std::fmt;
use std::sync::Arc;

/// Custom resolver run against the update set of an upsert.
pub type ResolveFn = Arc<dyn Fn(&mut UpdateSet) + Send + Sync>;

/// One registered upsert option.
#[derive(Clone)]
pub enum ConflictOption {
    /// Conflict target columns.
    Columns(Vec<String>),
    /// Named conflict target constraint.
    Constraint(String),
    /// Leave the existing row untouched.
    DoNothing,
    /// Keep every existing value, but still return the existing row.
    ResolveWithIgnore,
    /// Overwrite every inserted column with the proposed value.
    ResolveWithNewValues,
    ResolveWith(ResolveFn),
}

impl ConflictOption {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConflictOption::Columns(columns.into_iter().map(Into::into).collect())
    }

    pub fn resolve_with<F>(f: F) -> Self
    where
        F: Fn(&mut UpdateSet) + Send + Sync + 'static,
    {
        ConflictOption::ResolveWith(Arc::new(f))
    }
}

impl fmt::Debug for ConflictOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictOption::Columns(cols) => f.debug_tuple("Columns").field(cols).finish(),
            ConflictOption::Constraint(name) => f.debug_tuple("Constraint").field(name).finish(),
            ConflictOption::DoNothing => f.write_str("DoNothing"),
            ConflictOption::ResolveWithIgnore => f.write_str("ResolveWithIgnore"),
            ConflictOption::ResolveWithNewValues => f.write_str("ResolveWithNewValues"),
            ConflictOption::ResolveWith(_) => f.write_str("ResolveWith(..)"),
        }
    }
}

/// Right-hand side of one assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    Value(Value),
    /// The value proposed for insertion.
    Excluded,
    /// The existing value.
    Ignore,
    Null,
    /// Existing value (NULL counts as zero) plus a delta.
    Add(Value),
}

/// Ordered column assignments; a column appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSet {
    columns: Vec<String>,
    assignments: Vec<(String, Assign)>,
}

impl UpdateSet {
    /// An empty set over the columns of an insert.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            assignments: Vec::new(),
        }
    }

    /// Columns of the insert being resolved.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn assignments(&self) -> &[(String, Assign)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Assign> {
        self.assignments
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, a)| a)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) -> &mut Self {
        self.put(column.into(), Assign::Value(value))
    }

    pub fn set_excluded(&mut self, column: impl Into<String>) -> &mut Self {
        self.put(column.into(), Assign::Excluded)
    }

    pub fn set_ignore(&mut self, column: impl Into<String>) -> &mut Self {
        self.put(column.into(), Assign::Ignore)
    }

    pub fn set_null(&mut self, column: impl Into<String>) -> &mut Self {
        self.put(column.into(), Assign::Null)
    }

    pub fn add(&mut self, column: impl Into<String>, delta: Value) -> &mut Self {
        self.put(column.into(), Assign::Add(delta))
    }

    fn put(&mut self, column: String, assign: Assign) -> &mut Self {
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => *existing = assign,
            None => self.assignments.push((column, assign)),
        }
        self
    }

    /// Render `col = expr, ...` for a plain UPDATE of `table`.
    pub(crate) fn render_update(&self, table: &str, b: &mut Builder) -> SqlGraphResult<()> {
        self.render(table, Target::Update, b)
    }

    fn render(&self, table: &str, target: Target, b: &mut Builder) -> SqlGraphResult<()> {
        let dialect = b.dialect();
        for (i, (column, assign)) in self.assignments.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.ident(column).push(" = ");
            match assign {
                Assign::Value(v) => {
                    b.arg(v.clone());
                }
                Assign::Null => {
                    b.push("NULL");
                }
                Assign::Excluded => match (target, dialect) {
                    (Target::Update, _) => {
                        return Err(SqlGraphError::invalid_spec(format!(
                            "column {column} references an excluded value outside an upsert"
                        )))
                    }
                    (Target::Upsert, Dialect::MySql) => {
                        b.push("VALUES(").ident(column).push(")");
                    }
                    (Target::Upsert, _) => {
                        b.push("excluded.").ident(column);
                    }
                },
                Assign::Ignore => {
                    existing(table, column, target, b);
                }
                Assign::Add(delta) => {
                    b.push("COALESCE(");
                    existing(table, column, target, b);
                    b.push(", 0) + ").arg(delta.clone());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Update,
    Upsert,
}

// Reference to the current value of a column. Postgres upserts need the
// table qualifier to tell the existing row from `excluded`.
fn existing(table: &str, column: &str, target: Target, b: &mut Builder) {
    if target == Target::Upsert && b.dialect() == Dialect::Postgres {
        b.qualified(table, column);
    } else {
        b.ident(column);
    }
}

/// What happens to a conflicting row.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    Update(UpdateSet),
}

/// The resolved ON CONFLICT clause of an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    pub target: Vec<String>,
    pub constraint: Option<String>,
    pub action: ConflictAction,
}

/// Fold the registered options over the insert's columns. Returns `None`
/// when no option was registered.
pub fn resolve(options: &[ConflictOption], insert_columns: &[String]) -> Option<OnConflict> {
    if options.is_empty() {
        return None;
    }
    let mut target = Vec::new();
    let mut constraint = None;
    let mut set: Option<UpdateSet> = None;
    for option in options {
        match option {
            ConflictOption::Columns(cols) => target = cols.clone(),
            ConflictOption::Constraint(name) => constraint = Some(name.clone()),
            ConflictOption::DoNothing => set = None,
            ConflictOption::ResolveWithIgnore => {
                let set = set.get_or_insert_with(|| UpdateSet::new(insert_columns.to_vec()));
                for column in insert_columns {
                    set.set_ignore(column.as_str());
                }
            }
            ConflictOption::ResolveWithNewValues => {
                let set = set.get_or_insert_with(|| UpdateSet::new(insert_columns.to_vec()));
                for column in insert_columns {
                    set.set_excluded(column.as_str());
                }
            }
            ConflictOption::ResolveWith(f) => {
                f(set.get_or_insert_with(|| UpdateSet::new(insert_columns.to_vec())))
            }
        }
    }
    let action = match set {
        Some(set) if !set.is_empty() => ConflictAction::Update(set),
        _ => ConflictAction::DoNothing,
    };
    Some(OnConflict {
        target,
        constraint,
        action,
    })
}

impl OnConflict {
    /// Append the clause to an INSERT into `table` keyed by `id_column`.
    pub(crate) fn render(&self, table: &str, id_column: &str, b: &mut Builder) -> SqlGraphResult<()> {
        if b.dialect() == Dialect::MySql {
            b.push(" ON DUPLICATE KEY UPDATE ");
            match &self.action {
                // MySQL has no DO NOTHING; a self-assignment changes nothing.
                ConflictAction::DoNothing => {
                    b.ident(id_column).push(" = ").ident(id_column);
                }
                ConflictAction::Update(set) => set.render(table, Target::Upsert, b)?,
            }
            return Ok(());
        }

        b.push(" ON CONFLICT");
        match (&self.constraint, self.target.is_empty()) {
            (Some(name), _) if b.dialect() == Dialect::Postgres => {
                b.push(" ON CONSTRAINT ").ident(name);
            }
            (_, false) => {
                b.push(" (").idents(&self.target).push(")");
            }
            _ if b.dialect() == Dialect::Postgres
                && matches!(self.action, ConflictAction::Update(_)) =>
            {
                return Err(SqlGraphError::invalid_spec(
                    "missing conflict target for DO UPDATE",
                ))
            }
            _ => {}
        }
        match &self.action {
            ConflictAction::DoNothing => {
                b.push(" DO NOTHING");
            }
            ConflictAction::Update(set) => {
                b.push(" DO UPDATE SET ");
                set.render(table, Target::Upsert, b)?;
            }
        }
        Ok(())
    }
}
