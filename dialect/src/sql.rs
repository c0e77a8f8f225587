//! Low-level statement builder.
//!
//! `Builder` accumulates SQL text and its positional arguments, delegating
//! identifier quoting and placeholder syntax to the `Dialect`. Statement
//! shapes (INSERT, UPDATE, ...) are composed by the callers.

use crate::Dialect;
use entgraph_core::Value;
use std::fmt;

/// A rendered statement with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Accumulates SQL text and arguments for one statement.
#[derive(Debug, Clone)]
pub struct Builder {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl Builder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier. A schema-qualified name (`schema.table`)
    /// is quoted part by part.
    pub fn ident(&mut self, name: &str) -> &mut Self {
        for (i, part) in name.split('.').enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            let quoted = self.dialect.quote(part);
            self.sql.push_str(&quoted);
        }
        self
    }

    /// Append `table.column`, both quoted.
    pub fn qualified(&mut self, table: &str, column: &str) -> &mut Self {
        self.ident(table).push(".").ident(column)
    }

    /// Append a comma-separated list of quoted identifiers.
    pub fn idents<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.ident(name.as_ref());
        }
        self
    }

    /// Append a placeholder bound to `value`.
    pub fn arg(&mut self, value: Value) -> &mut Self {
        self.args.push(value);
        let placeholder = self.dialect.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append comma-separated placeholders bound to `values`.
    pub fn args<I: IntoIterator<Item = Value>>(&mut self, values: I) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.arg(value);
        }
        self
    }

    /// Append `items` separated by `sep`, rendering each with `f`.
    pub fn join<T, F>(&mut self, items: impl IntoIterator<Item = T>, sep: &str, mut f: F) -> &mut Self
    where
        F: FnMut(&mut Builder, T),
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            f(self, item);
        }
        self
    }

    /// Append a nested builder's text and arguments, renumbering placeholders
    /// for dialects with numbered parameters.
    pub fn nested(&mut self, other: Builder) -> &mut Self {
        match self.dialect {
            Dialect::Postgres if !self.args.is_empty() && !other.args.is_empty() => {
                let offset = self.args.len();
                let renumbered = renumber(&other.sql, offset);
                self.sql.push_str(&renumbered);
            }
            _ => self.sql.push_str(&other.sql),
        }
        self.args.extend(other.args);
        self
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

// Shift `$n` placeholders by `offset`, leaving quoted text untouched.
fn renumber(sql: &str, offset: usize) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '$') => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    digits.push(*d);
                    chars.next();
                }
                match digits.parse::<usize>() {
                    Ok(n) => out.push_str(&format!("${}", n + offset)),
                    Err(_) => out.push('$'),
                }
            }
            (None, c) => out.push(c),
        }
    }
    out
}
