//! SQL annotations attached to entities, fields, edges and indexes.
//!
//! Annotations are plain metadata. The runtime reads a few of them (table
//! names and their schema, default referential actions); the rest are carried for
//! the external migration engine. Both kinds merge field-by-field so several
//! partial annotations can be stacked on one schema element.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Action taken by the store on a referenced row's deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceOption {
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
}

impl ReferenceOption {
    /// SQL spelling of the action.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferenceOption::NoAction => "NO ACTION",
            ReferenceOption::Restrict => "RESTRICT",
            ReferenceOption::Cascade => "CASCADE",
            ReferenceOption::SetNull => "SET NULL",
            ReferenceOption::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferenceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Entity, field or edge level SQL annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    /// Schema holding the entity's tables (an attached database on SQLite).
    /// Tables are then addressed as `schema.table`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Overrides the table name derived from the entity name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Literal column default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Column default expression, e.g. `lower(name)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<String>,
    /// Per-dialect default expressions, keyed by dialect name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default_exprs: BTreeMap<String, String>,
    /// Additional table options, e.g. `ENGINE = INNODB`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Default action for foreign keys declared on the annotated element.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ReferenceOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Named check constraints.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, String>,
    /// The element is not managed by migrations.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

impl Annotation {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn schema_table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: Some(table.into()),
            ..Self::default()
        }
    }

    pub fn on_delete(option: ReferenceOption) -> Self {
        Self {
            on_delete: Some(option),
            ..Self::default()
        }
    }

    pub fn check(expr: impl Into<String>) -> Self {
        Self {
            check: Some(expr.into()),
            ..Self::default()
        }
    }

    pub fn checks(checks: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            checks: checks.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn skip() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }

    /// Overlay `other` on top of `self`. Set values in `other` win; maps are
    /// merged key by key.
    pub fn merge(mut self, other: Annotation) -> Self {
        macro_rules! take {
            ($($field:ident),+) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })+
            };
        }
        take!(schema, table, charset, collation, default, default_expr, options, size, on_delete, check);
        self.default_exprs.extend(other.default_exprs);
        self.checks.extend(other.checks);
        self.skip |= other.skip;
        self
    }
}

/// Index level SQL annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexAnnotation {
    /// Prefix length of a single string column index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u32>,
    /// Prefix lengths of a multi-column index, keyed by column.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub prefix_columns: BTreeMap<String, u32>,
    /// Descending order for a single column index.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub desc: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub desc_columns: BTreeMap<String, bool>,
    /// Non-key columns stored in the index (`INCLUDE`).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_columns: Vec<String>,
    /// Index method, e.g. `GIN` or `FULLTEXT`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub index_type: Option<String>,
    /// Per-dialect index methods, keyed by dialect name.
    #[serde(rename = "types", skip_serializing_if = "BTreeMap::is_empty")]
    pub index_types: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op_class: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub op_class_columns: BTreeMap<String, String>,
    /// Predicate of a partial index.
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
}

impl IndexAnnotation {
    pub fn prefix(length: u32) -> Self {
        Self {
            prefix: Some(length),
            ..Self::default()
        }
    }

    pub fn prefix_column(column: impl Into<String>, length: u32) -> Self {
        Self {
            prefix_columns: BTreeMap::from([(column.into(), length)]),
            ..Self::default()
        }
    }

    pub fn desc() -> Self {
        Self {
            desc: true,
            ..Self::default()
        }
    }

    pub fn desc_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            desc_columns: columns.into_iter().map(|c| (c.into(), true)).collect(),
            ..Self::default()
        }
    }

    pub fn include_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn index_type(method: impl Into<String>) -> Self {
        Self {
            index_type: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn op_class(op: impl Into<String>) -> Self {
        Self {
            op_class: Some(op.into()),
            ..Self::default()
        }
    }

    pub fn op_class_column(column: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            op_class_columns: BTreeMap::from([(column.into(), op.into())]),
            ..Self::default()
        }
    }

    pub fn where_clause(predicate: impl Into<String>) -> Self {
        Self {
            where_clause: Some(predicate.into()),
            ..Self::default()
        }
    }

    /// The index method for a dialect, preferring a dialect-specific entry.
    pub fn type_for(&self, dialect: &str) -> Option<&str> {
        self.index_types
            .get(dialect)
            .or(self.index_type.as_ref())
            .map(String::as_str)
    }

    /// Overlay `other` on top of `self`. Included columns accumulate.
    pub fn merge(mut self, other: IndexAnnotation) -> Self {
        if other.prefix.is_some() {
            self.prefix = other.prefix;
        }
        self.prefix_columns.extend(other.prefix_columns);
        if other.op_class.is_some() {
            self.op_class = other.op_class;
        }
        self.op_class_columns.extend(other.op_class_columns);
        self.desc |= other.desc;
        self.desc_columns.extend(other.desc_columns);
        self.include_columns.extend(other.include_columns);
        if other.index_type.is_some() {
            self.index_type = other.index_type;
        }
        self.index_types.extend(other.index_types);
        if other.where_clause.is_some() {
            self.where_clause = other.where_clause;
        }
        self
    }
}
