//! Schema definition types.

use crate::{Annotation, IndexAnnotation, ReferenceOption};
use entgraph_core::{FieldType, Value};
use regex_lite::Regex;
use std::fmt;
use std::sync::Arc;

/// Default value of a field, either a constant or computed per insert.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Func(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the value to write.
    pub fn get(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Func(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => write!(f, "Value({:?})", v),
            DefaultValue::Func(_) => write!(f, "Func(..)"),
        }
    }
}

/// User-supplied field validator.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>);

impl Validator {
    pub fn new(f: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Field definition within an entity.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Column name; defaults to the field name.
    pub column: String,
    /// Semantic type.
    pub field_type: FieldType,
    /// Not required on create.
    pub optional: bool,
    /// May hold NULL.
    pub nullable: bool,
    /// Must be unique across rows.
    pub unique: bool,
    /// Cannot be changed after creation.
    pub immutable: bool,
    /// Value written on create when the field is not set.
    pub default: Option<DefaultValue>,
    /// Value written on update when the field is not set.
    pub update_default: Option<DefaultValue>,
    /// Allowed members of an Enum field.
    pub enum_values: Vec<String>,
    /// Minimum value (Int, Float).
    pub min: Option<Value>,
    /// Maximum value (Int, Float).
    pub max: Option<Value>,
    /// Minimum length (String, Bytes).
    pub length_min: Option<usize>,
    /// Maximum length (String, Bytes).
    pub length_max: Option<usize>,
    /// Regex a String value must match.
    pub match_pattern: Option<String>,
    /// Compiled `match_pattern`, filled in by the schema builder.
    pub(crate) matcher: Option<Regex>,
    /// User validators, run after the built-in checks.
    pub validators: Vec<Validator>,
    pub annotation: Option<Annotation>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            field_type,
            optional: false,
            nullable: false,
            unique: false,
            immutable: false,
            default: None,
            update_default: None,
            enum_values: Vec::new(),
            min: None,
            max: None,
            length_min: None,
            length_max: None,
            match_pattern: None,
            matcher: None,
            validators: Vec::new(),
            annotation: None,
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Time)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bytes)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FieldType::Enum);
        field.enum_values = values.into_iter().map(Into::into).collect();
        field
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Func(Arc::new(f)));
        self
    }

    pub fn update_default_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.update_default = Some(DefaultValue::Func(Arc::new(f)));
        self
    }

    pub fn range(mut self, min: Option<Value>, max: Option<Value>) -> Self {
        if min.is_some() {
            self.min = min;
        }
        if max.is_some() {
            self.max = max;
        }
        self
    }

    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.length_min = min;
        self.length_max = max;
        self
    }

    pub fn not_empty(self) -> Self {
        self.length(Some(1), None)
    }

    pub fn match_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_pattern = Some(pattern.into());
        self
    }

    pub fn validate(mut self, f: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.validators.push(Validator::new(f));
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotation = Some(match self.annotation.take() {
            Some(existing) => existing.merge(annotation),
            None => annotation,
        });
        self
    }

    /// Whether the field must be provided on create.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// Whether the field may be cleared (set to NULL).
    pub fn is_clearable(&self) -> bool {
        self.optional || self.nullable
    }
}

/// Relation kind of an edge, seen from the entity that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    O2O,
    O2M,
    M2O,
    M2M,
}

impl Relation {
    /// Edges that point to at most one node.
    pub fn is_unique(&self) -> bool {
        matches!(self, Relation::O2O | Relation::M2O)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::O2O => "O2O",
            Relation::O2M => "O2M",
            Relation::M2O => "M2O",
            Relation::M2M => "M2M",
        };
        f.write_str(s)
    }
}

/// Edge definition within an entity.
#[derive(Debug, Clone)]
pub struct EdgeDef {
    /// Edge name.
    pub name: String,
    /// Target entity name.
    pub target: String,
    pub relation: Relation,
    /// This side is the back-reference of an edge declared on the target.
    pub inverse: bool,
    /// Table holding the FK column, or the join table of an M2M edge.
    pub table: String,
    /// FK column, or `[owner, target]` join-table columns of an M2M edge.
    pub columns: Vec<String>,
    /// Symmetric edge (e.g. friends, spouse).
    pub bidi: bool,
    /// Must be set on create.
    pub required: bool,
    /// Entity field storing the FK of a unique edge.
    pub field: Option<String>,
    pub on_delete: Option<ReferenceOption>,
}

impl EdgeDef {
    pub fn new(name: impl Into<String>, target: impl Into<String>, relation: Relation) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            relation,
            inverse: false,
            table: String::new(),
            columns: Vec::new(),
            bidi: false,
            required: false,
            field: None,
            on_delete: None,
        }
    }

    pub fn o2o(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Relation::O2O)
    }

    pub fn o2m(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Relation::O2M)
    }

    pub fn m2o(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Relation::M2O)
    }

    pub fn m2m(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Relation::M2M)
    }

    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns = vec![column.into()];
        self
    }

    pub fn columns(mut self, owner: impl Into<String>, target: impl Into<String>) -> Self {
        self.columns = vec![owner.into(), target.into()];
        self
    }

    pub fn bidi(mut self) -> Self {
        self.bidi = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn on_delete(mut self, option: ReferenceOption) -> Self {
        self.on_delete = Some(option);
        self
    }

    pub fn is_unique(&self) -> bool {
        self.relation.is_unique()
    }

    /// Whether the FK lives on the declaring entity's own row.
    pub fn owns_fk(&self) -> bool {
        match self.relation {
            Relation::M2O => true,
            Relation::O2O => self.inverse || self.bidi,
            Relation::O2M | Relation::M2M => false,
        }
    }
}

/// Index definition within an entity.
#[derive(Debug, Clone, Default)]
pub struct IndexDef {
    pub name: Option<String>,
    /// Field names covered by the index.
    pub fields: Vec<String>,
    /// Edge names whose FK columns are covered by the index.
    pub edges: Vec<String>,
    pub unique: bool,
    pub annotation: IndexAnnotation,
}

impl IndexDef {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn edges<I, S>(mut self, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges = edges.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn annotate(mut self, annotation: IndexAnnotation) -> Self {
        self.annotation = std::mem::take(&mut self.annotation).merge(annotation);
        self
    }
}

/// Entity definition.
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Entity name.
    pub name: String,
    /// Table name.
    pub table: String,
    /// ID field.
    pub id: FieldDef,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Edges in declaration order.
    pub edges: Vec<EdgeDef>,
    pub indexes: Vec<IndexDef>,
    pub annotation: Option<Annotation>,
}

impl EntityDef {
    /// Get a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get an edge definition by name.
    pub fn edge(&self, name: &str) -> Option<&EdgeDef> {
        self.edges.iter().find(|e| e.name == name)
    }

    /// The unique edge whose FK is stored in `field`, if any.
    pub fn edge_by_field(&self, field: &str) -> Option<&EdgeDef> {
        self.edges
            .iter()
            .find(|e| e.field.as_deref() == Some(field))
    }

    /// FK columns on this entity's table that are not exposed as fields.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &EdgeDef> {
        self.edges
            .iter()
            .filter(|e| e.owns_fk() && e.field.is_none())
    }

    /// All selectable columns: id, fields, then hidden FK columns.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(1 + self.fields.len());
        columns.push(self.id.column.clone());
        columns.extend(self.fields.iter().map(|f| f.column.clone()));
        for column in self.foreign_keys().filter_map(|e| e.columns.first()) {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}
