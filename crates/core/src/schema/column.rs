//! Column definition for Cambium schemas.

use super::expr::Expr;
use crate::ids::{ColumnId, ModelId};
use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;
use alloc::vec::Vec;

/// How a column gets its values.
#[derive(Clone, Debug)]
pub enum ColumnKind {
    /// Values are written by callers and stored per row.
    Concrete,
    /// Values are computed from `expr`.
    ///
    /// A stored expression keeps its last computed value per row and is
    /// recomputed by the engine; a virtual one is evaluated on every read.
    Expression { expr: Expr, stored: bool },
}

/// A column definition in a model.
#[derive(Clone, Debug)]
pub struct Column {
    /// Column index in the schema.
    id: ColumnId,
    /// Column name, unique within its model.
    name: String,
    /// Owning model.
    model: ModelId,
    /// Position of this column's value in a row of its model.
    slot: usize,
    /// Data type of the column.
    data_type: DataType,
    /// Whether this column allows null values.
    nullable: bool,
    /// Default value for new rows.
    default_value: Option<Value>,
    kind: ColumnKind,
    /// Columns read by the expression, empty for concrete columns.
    base_columns: Vec<ColumnId>,
    /// Models whose rows feed scalar reads.
    scalar_source_models: Vec<ModelId>,
    /// Models whose rows feed aggregates.
    aggregate_source_models: Vec<ModelId>,
}

impl Column {
    pub(crate) fn new(
        id: ColumnId,
        name: String,
        model: ModelId,
        slot: usize,
        data_type: DataType,
        kind: ColumnKind,
    ) -> Self {
        Self {
            id,
            name,
            model,
            slot,
            data_type,
            nullable: data_type.is_nullable_by_default(),
            default_value: None,
            kind,
            base_columns: Vec::new(),
            scalar_source_models: Vec::new(),
            aggregate_source_models: Vec::new(),
        }
    }

    pub(crate) fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    pub(crate) fn set_default_value(&mut self, value: Value) {
        self.default_value = Some(value);
    }

    pub(crate) fn set_kind(&mut self, kind: ColumnKind) {
        self.kind = kind;
    }

    pub(crate) fn set_sources(
        &mut self,
        base_columns: Vec<ColumnId>,
        scalar_source_models: Vec<ModelId>,
        aggregate_source_models: Vec<ModelId>,
    ) {
        self.base_columns = base_columns;
        self.scalar_source_models = scalar_source_models;
        self.aggregate_source_models = aggregate_source_models;
    }

    /// Forces a virtual expression to keep stored values.
    ///
    /// Returns true if the column changed.
    pub(crate) fn materialize(&mut self) -> bool {
        match &mut self.kind {
            ColumnKind::Expression { stored, .. } if !*stored => {
                *stored = true;
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn id(&self) -> ColumnId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn model(&self) -> ModelId {
        self.model
    }

    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    /// Returns true for computed columns, stored or virtual.
    #[inline]
    pub fn is_expression(&self) -> bool {
        matches!(self.kind, ColumnKind::Expression { .. })
    }

    /// Returns true if rows hold a value for this column.
    ///
    /// That is every concrete column and every stored expression.
    #[inline]
    pub fn is_stored(&self) -> bool {
        match self.kind {
            ColumnKind::Concrete => true,
            ColumnKind::Expression { stored, .. } => stored,
        }
    }

    /// Returns the formula of an expression column.
    pub fn expression(&self) -> Option<&Expr> {
        match &self.kind {
            ColumnKind::Expression { expr, .. } => Some(expr),
            ColumnKind::Concrete => None,
        }
    }

    #[inline]
    pub fn base_columns(&self) -> &[ColumnId] {
        &self.base_columns
    }

    #[inline]
    pub fn scalar_source_models(&self) -> &[ModelId] {
        &self.scalar_source_models
    }

    #[inline]
    pub fn aggregate_source_models(&self) -> &[ModelId] {
        &self.aggregate_source_models
    }

    /// Returns the value a new row starts with.
    pub fn get_default_value(&self) -> Value {
        self.default_value.clone().unwrap_or_else(|| {
            if self.nullable {
                Value::Null
            } else {
                Value::default_for_type(self.data_type)
            }
        })
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.data_type == other.data_type
    }
}
