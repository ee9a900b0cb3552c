//! Schema module for Cambium.
//!
//! This module contains the schema tree (models), column definitions, the
//! expression language computed columns are written in, and the dependency
//! registry built from them.

mod builder;
mod column;
mod expr;
mod model;
mod registry;

pub use builder::SchemaBuilder;
pub use column::{Column, ColumnKind};
pub use expr::{
    eval_aggregate, eval_binary_op, eval_unary_op, AggregateFunc, BinaryOp, EvalContext, Expr,
    ScalarFn, UnaryOp,
};
pub use model::Model;
pub use registry::DependencyRegistry;

use crate::ids::{ColumnId, ModelId};
use alloc::vec::Vec;

/// An immutable schema tree with its dependency registry.
#[derive(Clone, Debug)]
pub struct Schema {
    models: Vec<Model>,
    columns: Vec<Column>,
    /// Created when the first expression column is registered.
    registry: Option<DependencyRegistry>,
}

impl Schema {
    pub(crate) fn new(
        models: Vec<Model>,
        columns: Vec<Column>,
        registry: Option<DependencyRegistry>,
    ) -> Self {
        Self {
            models,
            columns,
            registry,
        }
    }

    /// Returns the root model.
    #[inline]
    pub fn root(&self) -> &Model {
        &self.models[0]
    }

    #[inline]
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    /// Gets a model by name.
    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name() == name)
    }

    /// Gets a column of `model` by name.
    pub fn column_by_name(&self, model: ModelId, name: &str) -> Option<&Column> {
        self.models
            .get(model)?
            .columns()
            .iter()
            .map(|&c| &self.columns[c])
            .find(|c| c.name() == name)
    }

    /// Returns the dependency registry, if any expression column exists.
    #[inline]
    pub fn registry(&self) -> Option<&DependencyRegistry> {
        self.registry.as_ref()
    }

    /// Returns the expressions that read `column` literally.
    pub fn direct_dependents(&self, column: ColumnId) -> &[ColumnId] {
        self.registry
            .as_ref()
            .map(|r| r.direct_dependents(column))
            .unwrap_or(&[])
    }

    /// Returns true if `dependent` reads `column`, directly or transitively.
    pub fn depends_on(&self, dependent: ColumnId, column: ColumnId) -> bool {
        self.registry
            .as_ref()
            .map(|r| r.depends_on(dependent, column))
            .unwrap_or(false)
    }

    /// Columns computed for a new row of `model`, dependencies first.
    pub fn computation_columns(&self, model: ModelId) -> &[ColumnId] {
        self.registry
            .as_ref()
            .map(|r| r.computation_columns(model))
            .unwrap_or(&[])
    }

    /// Ancestor-level columns to invalidate when a row of `model` comes or goes.
    pub fn aggregate_columns(&self, model: ModelId) -> &[ColumnId] {
        self.registry
            .as_ref()
            .map(|r| r.aggregate_columns(model))
            .unwrap_or(&[])
    }

    /// Returns true if `ancestor` is a strict ancestor of `model`.
    pub fn is_ancestor(&self, ancestor: ModelId, model: ModelId) -> bool {
        builder::is_ancestor(&self.models, ancestor, model)
    }

    /// Returns the models strictly below `from` down to and including `to`.
    ///
    /// Returns None if `to` is not a strict descendant of `from`.
    pub fn descent_path(&self, from: ModelId, to: ModelId) -> Option<Vec<ModelId>> {
        let mut path = Vec::new();
        let mut current = to;
        while current != from {
            path.push(current);
            current = self.models.get(current)?.parent()?;
        }
        if path.is_empty() {
            return None;
        }
        path.reverse();
        Some(path)
    }
}
