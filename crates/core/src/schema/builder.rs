//! Schema builder.
//!
//! Models and columns are declared against a `SchemaBuilder`; `build` validates
//! every expression, derives its base columns and source models, and registers
//! the dependency graph. The resulting [`Schema`] is immutable.

use super::column::{Column, ColumnKind};
use super::expr::Expr;
use super::model::Model;
use super::registry::DependencyRegistry;
use super::Schema;
use crate::error::{Error, Result};
use crate::ids::{ColumnId, ModelId};
use crate::types::DataType;
use crate::value::Value;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashSet;

/// Builder for schema trees.
pub struct SchemaBuilder {
    models: Vec<Model>,
    columns: Vec<Column>,
    /// Expression columns declared without a formula yet.
    pending: HashSet<ColumnId>,
}

impl SchemaBuilder {
    /// Creates a builder whose root model is named `root`.
    pub fn new(root: impl Into<String>) -> Result<Self> {
        let root = root.into();
        check_naming_rules(&root)?;
        Ok(Self {
            models: alloc::vec![Model::new(0, root, None, 0)],
            columns: Vec::new(),
            pending: HashSet::new(),
        })
    }

    /// Returns the root model id.
    #[inline]
    pub fn root(&self) -> ModelId {
        0
    }

    /// Adds a child model under `parent`.
    pub fn add_child_model(&mut self, parent: ModelId, name: impl Into<String>) -> Result<ModelId> {
        let name = name.into();
        check_naming_rules(&name)?;
        let depth = self.model(parent)?.depth() + 1;
        if self.models.iter().any(|m| m.name() == name) {
            return Err(Error::invalid_schema(format!("Model already exists: {}", name)));
        }
        let id = self.models.len();
        self.models.push(Model::new(id, name, Some(parent), depth));
        self.models[parent].push_child(id);
        Ok(id)
    }

    /// Adds a concrete column.
    pub fn add_column(
        &mut self,
        model: ModelId,
        name: impl Into<String>,
        data_type: DataType,
    ) -> Result<ColumnId> {
        self.push_column(model, name.into(), data_type, ColumnKind::Concrete)
    }

    /// Adds an expression column whose values are stored and kept up to date.
    pub fn add_expression(
        &mut self,
        model: ModelId,
        name: impl Into<String>,
        data_type: DataType,
        expr: Expr,
    ) -> Result<ColumnId> {
        self.push_column(model, name.into(), data_type, ColumnKind::Expression { expr, stored: true })
    }

    /// Adds an expression column evaluated on every read.
    ///
    /// It is promoted to a stored expression if another expression reads it.
    pub fn add_virtual_expression(
        &mut self,
        model: ModelId,
        name: impl Into<String>,
        data_type: DataType,
        expr: Expr,
    ) -> Result<ColumnId> {
        self.push_column(model, name.into(), data_type, ColumnKind::Expression { expr, stored: false })
    }

    /// Declares a stored expression column whose formula is supplied later
    /// with [`set_expression`](Self::set_expression).
    pub fn declare_expression(
        &mut self,
        model: ModelId,
        name: impl Into<String>,
        data_type: DataType,
    ) -> Result<ColumnId> {
        let kind = ColumnKind::Expression {
            expr: Expr::Literal(Value::Null),
            stored: true,
        };
        let id = self.push_column(model, name.into(), data_type, kind)?;
        self.pending.insert(id);
        Ok(id)
    }

    /// Sets the formula of an expression column.
    pub fn set_expression(&mut self, column: ColumnId, expr: Expr) -> Result<()> {
        let col = self.column_mut(column)?;
        let stored = match col.kind() {
            ColumnKind::Expression { stored, .. } => *stored,
            ColumnKind::Concrete => {
                return Err(Error::invalid_schema(format!(
                    "Column {} is not an expression",
                    col.name()
                )))
            }
        };
        col.set_kind(ColumnKind::Expression { expr, stored });
        self.pending.remove(&column);
        Ok(())
    }

    /// Sets whether a column accepts Null.
    pub fn set_nullable(&mut self, column: ColumnId, nullable: bool) -> Result<()> {
        self.column_mut(column)?.set_nullable(nullable);
        Ok(())
    }

    /// Sets the value new rows start with.
    pub fn set_default_value(&mut self, column: ColumnId, value: Value) -> Result<()> {
        let col = self.column_mut(column)?;
        if let Some(dt) = value.data_type() {
            if dt != col.data_type() {
                return Err(Error::type_mismatch(col.data_type(), dt));
            }
        }
        col.set_default_value(value);
        Ok(())
    }

    /// Validates the schema and registers the dependency graph.
    pub fn build(mut self) -> Result<Schema> {
        if let Some(&column) = self.pending.iter().next() {
            return Err(Error::invalid_schema(format!(
                "Expression not set for column: {}",
                self.columns[column].name()
            )));
        }

        for id in 0..self.columns.len() {
            self.resolve_sources(id)?;
        }

        let mut registry: Option<DependencyRegistry> = None;
        for id in 0..self.columns.len() {
            if !self.columns[id].is_expression() {
                continue;
            }
            let registry = registry.get_or_insert_with(DependencyRegistry::new);
            let bases = self.columns[id].base_columns().to_vec();
            for base in bases {
                registry.register(base, id, &mut self.columns, &self.models)?;
            }
        }

        // Constant expressions have no base column to register against but
        // still need a value on insert.
        if let Some(registry) = registry.as_mut() {
            for column in &self.columns {
                if column.is_stored() && column.is_expression() && column.base_columns().is_empty() {
                    registry.add_computation_column(column.model(), column.id());
                }
            }
        }

        Ok(Schema::new(self.models, self.columns, registry))
    }

    fn push_column(
        &mut self,
        model: ModelId,
        name: String,
        data_type: DataType,
        kind: ColumnKind,
    ) -> Result<ColumnId> {
        check_naming_rules(&name)?;
        let owner = self.model(model)?;
        if owner.columns().iter().any(|&c| self.columns[c].name() == name) {
            return Err(Error::invalid_schema(format!("Column already exists: {}", name)));
        }
        let id = self.columns.len();
        let slot = self.models[model].push_column(id);
        self.columns.push(Column::new(id, name, model, slot, data_type, kind));
        Ok(id)
    }

    /// Derives base columns and source models of an expression column and
    /// checks that every reference points at a reachable model.
    fn resolve_sources(&mut self, id: ColumnId) -> Result<()> {
        let column = &self.columns[id];
        let expr = match column.expression() {
            Some(expr) => expr,
            None => return Ok(()),
        };
        let own_model = column.model();

        let mut references = Vec::new();
        expr.visit_columns(&mut |c, aggregate| references.push((c, aggregate)));

        let mut scalar_models = Vec::new();
        let mut aggregate_models = Vec::new();
        for (referenced, aggregate) in references {
            let target = self.columns.get(referenced).ok_or_else(|| {
                Error::column_not_found(
                    self.models[own_model].name(),
                    format!("#{}", referenced),
                )
            })?;
            let source = target.model();
            if aggregate {
                if source == own_model || !is_ancestor(&self.models, own_model, source) {
                    return Err(Error::invalid_schema(format!(
                        "Aggregate in {} must read a descendant model, {} is not one",
                        self.columns[id].name(),
                        self.models[source].name()
                    )));
                }
                if !aggregate_models.contains(&source) {
                    aggregate_models.push(source);
                }
            } else {
                if source != own_model && !is_ancestor(&self.models, source, own_model) {
                    return Err(Error::invalid_schema(format!(
                        "Column {} reads {} which is neither its model nor an ancestor",
                        self.columns[id].name(),
                        self.models[source].name()
                    )));
                }
                if !scalar_models.contains(&source) {
                    scalar_models.push(source);
                }
            }
        }

        let bases = expr.base_columns();
        self.columns[id].set_sources(bases, scalar_models, aggregate_models);
        Ok(())
    }

    fn model(&self, id: ModelId) -> Result<&Model> {
        self.models
            .get(id)
            .ok_or_else(|| Error::model_not_found(format!("#{}", id)))
    }

    fn column_mut(&mut self, id: ColumnId) -> Result<&mut Column> {
        self.columns
            .get_mut(id)
            .ok_or_else(|| Error::column_not_found("?", format!("#{}", id)))
    }
}

/// Returns true if `ancestor` is a strict ancestor of `model`.
pub(crate) fn is_ancestor(models: &[Model], ancestor: ModelId, model: ModelId) -> bool {
    let mut current = models[model].parent();
    while let Some(m) = current {
        if m == ancestor {
            return true;
        }
        current = models[m].parent();
    }
    false
}

/// Validates a name follows naming rules.
fn check_naming_rules(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return Err(Error::invalid_schema("Name cannot be empty")),
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::invalid_schema(format!(
            "Name must start with letter or underscore: {}",
            name
        )));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_schema(format!(
            "Name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}
