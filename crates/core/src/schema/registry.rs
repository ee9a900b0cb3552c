//! Dependency registry for computed columns.
//!
//! The registry records, for every column something reads, which expression
//! columns depend on it. Two views are kept:
//!
//! - `indirect`: the full transitive closure, used to answer "does X feed Y"
//!   when ordering recomputation.
//! - `direct`: only expressions that read the column literally, used to seed
//!   invalidation when a stored value changes.
//!
//! It also keeps, per model, the ordered list of columns to compute when a row
//! of that model is inserted, and the ordered list of ancestor-level columns
//! to invalidate when a row of that model is inserted or removed.

use super::column::Column;
use super::model::Model;
use crate::error::{Error, Result};
use crate::ids::{ColumnId, ModelId};
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};

/// Dependency graph between base columns and the expressions reading them.
#[derive(Clone, Debug, Default)]
pub struct DependencyRegistry {
    /// Base column -> every expression column that reads it, directly or transitively.
    indirect: HashMap<ColumnId, HashSet<ColumnId>>,
    /// Base column -> expression columns that read it literally, in registration order.
    direct: HashMap<ColumnId, Vec<ColumnId>>,
    /// Model -> columns computed for a freshly inserted row.
    computation_columns: HashMap<ModelId, Vec<ColumnId>>,
    /// Model -> ancestor-level columns aggregating over rows of this model.
    aggregate_columns: HashMap<ModelId, Vec<ColumnId>>,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `computed` reads `base`.
    ///
    /// Fails with [`Error::CircularComputation`] if `base` is `computed` or
    /// (transitively) reads it. A virtual `base` is forced to keep stored values.
    pub fn register(
        &mut self,
        base: ColumnId,
        computed: ColumnId,
        columns: &mut [Column],
        models: &[Model],
    ) -> Result<()> {
        let computed_name = qualified_name(&columns[computed], models);

        let mut stack = vec![base];
        let mut visited = HashSet::new();
        while let Some(column) = stack.pop() {
            if column == computed {
                return Err(Error::circular_computation(computed_name));
            }
            if !visited.insert(column) {
                continue;
            }
            self.indirect.entry(column).or_default().insert(computed);
            stack.extend_from_slice(columns[column].base_columns());
        }

        let dependents = self.direct.entry(base).or_default();
        if !dependents.contains(&computed) {
            dependents.push(computed);
        }
        columns[base].materialize();

        let computed_model = columns[computed].model();
        self.add_computation_column(computed_model, computed);

        // Aggregate edge: every model between the base model and the computed
        // model sees `computed` change when one of its rows comes or goes.
        let computed_depth = models[computed_model].depth();
        let mut model = columns[base].model();
        while models[model].depth() > computed_depth {
            let list = self.aggregate_columns.entry(model).or_default();
            insert_ordered(list, computed, &self.indirect);
            match models[model].parent() {
                Some(parent) => model = parent,
                None => break,
            }
        }
        Ok(())
    }

    /// Adds `column` to the insert-time computation list of `model`.
    pub fn add_computation_column(&mut self, model: ModelId, column: ColumnId) {
        let list = self.computation_columns.entry(model).or_default();
        insert_ordered(list, column, &self.indirect);
    }

    /// Returns the expressions that read `column` literally.
    pub fn direct_dependents(&self, column: ColumnId) -> &[ColumnId] {
        self.direct.get(&column).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Returns true if `dependent` reads `column`, directly or transitively.
    pub fn depends_on(&self, dependent: ColumnId, column: ColumnId) -> bool {
        self.indirect
            .get(&column)
            .map(|set| set.contains(&dependent))
            .unwrap_or(false)
    }

    /// Returns true if `column` has a direct dependent and so must hold values.
    pub fn is_watched(&self, column: ColumnId) -> bool {
        self.direct.get(&column).map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// Columns computed for a new row of `model`, dependencies first.
    pub fn computation_columns(&self, model: ModelId) -> &[ColumnId] {
        self.computation_columns
            .get(&model)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestor-level columns to invalidate when a row of `model` is inserted or removed.
    pub fn aggregate_columns(&self, model: ModelId) -> &[ColumnId] {
        self.aggregate_columns
            .get(&model)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the number of recorded direct edges.
    pub fn edge_count(&self) -> usize {
        self.direct.values().map(|v| v.len()).sum()
    }
}

/// Inserts `column` before the first entry that depends on it, or at the end.
fn insert_ordered(
    list: &mut Vec<ColumnId>,
    column: ColumnId,
    indirect: &HashMap<ColumnId, HashSet<ColumnId>>,
) {
    if list.contains(&column) {
        return;
    }
    let dependents = indirect.get(&column);
    let position = list
        .iter()
        .position(|existing| dependents.map(|d| d.contains(existing)).unwrap_or(false));
    match position {
        Some(index) => list.insert(index, column),
        None => list.push(column),
    }
}

fn qualified_name(column: &Column, models: &[Model]) -> alloc::string::String {
    format!("{}.{}", models[column.model()].name(), column.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnKind;
    use crate::schema::expr::Expr;
    use crate::types::DataType;

    fn models() -> Vec<Model> {
        let mut root = Model::new(0, "order".into(), None, 0);
        root.push_child(1);
        vec![root, Model::new(1, "line".into(), Some(0), 1)]
    }

    fn expr_column(id: ColumnId, model: ModelId, expr: Expr) -> Column {
        let bases = expr.base_columns();
        let mut col = Column::new(
            id,
            alloc::format!("c{}", id),
            model,
            id,
            DataType::Int64,
            ColumnKind::Expression { expr, stored: false },
        );
        col.set_sources(bases, Vec::new(), Vec::new());
        col
    }

    fn concrete(id: ColumnId, model: ModelId) -> Column {
        Column::new(id, alloc::format!("c{}", id), model, id, DataType::Int64, ColumnKind::Concrete)
    }

    #[test]
    fn test_register_chain_builds_closure() {
        let models = models();
        let mut columns = vec![
            concrete(0, 0),
            expr_column(1, 0, Expr::column(0)),
            expr_column(2, 0, Expr::column(1)),
        ];
        let mut registry = DependencyRegistry::new();
        registry.register(0, 1, &mut columns, &models).unwrap();
        registry.register(1, 2, &mut columns, &models).unwrap();

        assert_eq!(registry.direct_dependents(0), &[1]);
        assert_eq!(registry.direct_dependents(1), &[2]);
        assert!(registry.depends_on(2, 0));
        assert!(registry.depends_on(1, 0));
        assert!(!registry.depends_on(0, 2));
        assert_eq!(registry.computation_columns(0), &[1, 2]);
        assert_eq!(registry.edge_count(), 2);
    }

    #[test]
    fn test_direct_edge_materializes_base() {
        let models = models();
        let mut columns = vec![
            concrete(0, 0),
            expr_column(1, 0, Expr::column(0)),
            expr_column(2, 0, Expr::column(1)),
        ];
        let mut registry = DependencyRegistry::new();
        registry.register(0, 1, &mut columns, &models).unwrap();
        assert!(!columns[1].is_stored());
        registry.register(1, 2, &mut columns, &models).unwrap();
        assert!(columns[1].is_stored());
        assert!(!columns[2].is_stored());
        assert!(registry.is_watched(1));
        assert!(!registry.is_watched(2));
    }

    #[test]
    fn test_self_reference_is_circular() {
        let models = models();
        let mut columns = vec![expr_column(0, 0, Expr::column(0))];
        let mut registry = DependencyRegistry::new();
        let err = registry.register(0, 0, &mut columns, &models).unwrap_err();
        assert_eq!(err, Error::circular_computation("order.c0"));
    }

    #[test]
    fn test_transitive_cycle_is_circular() {
        let models = models();
        let mut columns = vec![
            expr_column(0, 0, Expr::column(2)),
            expr_column(1, 0, Expr::column(0)),
            expr_column(2, 0, Expr::column(1)),
        ];
        let mut registry = DependencyRegistry::new();
        let result = registry.register(1, 2, &mut columns, &models);
        assert!(matches!(result, Err(Error::CircularComputation { .. })));
    }

    #[test]
    fn test_computation_order_independent_of_registration_order() {
        let models = models();
        let mut columns = vec![
            concrete(0, 0),
            expr_column(1, 0, Expr::column(0)),
            expr_column(2, 0, Expr::column(1)),
        ];
        let mut registry = DependencyRegistry::new();
        registry.register(1, 2, &mut columns, &models).unwrap();
        registry.register(0, 1, &mut columns, &models).unwrap();
        assert_eq!(registry.computation_columns(0), &[1, 2]);
    }

    #[test]
    fn test_aggregate_columns_registered_on_source_model() {
        let models = models();
        let mut columns = vec![concrete(0, 1), expr_column(1, 0, Expr::sum(0))];
        let mut registry = DependencyRegistry::new();
        registry.register(0, 1, &mut columns, &models).unwrap();

        assert_eq!(registry.aggregate_columns(1), &[1]);
        assert!(registry.aggregate_columns(0).is_empty());
        assert_eq!(registry.computation_columns(0), &[1]);
    }
}
