//! Expression evaluation against rows of a data tree.

use crate::tree::DataTree;
use alloc::vec::Vec;
use cambium_core::schema::{eval_aggregate, AggregateFunc, Column, EvalContext, Expr};
use cambium_core::{ColumnId, ModelId, RowId, Value};

/// Resolves column reads relative to one row.
///
/// Reads always see committed values, never an edit buffer.
pub(crate) struct RowContext<'a> {
    tree: &'a DataTree,
    row: RowId,
}

impl<'a> RowContext<'a> {
    pub(crate) fn new(tree: &'a DataTree, row: RowId) -> Self {
        Self { tree, row }
    }
}

impl EvalContext for RowContext<'_> {
    fn scalar(&self, column: ColumnId) -> Value {
        let col = match self.tree.schema.column(column) {
            Some(col) => col,
            None => return Value::Null,
        };
        match self.tree.row_of_model(self.row, col.model()) {
            Some(row) => self.tree.read_committed(row, col),
            None => Value::Null,
        }
    }

    fn aggregate(&self, func: AggregateFunc, column: ColumnId) -> Value {
        let schema = &self.tree.schema;
        let (col, model) = match (schema.column(column), self.tree.row_model(self.row)) {
            (Some(col), Some(model)) => (col, model),
            _ => return Value::Null,
        };
        let path = match schema.descent_path(model, col.model()) {
            Some(path) => path,
            None => return Value::Null,
        };
        let values: Vec<Value> = self
            .tree
            .descendants(self.row, &path)
            .into_iter()
            .map(|row| self.tree.read_committed(row, col))
            .collect();
        eval_aggregate(func, values.iter())
    }
}

impl DataTree {
    pub(crate) fn evaluate_expr(&self, expr: &Expr, row: RowId) -> Value {
        expr.evaluate(&RowContext::new(self, row))
    }

    /// Evaluates the formula of an expression column, Null for concrete columns.
    pub(crate) fn evaluate_column(&self, column: &Column, row: RowId) -> Value {
        match column.expression() {
            Some(expr) => self.evaluate_expr(expr, row),
            None => Value::Null,
        }
    }

    /// Reads the committed value of a column, evaluating virtual expressions.
    pub(crate) fn read_committed(&self, row: RowId, column: &Column) -> Value {
        if column.is_stored() {
            return self
                .rows
                .get(&row)
                .and_then(|node| node.values.get(column.slot()))
                .cloned()
                .unwrap_or(Value::Null);
        }
        self.evaluate_column(column, row).coerce(column.data_type())
    }

    /// Walks up from `row` to the nearest row of `model`, itself included.
    pub(crate) fn row_of_model(&self, row: RowId, model: ModelId) -> Option<RowId> {
        let mut current = row;
        loop {
            let node = self.rows.get(&current)?;
            if node.model? == model {
                return Some(current);
            }
            current = node.parent?;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::DataTree;
    use alloc::rc::Rc;
    use alloc::vec;
    use cambium_core::schema::{Expr, SchemaBuilder};
    use cambium_core::{DataType, Error, Value};

    fn upper(args: &[Value]) -> Value {
        match args.first().and_then(|v| v.as_str()) {
            Some(s) => Value::String(s.to_uppercase()),
            None => Value::Null,
        }
    }

    #[test]
    fn test_virtual_expression_evaluated_on_read() {
        let mut b = SchemaBuilder::new("customer").unwrap();
        let name = b.add_column(0, "name", DataType::String).unwrap();
        let shout = b
            .add_virtual_expression(0, "shout", DataType::String, Expr::call("upper", upper, vec![Expr::column(name)]))
            .unwrap();
        let schema = Rc::new(b.build().unwrap());
        assert!(!schema.column(shout).unwrap().is_stored());

        let mut tree = DataTree::new(schema);
        let root = tree.root_data_set();
        let row = tree.append_row(root).unwrap();
        tree.set_value(row, name, Value::String("ada".into())).unwrap();
        assert_eq!(tree.get_value(row, shout).unwrap(), Value::String("ADA".into()));
        assert_eq!(tree.stats().recomputes(), 0);
        assert!(matches!(
            tree.set_value(row, shout, Value::Null),
            Err(Error::ReadOnlyColumn { .. })
        ));
    }

    #[test]
    fn test_free_standing_expression() {
        let mut b = SchemaBuilder::new("order").unwrap();
        let rate = b.add_column(0, "rate", DataType::Float64).unwrap();
        let line = b.add_child_model(0, "line").unwrap();
        let qty = b.add_column(line, "qty", DataType::Int64).unwrap();
        let schema = Rc::new(b.build().unwrap());

        let mut tree = DataTree::new(schema);
        let root = tree.root_data_set();
        let order = tree.append_row(root).unwrap();
        tree.set_value(order, rate, Value::Float64(0.5)).unwrap();
        let lines = tree.child_data_set(order, line).unwrap();
        for n in [2i64, 4] {
            let l = tree.append_row(lines).unwrap();
            tree.set_value(l, qty, Value::Int64(n)).unwrap();
        }

        let total = Expr::mul(Expr::sum(qty), Expr::column(rate));
        assert_eq!(tree.evaluate(order, &total).unwrap(), Value::Float64(3.0));
        assert_eq!(tree.evaluate(order, &Expr::count(qty)).unwrap(), Value::Int64(2));

        // From a line, the order column resolves on the parent and the
        // aggregate has nothing below it.
        let first = tree.data_set_rows(lines).unwrap()[0];
        assert_eq!(tree.evaluate(first, &Expr::column(rate)).unwrap(), Value::Float64(0.5));
        assert_eq!(tree.evaluate(first, &Expr::sum(qty)).unwrap(), Value::Null);
    }
}
