//! Row edit transactions and row notification suspension.
//!
//! At most one row per model holds the edit slot. While a row is being
//! edited, writes to its concrete columns go to an [`EditBuffer`] and raise
//! nothing; commit writes the touched columns back in one computation bracket
//! and reports them as a single value-changed event.

use crate::row::{EditBuffer, RowNode, RowState};
use crate::tree::DataTree;
use alloc::format;
use alloc::rc::Rc;
use cambium_core::{DataSetId, Error, ModelId, Result, RowId, Value};
use cambium_reactive::DataEvent;

impl DataTree {
    /// Starts editing an attached row.
    pub fn begin_edit(&mut self, row: RowId) -> Result<()> {
        let node = self.node(row)?;
        if !node.is_attached() {
            return Err(Error::RowDetached { row });
        }
        if node.state != RowState::Clean {
            return Err(Error::invalid_edit_state(format!(
                "Row {} is already being edited",
                row
            )));
        }
        let model = node.model.ok_or(Error::RowDetached { row })?;
        self.check_edit_slot(model)?;
        self.open_edit(row, model, false)
    }

    /// Creates a row of `data_set`'s model in the adding state.
    ///
    /// The row is not visible until committed, which appends it to `data_set`.
    pub fn begin_add(&mut self, data_set: DataSetId) -> Result<RowId> {
        let (model, parent_row) = {
            let set = self.data_set(data_set)?;
            (set.model, set.parent_row)
        };
        self.check_edit_slot(model)?;

        let row = self.row_ids.next_id();
        let values = self.default_values(model);
        let mut node = RowNode::detached(row);
        node.model = Some(model);
        node.parent = parent_row;
        node.edit = Some(EditBuffer::new(values.clone(), Some(data_set)));
        node.values = values;
        node.state = RowState::Adding;
        self.rows.insert(row, node);
        self.editing.insert(model, row);
        tracing::debug!(target: "cambium_data::edit", row, data_set, "add started");
        Ok(row)
    }

    /// Ends an edit, committing it or, with `discard`, cancelling it.
    pub fn end_edit(&mut self, row: RowId, discard: bool) -> Result<()> {
        if discard {
            return self.cancel_edit(row);
        }
        let node = self.node(row)?;
        let state = node.state;
        let target = node.edit.as_ref().and_then(|edit| edit.target);
        if !state.is_editing() {
            return Err(Error::invalid_edit_state(format!("Row {} is not being edited", row)));
        }

        self.bracket(|tree| {
            if state == RowState::Adding {
                let data_set = target.ok_or_else(|| {
                    Error::invalid_edit_state(format!("Row {} has no target data set", row))
                })?;
                let len = tree.data_set(data_set)?.len();
                tree.attach(row, data_set, len)?;
            }
            tree.commit_buffer(row)
        })
    }

    /// Commits an edit.
    #[inline]
    pub fn commit_edit(&mut self, row: RowId) -> Result<()> {
        self.end_edit(row, false)
    }

    /// Drops an edit. A row being added is discarded.
    pub fn cancel_edit(&mut self, row: RowId) -> Result<()> {
        let state = self.node(row)?.state;
        match state {
            RowState::Editing => {
                let node = self.node_mut(row)?;
                node.edit = None;
                node.state = if node.is_attached() {
                    RowState::Clean
                } else {
                    RowState::Detached
                };
            }
            RowState::Adding => {
                self.rows.remove(&row);
            }
            _ => {
                return Err(Error::invalid_edit_state(format!("Row {} is not being edited", row)))
            }
        }
        self.release_edit_slot(row);
        tracing::debug!(target: "cambium_data::edit", row, "edit cancelled");
        Ok(())
    }

    /// Returns the row holding the edit slot of `model`.
    pub fn editing_row(&self, model: ModelId) -> Option<RowId> {
        self.editing.get(&model).copied()
    }

    /// Suspends value-changed notifications of one row.
    ///
    /// Stored writes are still applied; the changed columns are reported
    /// together when the last suspension ends. Invalidations aimed at the row
    /// are held until then.
    pub fn suspend_row_notifications(&mut self, row: RowId) -> Result<()> {
        self.node_mut(row)?.notify_suspended += 1;
        Ok(())
    }

    /// Ends a row notification suspension.
    pub fn resume_row_notifications(&mut self, row: RowId) -> Result<()> {
        self.node(row)?;
        self.bracket(|tree| tree.release_row_notifications(row))
    }

    pub(crate) fn release_row_notifications(&mut self, row: RowId) -> Result<()> {
        let node = self.node_mut(row)?;
        if node.notify_suspended == 0 {
            return Err(Error::UnbalancedSuspension);
        }
        node.notify_suspended -= 1;
        if node.notify_suspended > 0 {
            return Ok(());
        }
        let columns = core::mem::take(&mut node.pending_changed);
        let deferred = core::mem::take(&mut node.deferred);
        if !node.is_attached() {
            return Ok(());
        }
        if !columns.is_empty() {
            self.emit(DataEvent::ValueChanged {
                row,
                columns: columns.clone(),
            });
            for &column in &columns {
                self.classify(row, column);
            }
        }
        for column in deferred {
            self.invalidate(column, row);
        }
        Ok(())
    }

    pub(crate) fn open_edit(&mut self, row: RowId, model: ModelId, touch_all: bool) -> Result<()> {
        let schema = Rc::clone(&self.schema);
        let node = self.node_mut(row)?;
        let mut buffer = EditBuffer::new(node.values.clone(), None);
        if touch_all {
            if let Some(m) = schema.model(model) {
                buffer.touched = m
                    .columns()
                    .iter()
                    .copied()
                    .filter(|&c| schema.column(c).map(|c| !c.is_expression()).unwrap_or(false))
                    .collect();
            }
        }
        node.edit = Some(buffer);
        node.state = RowState::Editing;
        self.editing.insert(model, row);
        tracing::debug!(target: "cambium_data::edit", row, "edit started");
        Ok(())
    }

    /// Writes the edit buffer back as stored values.
    pub(crate) fn commit_buffer(&mut self, row: RowId) -> Result<()> {
        let schema = Rc::clone(&self.schema);
        self.suspend_row_notifications(row)?;
        let buffer = {
            let node = self.node_mut(row)?;
            node.state = RowState::Clean;
            node.edit.take()
        };
        if let Some(buffer) = buffer {
            for &column in &buffer.touched {
                if let Some(col) = schema.column(column) {
                    let value = buffer.values.get(col.slot()).cloned().unwrap_or(Value::Null);
                    self.store_value(row, col, value, true);
                }
            }
        }
        self.release_edit_slot(row);
        tracing::debug!(target: "cambium_data::edit", row, "edit committed");
        self.release_row_notifications(row)
    }

    fn check_edit_slot(&self, model: ModelId) -> Result<()> {
        match self.editing.get(&model) {
            Some(other) => Err(Error::invalid_edit_state(format!(
                "Row {} of the same model is being edited",
                other
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::row::RowState;
    use crate::tree::DataTree;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use cambium_core::schema::{Expr, SchemaBuilder};
    use cambium_core::{DataType, Error, Value};
    use cambium_reactive::DataEvent;
    use core::cell::RefCell;

    struct Fixture {
        tree: DataTree,
        line: usize,
        qty: usize,
        price: usize,
        amount: usize,
        total: usize,
    }

    fn fixture() -> Fixture {
        let mut b = SchemaBuilder::new("order").unwrap();
        let line = b.add_child_model(0, "line").unwrap();
        let qty = b.add_column(line, "qty", DataType::Int64).unwrap();
        let price = b.add_column(line, "price", DataType::Int64).unwrap();
        let amount = b
            .add_expression(line, "amount", DataType::Int64, Expr::mul(Expr::column(qty), Expr::column(price)))
            .unwrap();
        let total = b
            .add_expression(0, "total", DataType::Int64, Expr::sum(amount))
            .unwrap();
        let tree = DataTree::new(Rc::new(b.build().unwrap()));
        Fixture {
            tree,
            line,
            qty,
            price,
            amount,
            total,
        }
    }

    fn record(tree: &mut DataTree) -> Rc<RefCell<Vec<DataEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_commit_writes_buffer_once() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();
        let l = f.tree.append_row(lines).unwrap();
        let seen = record(&mut f.tree);

        f.tree.begin_edit(l).unwrap();
        f.tree.set_value(l, f.qty, Value::Int64(2)).unwrap();
        f.tree.set_value(l, f.price, Value::Int64(7)).unwrap();
        assert_eq!(f.tree.get_value(l, f.qty).unwrap(), Value::Int64(2));
        assert_eq!(f.tree.get_value(l, f.amount).unwrap(), Value::Int64(0));
        assert!(seen.borrow().is_empty());

        f.tree.commit_edit(l).unwrap();
        assert_eq!(f.tree.get_value(l, f.amount).unwrap(), Value::Int64(14));
        assert_eq!(f.tree.get_value(order, f.total).unwrap(), Value::Int64(14));
        assert_eq!(f.tree.row_state(l).unwrap(), RowState::Clean);
        assert_eq!(
            seen.borrow()[0],
            DataEvent::ValueChanged {
                row: l,
                columns: alloc::vec![f.qty, f.price, f.amount]
            }
        );
    }

    #[test]
    fn test_one_edit_per_model() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();
        let a = f.tree.append_row(lines).unwrap();
        let b = f.tree.append_row(lines).unwrap();

        f.tree.begin_edit(a).unwrap();
        assert!(matches!(f.tree.begin_edit(a), Err(Error::InvalidEditState { .. })));
        assert!(matches!(f.tree.begin_edit(b), Err(Error::InvalidEditState { .. })));
        assert_eq!(f.tree.editing_row(f.line), Some(a));
        // Other models are unaffected.
        f.tree.begin_edit(order).unwrap();
        f.tree.end_edit(order, true).unwrap();

        f.tree.cancel_edit(a).unwrap();
        f.tree.begin_edit(b).unwrap();
        assert!(matches!(f.tree.cancel_edit(a), Err(Error::InvalidEditState { .. })));
    }

    #[test]
    fn test_begin_add_commit_appends() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();
        f.tree.append_row(lines).unwrap();

        let added = f.tree.begin_add(lines).unwrap();
        assert_eq!(f.tree.row_state(added).unwrap(), RowState::Adding);
        assert!(!f.tree.is_attached(added));
        f.tree.set_value(added, f.qty, Value::Int64(3)).unwrap();
        f.tree.set_value(added, f.price, Value::Int64(3)).unwrap();
        assert_eq!(f.tree.data_set_rows(lines).unwrap().len(), 1);

        f.tree.end_edit(added, false).unwrap();
        assert_eq!(f.tree.index(added), Some(1));
        assert_eq!(f.tree.get_value(order, f.total).unwrap(), Value::Int64(9));
        assert_eq!(f.tree.editing_row(f.line), None);
    }

    #[test]
    fn test_cancel_add_discards_row() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();

        let added = f.tree.begin_add(lines).unwrap();
        f.tree.cancel_edit(added).unwrap();
        assert!(!f.tree.contains_row(added));
        assert!(f.tree.data_set_rows(lines).unwrap().is_empty());
        assert!(matches!(f.tree.commit_edit(added), Err(Error::RowNotFound { .. })));
    }

    #[test]
    fn test_row_notification_suspension_coalesces() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();
        let l = f.tree.append_row(lines).unwrap();
        let seen = record(&mut f.tree);

        f.tree.suspend_computation();
        f.tree.suspend_row_notifications(l).unwrap();
        f.tree.set_value(l, f.qty, Value::Int64(5)).unwrap();
        f.tree.set_value(l, f.price, Value::Int64(5)).unwrap();
        f.tree.resume_row_notifications(l).unwrap();
        f.tree.resume_computation().unwrap();

        assert_eq!(f.tree.get_value(l, f.amount).unwrap(), Value::Int64(25));
        let events = seen.borrow();
        assert_eq!(
            events[0],
            DataEvent::ValueChanged {
                row: l,
                columns: alloc::vec![f.qty, f.price, f.amount]
            }
        );
        assert!(matches!(
            f.tree.resume_row_notifications(l),
            Err(Error::UnbalancedSuspension)
        ));
    }

    #[test]
    fn test_row_suspension_survives_removal() {
        let mut f = fixture();
        let root = f.tree.root_data_set();
        let order = f.tree.append_row(root).unwrap();
        let lines = f.tree.child_data_set(order, f.line).unwrap();
        let l = f.tree.append_row(lines).unwrap();

        f.tree.suspend_row_notifications(l).unwrap();
        f.tree.remove_row(l).unwrap();
        f.tree.insert_detached_row(lines, 0, l).unwrap();
        f.tree.set_value(l, f.qty, Value::Int64(2)).unwrap();
        f.tree.set_value(l, f.price, Value::Int64(3)).unwrap();
        assert_eq!(f.tree.get_value(l, f.amount).unwrap(), Value::Int64(0));

        f.tree.resume_row_notifications(l).unwrap();
        assert_eq!(f.tree.get_value(l, f.amount).unwrap(), Value::Int64(6));
        assert_eq!(f.tree.get_value(order, f.total).unwrap(), Value::Int64(6));
        assert!(matches!(
            f.tree.resume_row_notifications(l),
            Err(Error::UnbalancedSuspension)
        ));
    }
}
