//! The runtime row tree.
//!
//! A `DataTree` mirrors a [`Schema`]: the root data set holds rows of the root
//! model and every row owns one child data set per child model. Rows and data
//! sets live in arenas keyed by id; parents are referenced by id only.

use crate::data_set::DataSet;
use crate::options::DataTreeOptions;
use crate::queue::InvalidationQueue;
use crate::row::{RowNode, RowState};
use crate::stats::EngineStats;
use alloc::format;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cambium_core::schema::{Column, Expr, Schema};
use cambium_core::{ColumnId, DataSetId, Error, IdAllocator, ModelId, Result, RowId, Value};
use cambium_reactive::{DataEvent, EventKind, Notifier, SubscriptionId};
use hashbrown::HashMap;

/// Rows, data sets and the computation engine for one schema.
pub struct DataTree {
    pub(crate) schema: Rc<Schema>,
    pub(crate) options: DataTreeOptions,
    pub(crate) rows: HashMap<RowId, RowNode>,
    pub(crate) data_sets: HashMap<DataSetId, DataSet>,
    root_data_set: DataSetId,
    pub(crate) row_ids: IdAllocator,
    data_set_ids: IdAllocator,
    pub(crate) queue: InvalidationQueue,
    pub(crate) suspend_count: usize,
    pub(crate) flushing: bool,
    /// Model -> the row holding its edit slot.
    pub(crate) editing: HashMap<ModelId, RowId>,
    pub(crate) notifier: Notifier,
    pub(crate) stats: EngineStats,
}

impl DataTree {
    /// Creates an empty tree with default options.
    pub fn new(schema: Rc<Schema>) -> Self {
        Self::with_options(schema, DataTreeOptions::default())
    }

    /// Creates an empty tree.
    pub fn with_options(schema: Rc<Schema>, options: DataTreeOptions) -> Self {
        let mut data_set_ids = IdAllocator::new();
        let root_data_set = data_set_ids.next_id();
        let mut data_sets = HashMap::new();
        data_sets.insert(
            root_data_set,
            DataSet::new(root_data_set, schema.root().id(), None),
        );
        Self {
            schema,
            options,
            rows: HashMap::new(),
            data_sets,
            root_data_set,
            row_ids: IdAllocator::new(),
            data_set_ids,
            queue: InvalidationQueue::new(),
            suspend_count: 0,
            flushing: false,
            editing: HashMap::new(),
            notifier: Notifier::new(options.batch_events),
            stats: EngineStats::new(),
        }
    }

    #[inline]
    pub fn schema(&self) -> &Rc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn options(&self) -> DataTreeOptions {
        self.options
    }

    /// Returns the data set holding rows of the root model.
    #[inline]
    pub fn root_data_set(&self) -> DataSetId {
        self.root_data_set
    }

    /// Returns the rows of a data set in order.
    pub fn data_set_rows(&self, data_set: DataSetId) -> Result<&[RowId]> {
        Ok(&self.data_set(data_set)?.rows)
    }

    /// Returns the model of the rows a data set holds.
    pub fn data_set_model(&self, data_set: DataSetId) -> Result<ModelId> {
        Ok(self.data_set(data_set)?.model)
    }

    /// Returns the row owning a data set, None for the root data set.
    pub fn data_set_parent(&self, data_set: DataSetId) -> Result<Option<RowId>> {
        Ok(self.data_set(data_set)?.parent_row)
    }

    /// Returns the child data set of `row` holding rows of `child_model`.
    pub fn child_data_set(&self, row: RowId, child_model: ModelId) -> Result<DataSetId> {
        let node = self.node(row)?;
        if !node.is_attached() {
            return Err(Error::RowDetached { row });
        }
        self.child_set_of(row, child_model)
            .ok_or_else(|| Error::model_not_found(format!("#{}", child_model)))
    }

    /// Returns true if the tree knows `row`, attached or not.
    pub fn contains_row(&self, row: RowId) -> bool {
        self.rows.contains_key(&row)
    }

    /// Number of attached rows.
    pub fn row_count(&self) -> usize {
        self.rows.values().filter(|node| node.is_attached()).count()
    }

    pub fn parent_row(&self, row: RowId) -> Option<RowId> {
        self.rows.get(&row).and_then(|node| node.parent)
    }

    pub fn row_model(&self, row: RowId) -> Option<ModelId> {
        self.rows.get(&row).and_then(|node| node.model)
    }

    /// Returns the depth of the row's model.
    pub fn depth(&self, row: RowId) -> Result<usize> {
        self.depth_of(row).ok_or(Error::RowDetached { row })
    }

    pub fn is_attached(&self, row: RowId) -> bool {
        self.rows.get(&row).map(|node| node.is_attached()).unwrap_or(false)
    }

    pub fn row_state(&self, row: RowId) -> Result<RowState> {
        Ok(self.node(row)?.state)
    }

    /// Returns the number of stored writes the row has seen, plus one.
    pub fn version(&self, row: RowId) -> Result<u64> {
        Ok(self.node(row)?.version)
    }

    /// Returns the row's position within its data set.
    pub fn index(&self, row: RowId) -> Option<usize> {
        let node = self.rows.get(&row)?;
        self.data_sets.get(&node.data_set?)?.position(row)
    }

    /// Returns the row's position among all attached rows of its model, in
    /// tree pre-order.
    pub fn ordinal(&self, row: RowId) -> Option<usize> {
        let node = self.rows.get(&row)?;
        if !node.is_attached() {
            return None;
        }
        let model = node.model?;
        let mut seen = 0;
        self.find_ordinal(self.root_data_set, model, row, &mut seen)
    }

    fn find_ordinal(
        &self,
        data_set: DataSetId,
        model: ModelId,
        target: RowId,
        seen: &mut usize,
    ) -> Option<usize> {
        let set = self.data_sets.get(&data_set)?;
        if set.model == model {
            if let Some(position) = set.position(target) {
                return Some(*seen + position);
            }
            *seen += set.len();
            return None;
        }
        for row in &set.rows {
            let node = self.rows.get(row)?;
            for child in &node.children {
                let leads_to_model = self
                    .data_sets
                    .get(child)
                    .map(|c| c.model == model || self.schema.is_ancestor(c.model, model))
                    .unwrap_or(false);
                if !leads_to_model {
                    continue;
                }
                if let Some(found) = self.find_ordinal(*child, model, target, seen) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Reads a column of a row.
    ///
    /// A row under edit returns its buffered value for concrete columns.
    /// Virtual expressions are evaluated on each read.
    pub fn get_value(&self, row: RowId, column: ColumnId) -> Result<Value> {
        let node = self.node(row)?;
        let model = node.model.ok_or(Error::RowDetached { row })?;
        let col = lookup_column(&self.schema, model, column)?;
        if let Some(edit) = &node.edit {
            if !col.is_expression() {
                return Ok(edit.values.get(col.slot()).cloned().unwrap_or(Value::Null));
            }
        }
        Ok(self.read_committed(row, col))
    }

    pub fn get_value_by_name(&self, row: RowId, name: &str) -> Result<Value> {
        let column = self.column_id_by_name(row, name)?;
        self.get_value(row, column)
    }

    /// Writes a concrete column.
    ///
    /// Outside of an edit the write is stored at once, raises a value-changed
    /// event and invalidates dependents. Inside an edit it only updates the
    /// buffer.
    pub fn set_value(&mut self, row: RowId, column: ColumnId, value: Value) -> Result<()> {
        let schema = Rc::clone(&self.schema);
        let (model, state, attached) = {
            let node = self.node(row)?;
            (node.model, node.state, node.is_attached())
        };
        let model = model.ok_or(Error::RowDetached { row })?;
        let col = lookup_column(&schema, model, column)?;
        if col.is_expression() {
            return Err(Error::ReadOnlyColumn { column });
        }
        check_value(col, &value)?;

        if state.is_editing() {
            if let Some(edit) = self.node_mut(row)?.edit.as_mut() {
                edit.write(column, col.slot(), value);
            }
            tracing::trace!(target: "cambium_data::tree", row, column, "buffered write");
            return Ok(());
        }
        if !attached {
            return Err(Error::RowDetached { row });
        }
        self.bracket(|tree| {
            tree.store_value(row, col, value, true);
            Ok(())
        })
    }

    pub fn set_value_by_name(&mut self, row: RowId, name: &str, value: Value) -> Result<()> {
        let column = self.column_id_by_name(row, name)?;
        self.set_value(row, column, value)
    }

    /// Creates a row at `index` of `data_set` and returns its id.
    ///
    /// Computed columns of the new row are evaluated before it becomes visible.
    pub fn insert_row(&mut self, data_set: DataSetId, index: usize) -> Result<RowId> {
        self.bracket(|tree| tree.insert_inner(data_set, index, None))
    }

    /// Creates a row at the end of `data_set`.
    pub fn append_row(&mut self, data_set: DataSetId) -> Result<RowId> {
        let len = self.data_set(data_set)?.len();
        self.insert_row(data_set, len)
    }

    /// Inserts a previously removed row again.
    ///
    /// The row starts over with default values and empty child data sets.
    pub fn insert_detached_row(&mut self, data_set: DataSetId, index: usize, row: RowId) -> Result<()> {
        let node = self.node(row)?;
        match node.state {
            RowState::Detached => {}
            RowState::Adding => {
                return Err(Error::invalid_edit_state(format!(
                    "Row {} is being added, commit it instead",
                    row
                )))
            }
            _ => {
                return Err(Error::invalid_operation(format!("Row {} is already attached", row)))
            }
        }
        self.bracket(|tree| tree.attach(row, data_set, index))
    }

    /// Removes a row from its data set.
    ///
    /// The row keeps its id and can be inserted again or discarded. Its
    /// descendants are dropped.
    pub fn remove_row(&mut self, row: RowId) -> Result<()> {
        self.position(row)?;
        self.bracket(|tree| tree.take_out(row, false))
    }

    /// Removes the row at `index` of `data_set` and returns its id.
    pub fn remove_at(&mut self, data_set: DataSetId, index: usize) -> Result<RowId> {
        let set = self.data_set(data_set)?;
        let row = set.rows.get(index).copied().ok_or(Error::IndexOutOfRange {
            index: index as isize,
            len: set.len(),
        })?;
        self.remove_row(row)?;
        Ok(row)
    }

    /// Forgets a detached row.
    pub fn discard_row(&mut self, row: RowId) -> Result<()> {
        let node = self.node(row)?;
        if node.state != RowState::Detached {
            return Err(Error::invalid_operation(format!(
                "Row {} is not detached and cannot be discarded",
                row
            )));
        }
        if let Some(node) = self.rows.remove(&row) {
            tracing::trace!(target: "cambium_data::tree", row = node.id, version = node.version, "row discarded");
        }
        Ok(())
    }

    /// Removes and discards every row of a data set.
    pub fn clear_data_set(&mut self, data_set: DataSetId) -> Result<()> {
        self.data_set(data_set)?;
        self.bracket(|tree| tree.clear_inner(data_set))
    }

    /// Evaluates a free-standing expression against a row.
    ///
    /// Scalar references resolve on the row or the nearest ancestor of the
    /// column's model; aggregates run over the row's descendants. References
    /// outside of that reach read as Null.
    pub fn evaluate(&self, row: RowId, expr: &Expr) -> Result<Value> {
        let node = self.node(row)?;
        if node.model.is_none() {
            return Err(Error::RowDetached { row });
        }
        Ok(self.evaluate_expr(expr, row))
    }

    /// Registers a listener for every event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Registers a listener for one kind of event.
    pub fn subscribe_kind<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        self.notifier.subscribe_kind(kind, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Number of registered listeners.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    #[inline]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.clear();
    }

    pub(crate) fn node(&self, row: RowId) -> Result<&RowNode> {
        self.rows.get(&row).ok_or(Error::RowNotFound { row })
    }

    pub(crate) fn node_mut(&mut self, row: RowId) -> Result<&mut RowNode> {
        self.rows.get_mut(&row).ok_or(Error::RowNotFound { row })
    }

    pub(crate) fn data_set(&self, data_set: DataSetId) -> Result<&DataSet> {
        self.data_sets
            .get(&data_set)
            .ok_or(Error::DataSetNotFound { data_set })
    }

    /// Returns the containing data set and index of an attached row.
    pub(crate) fn position(&self, row: RowId) -> Result<(DataSetId, usize)> {
        let node = self.node(row)?;
        let data_set = node.data_set.ok_or(Error::RowDetached { row })?;
        let index = self
            .data_set(data_set)?
            .position(row)
            .ok_or(Error::RowDetached { row })?;
        Ok((data_set, index))
    }

    pub(crate) fn depth_of(&self, row: RowId) -> Option<usize> {
        let model = self.rows.get(&row)?.model?;
        Some(self.schema.model(model)?.depth())
    }

    /// Child data set lookup that does not require the row to be attached.
    pub(crate) fn child_set_of(&self, row: RowId, child_model: ModelId) -> Option<DataSetId> {
        let node = self.rows.get(&row)?;
        let index = self.schema.model(node.model?)?.child_index(child_model)?;
        node.children.get(index).copied()
    }

    pub(crate) fn default_values(&self, model: ModelId) -> Vec<Value> {
        let schema = &self.schema;
        schema
            .model(model)
            .map(|m| {
                m.columns()
                    .iter()
                    .filter_map(|&c| schema.column(c))
                    .map(|c| c.get_default_value())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn column_id_by_name(&self, row: RowId, name: &str) -> Result<ColumnId> {
        let model = self.node(row)?.model.ok_or(Error::RowDetached { row })?;
        self.schema
            .column_by_name(model, name)
            .map(|c| c.id())
            .ok_or_else(|| Error::column_not_found(model_name(&self.schema, model), name))
    }

    fn create_data_set(&mut self, model: ModelId, parent_row: RowId) -> DataSetId {
        let id = self.data_set_ids.next_id();
        self.data_sets
            .insert(id, DataSet::new(id, model, Some(parent_row)));
        id
    }

    /// Creates a row and attaches it. `id` reuses a known id if it is free.
    pub(crate) fn insert_inner(
        &mut self,
        data_set: DataSetId,
        index: usize,
        id: Option<RowId>,
    ) -> Result<RowId> {
        let len = self.data_set(data_set)?.len();
        if index > len {
            return Err(Error::IndexOutOfRange {
                index: index as isize,
                len,
            });
        }
        let row = match id {
            Some(id) if !self.rows.contains_key(&id) => id,
            _ => self.row_ids.next_id(),
        };
        self.rows.insert(row, RowNode::detached(row));
        if let Err(err) = self.attach(row, data_set, index) {
            self.rows.remove(&row);
            return Err(err);
        }
        Ok(row)
    }

    /// Gives a known row a model, values and child data sets and makes it
    /// visible at `index`.
    pub(crate) fn attach(&mut self, row: RowId, data_set: DataSetId, index: usize) -> Result<()> {
        let schema = Rc::clone(&self.schema);
        let (model, parent_row, len) = {
            let set = self.data_set(data_set)?;
            (set.model, set.parent_row, set.len())
        };
        if index > len {
            return Err(Error::IndexOutOfRange {
                index: index as isize,
                len,
            });
        }
        let model_def = schema
            .model(model)
            .ok_or_else(|| Error::model_not_found(format!("#{}", model)))?;
        let values = self.default_values(model);
        let children: Vec<DataSetId> = model_def
            .children()
            .iter()
            .map(|&child| self.create_data_set(child, row))
            .collect();

        let node = self.node_mut(row)?;
        node.model = Some(model);
        node.parent = parent_row;
        node.values = values;
        node.children = children;
        if node.state == RowState::Detached {
            node.state = RowState::Clean;
        }

        for &column in schema.computation_columns(model) {
            self.recompute(column, row, false);
        }

        if let Some(set) = self.data_sets.get_mut(&data_set) {
            set.rows.insert(index, row);
        }
        self.node_mut(row)?.data_set = Some(data_set);
        tracing::debug!(target: "cambium_data::tree", row, data_set, index, "row inserted");
        self.emit(DataEvent::RowInserted {
            data_set,
            row,
            index,
        });
        self.invalidate_aggregates(row, model);
        Ok(())
    }

    /// Takes an attached row out of its data set and detaches it.
    pub(crate) fn take_out(&mut self, row: RowId, keep_edit: bool) -> Result<()> {
        let (data_set, index) = self.position(row)?;
        if let Some(model) = self.row_model(row) {
            self.invalidate_aggregates(row, model);
        }
        if let Some(set) = self.data_sets.get_mut(&data_set) {
            set.rows.remove(index);
        }
        tracing::debug!(target: "cambium_data::tree", row, data_set, index, "row removed");
        self.emit(DataEvent::RowRemoved {
            data_set,
            row,
            index,
        });
        self.detach(row, keep_edit);
        Ok(())
    }

    /// Drops the row's model, values and descendants.
    pub(crate) fn detach(&mut self, row: RowId, keep_edit: bool) {
        let children = match self.rows.get_mut(&row) {
            Some(node) => core::mem::take(&mut node.children),
            None => return,
        };
        for data_set in children {
            self.purge_data_set(data_set);
        }
        if !keep_edit {
            self.release_edit_slot(row);
        }
        if let Some(node) = self.rows.get_mut(&row) {
            node.clear(keep_edit);
        }
    }

    /// Removes a data set and every row below it from the arenas.
    fn purge_data_set(&mut self, data_set: DataSetId) {
        let set = match self.data_sets.remove(&data_set) {
            Some(set) => set,
            None => return,
        };
        tracing::trace!(target: "cambium_data::tree", data_set = set.id, rows = set.len(), "data set purged");
        for row in set.rows {
            self.release_edit_slot(row);
            if let Some(node) = self.rows.remove(&row) {
                for child in node.children {
                    self.purge_data_set(child);
                }
            }
        }
    }

    pub(crate) fn clear_inner(&mut self, data_set: DataSetId) -> Result<()> {
        let rows = self.data_set(data_set)?.rows.clone();
        for &row in rows.iter().rev() {
            self.take_out(row, false)?;
            self.rows.remove(&row);
        }
        Ok(())
    }

    pub(crate) fn release_edit_slot(&mut self, row: RowId) {
        self.editing.retain(|_, editing| *editing != row);
    }
}

/// Looks up a column and checks it belongs to `model`.
pub(crate) fn lookup_column(schema: &Schema, model: ModelId, column: ColumnId) -> Result<&Column> {
    schema
        .column(column)
        .filter(|c| c.model() == model)
        .ok_or_else(|| Error::column_not_found(model_name(schema, model), format!("#{}", column)))
}

fn model_name(schema: &Schema, model: ModelId) -> alloc::string::String {
    schema
        .model(model)
        .map(|m| m.name().into())
        .unwrap_or_else(|| format!("#{}", model))
}

/// Checks a value against a column's type and nullability.
fn check_value(column: &Column, value: &Value) -> Result<()> {
    match value.data_type() {
        None if !column.is_nullable() => Err(Error::null_constraint(column.name())),
        None => Ok(()),
        Some(dt) if dt != column.data_type() => Err(Error::type_mismatch(column.data_type(), dt)),
        Some(_) => Ok(()),
    }
}
