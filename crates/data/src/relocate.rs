//! Row relocation and subtree backup/restore.

use crate::row::{EditBuffer, RowState};
use crate::tree::DataTree;
use alloc::format;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use cambium_core::{DataSetId, Error, ModelId, Result, RowId, Value};
use hashbrown::{HashMap, HashSet};

/// A deep copy of a row and its descendants.
///
/// Restoring writes the concrete columns back and rebuilds every child data
/// set in order; computed columns are recomputed, not copied.
#[derive(Clone, Debug, PartialEq)]
pub struct RowSnapshot {
    id: RowId,
    model: ModelId,
    values: Vec<Value>,
    /// One entry per child data set, rows in order.
    children: Vec<Vec<RowSnapshot>>,
}

impl RowSnapshot {
    /// Id of the row the snapshot was taken from.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    #[inline]
    pub fn model(&self) -> ModelId {
        self.model
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn children(&self) -> &[Vec<RowSnapshot>] {
        &self.children
    }

    /// Number of rows in the snapshot, this one included.
    pub fn row_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(RowSnapshot::row_count)
            .sum::<usize>()
    }
}

/// Per-row state below a moving row that a snapshot does not carry.
struct HeldRow {
    row: RowId,
    model: ModelId,
    edit: Option<EditBuffer>,
    suspended: usize,
}

/// Rows of a moving subtree whose edits and suspensions outlive the move.
#[derive(Default)]
struct HeldState {
    rows: Vec<HeldRow>,
    /// Added rows targeting a data set of the subtree: (row, owner, child model).
    adding: Vec<(RowId, RowId, ModelId)>,
}

impl DataTree {
    /// Copies an attached row and its subtree.
    ///
    /// A row under edit is copied with its committed values.
    pub fn snapshot_row(&self, row: RowId) -> Result<RowSnapshot> {
        let node = self.node(row)?;
        let model = node.model.ok_or(Error::RowDetached { row })?;
        let mut children = Vec::with_capacity(node.children.len());
        for &data_set in &node.children {
            let rows = &self.data_set(data_set)?.rows;
            let mut snapshots = Vec::with_capacity(rows.len());
            for &child in rows {
                snapshots.push(self.snapshot_row(child)?);
            }
            children.push(snapshots);
        }
        Ok(RowSnapshot {
            id: row,
            model,
            values: node.values.clone(),
            children,
        })
    }

    /// Writes a snapshot back onto an attached row of the same model.
    ///
    /// Existing child rows are discarded and rebuilt from the snapshot,
    /// reusing their former ids where those are free.
    pub fn restore_row(&mut self, row: RowId, snapshot: &RowSnapshot) -> Result<()> {
        let node = self.node(row)?;
        if !node.is_attached() {
            return Err(Error::RowDetached { row });
        }
        if node.model != Some(snapshot.model) {
            return Err(Error::invalid_operation(format!(
                "Snapshot of model #{} cannot be restored onto row {}",
                snapshot.model, row
            )));
        }
        self.bracket(|tree| tree.restore_inner(row, snapshot))
    }

    fn restore_inner(&mut self, row: RowId, snapshot: &RowSnapshot) -> Result<()> {
        let schema = Rc::clone(&self.schema);
        let model = schema
            .model(snapshot.model)
            .ok_or_else(|| Error::model_not_found(format!("#{}", snapshot.model)))?;
        for &column in model.columns() {
            let col = match schema.column(column) {
                Some(col) if !col.is_expression() => col,
                _ => continue,
            };
            if let Some(value) = snapshot.values.get(col.slot()) {
                self.store_value(row, col, value.clone(), true);
            }
        }

        let child_sets = self.node(row)?.children.clone();
        for (&data_set, rows) in child_sets.iter().zip(&snapshot.children) {
            self.clear_inner(data_set)?;
            for child in rows {
                let len = self.data_set(data_set)?.len();
                let id = self.insert_inner(data_set, len, Some(child.id))?;
                self.restore_inner(id, child)?;
            }
        }
        Ok(())
    }

    /// Moves a row by `offset` positions within its data set.
    ///
    /// The row keeps its id, its values and its descendants.
    pub fn move_row(&mut self, row: RowId, offset: isize) -> Result<()> {
        let (data_set, index) = self.position(row)?;
        let len = self.data_set(data_set)?.len();
        let target = index as isize + offset;
        if target < 0 || target >= len as isize {
            return Err(Error::IndexOutOfRange { index: target, len });
        }
        if offset == 0 {
            return Ok(());
        }
        let target = target as usize;

        let node = self.node(row)?;
        let model = node.model.ok_or(Error::RowDetached { row })?;
        let has_children = node.children.iter().any(|data_set| {
            self.data_sets
                .get(data_set)
                .map(|set| set.len() > 0)
                .unwrap_or(false)
        });
        let fast = !has_children && !self.editing.contains_key(&model);
        tracing::debug!(target: "cambium_data::relocate", row, from = index, to = target, fast, "moving row");

        self.bracket(|tree| {
            if fast {
                tree.open_edit(row, model, true)?;
                tree.take_out(row, true)?;
                tree.attach(row, data_set, target)?;
                return tree.commit_buffer(row);
            }
            let snapshot = tree.snapshot_row(row)?;
            let held = tree.hold_descendants(row);
            let editing = tree.node(row)?.state == RowState::Editing;
            tree.take_out(row, editing)?;
            tree.attach(row, data_set, target)?;
            tree.restore_inner(row, &snapshot)?;
            tree.reinstall(held);
            Ok(())
        })
    }

    /// Collects edit buffers and notification suspensions below `row`.
    fn hold_descendants(&self, row: RowId) -> HeldState {
        let mut sets: HashMap<DataSetId, (RowId, ModelId)> = HashMap::new();
        let mut below = HashSet::new();
        let mut stack = vec![row];
        while let Some(current) = stack.pop() {
            let node = match self.rows.get(&current) {
                Some(node) => node,
                None => continue,
            };
            for &data_set in &node.children {
                if let Some(set) = self.data_sets.get(&data_set) {
                    sets.insert(data_set, (current, set.model));
                    below.extend(set.rows.iter().copied());
                    stack.extend(set.rows.iter().copied());
                }
            }
        }

        let mut held = HeldState::default();
        for &child in &below {
            let node = match self.rows.get(&child) {
                Some(node) => node,
                None => continue,
            };
            let edit = if node.state == RowState::Editing {
                node.edit.clone()
            } else {
                None
            };
            let model = match node.model {
                Some(model) => model,
                None => continue,
            };
            if edit.is_some() || node.notify_suspended > 0 {
                held.rows.push(HeldRow {
                    row: child,
                    model,
                    edit,
                    suspended: node.notify_suspended,
                });
            }
        }
        for &adding in self.editing.values() {
            let target = self
                .rows
                .get(&adding)
                .filter(|node| node.state == RowState::Adding)
                .and_then(|node| node.edit.as_ref())
                .and_then(|edit| edit.target);
            if let Some(&(owner, model)) = target.and_then(|t| sets.get(&t)) {
                held.adding.push((adding, owner, model));
            }
        }
        held
    }

    /// Puts held state back onto the rebuilt subtree.
    fn reinstall(&mut self, held: HeldState) {
        for HeldRow {
            row,
            model,
            edit,
            suspended,
        } in held.rows
        {
            let editing = edit.is_some();
            if editing && self.editing.contains_key(&model) {
                tracing::trace!(target: "cambium_data::relocate", row, "edit slot taken, buffer dropped");
                continue;
            }
            let node = match self.rows.get_mut(&row) {
                Some(node) if node.model == Some(model) => node,
                _ => continue,
            };
            node.notify_suspended = suspended;
            if let Some(buffer) = edit {
                node.edit = Some(buffer);
                node.state = RowState::Editing;
                self.editing.insert(model, row);
            }
        }
        for (row, owner, model) in held.adding {
            let target = self.child_set_of(owner, model);
            if let Some(edit) = self.rows.get_mut(&row).and_then(|node| node.edit.as_mut()) {
                edit.target = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::row::RowState;
    use crate::tree::DataTree;
    use alloc::rc::Rc;
    use alloc::vec;
    use cambium_core::schema::{Expr, SchemaBuilder};
    use cambium_core::{DataType, Error, Value};

    fn tree() -> (DataTree, usize, usize, usize) {
        let mut b = SchemaBuilder::new("folder").unwrap();
        let name = b.add_column(0, "name", DataType::String).unwrap();
        let file = b.add_child_model(0, "file").unwrap();
        let size = b.add_column(file, "size", DataType::Int64).unwrap();
        b.add_expression(0, "bytes", DataType::Int64, Expr::sum(size))
            .unwrap();
        (DataTree::new(Rc::new(b.build().unwrap())), file, name, size)
    }

    #[test]
    fn test_move_without_children_keeps_values() {
        let (mut tree, _, name, _) = tree();
        let root = tree.root_data_set();
        let mut rows = vec![];
        for n in ["a", "b", "c"] {
            let row = tree.append_row(root).unwrap();
            tree.set_value(row, name, Value::String(n.into())).unwrap();
            rows.push(row);
        }

        tree.move_row(rows[0], 2).unwrap();
        assert_eq!(tree.data_set_rows(root).unwrap(), &[rows[1], rows[2], rows[0]]);
        assert_eq!(tree.get_value(rows[0], name).unwrap(), Value::String("a".into()));

        tree.move_row(rows[0], -1).unwrap();
        assert_eq!(tree.data_set_rows(root).unwrap(), &[rows[1], rows[0], rows[2]]);
        tree.move_row(rows[0], 0).unwrap();
        assert_eq!(tree.index(rows[0]), Some(1));
    }

    #[test]
    fn test_move_out_of_range() {
        let (mut tree, _, _, _) = tree();
        let root = tree.root_data_set();
        let a = tree.append_row(root).unwrap();
        tree.append_row(root).unwrap();
        assert_eq!(
            tree.move_row(a, 2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            tree.move_row(a, -1),
            Err(Error::IndexOutOfRange { index: -1, len: 2 })
        );
    }

    #[test]
    fn test_snapshot_and_restore() {
        let (mut tree, file, name, size) = tree();
        let root = tree.root_data_set();
        let folder = tree.append_row(root).unwrap();
        tree.set_value(folder, name, Value::String("docs".into())).unwrap();
        let files = tree.child_data_set(folder, file).unwrap();
        for n in [10i64, 20] {
            let f = tree.append_row(files).unwrap();
            tree.set_value(f, size, Value::Int64(n)).unwrap();
        }
        let snapshot = tree.snapshot_row(folder).unwrap();
        assert_eq!(snapshot.row_count(), 3);
        assert_eq!(snapshot.id(), folder);

        tree.set_value(folder, name, Value::String("tmp".into())).unwrap();
        tree.clear_data_set(files).unwrap();
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(0));

        tree.restore_row(folder, &snapshot).unwrap();
        assert_eq!(tree.get_value(folder, name).unwrap(), Value::String("docs".into()));
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(30));
        assert_eq!(tree.snapshot_row(folder).unwrap(), snapshot);
    }

    #[test]
    fn test_move_keeps_child_edit() {
        let (mut tree, file, _, size) = tree();
        let root = tree.root_data_set();
        let folder = tree.append_row(root).unwrap();
        tree.append_row(root).unwrap();
        let files = tree.child_data_set(folder, file).unwrap();
        let f = tree.append_row(files).unwrap();
        tree.set_value(f, size, Value::Int64(5)).unwrap();
        tree.begin_edit(f).unwrap();
        tree.set_value(f, size, Value::Int64(9)).unwrap();

        tree.move_row(folder, 1).unwrap();
        assert_eq!(tree.index(folder), Some(1));
        assert_eq!(tree.row_state(f).unwrap(), RowState::Editing);
        assert_eq!(tree.editing_row(file), Some(f));
        assert_eq!(tree.get_value(f, size).unwrap(), Value::Int64(9));
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(5));

        tree.commit_edit(f).unwrap();
        assert_eq!(tree.get_value(f, size).unwrap(), Value::Int64(9));
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(9));
    }

    #[test]
    fn test_move_retargets_pending_add() {
        let (mut tree, file, _, size) = tree();
        let root = tree.root_data_set();
        let folder = tree.append_row(root).unwrap();
        tree.append_row(root).unwrap();
        let files = tree.child_data_set(folder, file).unwrap();
        tree.append_row(files).unwrap();
        let added = tree.begin_add(files).unwrap();
        tree.set_value(added, size, Value::Int64(4)).unwrap();

        tree.move_row(folder, 1).unwrap();
        tree.commit_edit(added).unwrap();

        let files = tree.child_data_set(folder, file).unwrap();
        assert_eq!(tree.data_set_rows(files).unwrap().last(), Some(&added));
        assert_eq!(tree.parent_row(added), Some(folder));
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(4));
    }

    #[test]
    fn test_move_keeps_row_notification_suspension() {
        let (mut tree, file, _, size) = tree();
        let root = tree.root_data_set();
        let folder = tree.append_row(root).unwrap();
        tree.append_row(root).unwrap();
        let files = tree.child_data_set(folder, file).unwrap();
        let f = tree.append_row(files).unwrap();

        tree.suspend_row_notifications(folder).unwrap();
        tree.suspend_row_notifications(f).unwrap();
        tree.move_row(folder, 1).unwrap();
        tree.move_row(folder, -1).unwrap();

        tree.set_value(f, size, Value::Int64(7)).unwrap();
        tree.resume_row_notifications(f).unwrap();
        tree.resume_row_notifications(folder).unwrap();
        assert_eq!(
            tree.resume_row_notifications(folder),
            Err(Error::UnbalancedSuspension)
        );
        assert_eq!(tree.get_value_by_name(folder, "bytes").unwrap(), Value::Int64(7));
    }
}
