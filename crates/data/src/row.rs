//! Row nodes held by a data tree.
//!
//! A `RowNode` is the arena entry behind a `RowId`. Rows reference their
//! parent and containing data set by id only; ownership runs strictly from a
//! data set to its rows and from a row to its child data sets.

use alloc::vec::Vec;
use cambium_core::{ColumnId, DataSetId, ModelId, RowId, Value};

/// Lifecycle state of a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RowState {
    /// Not part of any data set.
    Detached,
    /// Attached with no edit in progress.
    Clean,
    /// Attached (or being moved) with buffered edits.
    Editing,
    /// Created by `begin_add`, inserted on commit.
    Adding,
}

impl RowState {
    /// Returns true while the row has an edit buffer.
    #[inline]
    pub fn is_editing(self) -> bool {
        matches!(self, RowState::Editing | RowState::Adding)
    }
}

/// Pending values of a row under edit.
#[derive(Clone, Debug)]
pub(crate) struct EditBuffer {
    /// Full value vector, concrete slots hold the edited values.
    pub(crate) values: Vec<Value>,
    /// Concrete columns written since the edit began, in write order.
    pub(crate) touched: Vec<ColumnId>,
    /// Data set an added row is inserted into on commit.
    pub(crate) target: Option<DataSetId>,
}

impl EditBuffer {
    pub(crate) fn new(values: Vec<Value>, target: Option<DataSetId>) -> Self {
        Self {
            values,
            touched: Vec::new(),
            target,
        }
    }

    pub(crate) fn write(&mut self, column: ColumnId, slot: usize, value: Value) {
        self.values[slot] = value;
        if !self.touched.contains(&column) {
            self.touched.push(column);
        }
    }
}

/// A row in a data tree.
#[derive(Clone, Debug)]
pub(crate) struct RowNode {
    pub(crate) id: RowId,
    /// None while detached.
    pub(crate) model: Option<ModelId>,
    pub(crate) parent: Option<RowId>,
    pub(crate) data_set: Option<DataSetId>,
    /// One slot per column of the model.
    pub(crate) values: Vec<Value>,
    /// One data set per child model, in model order.
    pub(crate) children: Vec<DataSetId>,
    pub(crate) state: RowState,
    /// Incremented on each stored write.
    pub(crate) version: u64,
    pub(crate) edit: Option<EditBuffer>,
    /// Row notification suspension depth.
    pub(crate) notify_suspended: usize,
    /// Columns written while notifications were suspended.
    pub(crate) pending_changed: Vec<ColumnId>,
    /// Columns of this row invalidated while notifications were suspended.
    pub(crate) deferred: Vec<ColumnId>,
}

impl RowNode {
    /// Creates a detached row.
    pub(crate) fn detached(id: RowId) -> Self {
        Self {
            id,
            model: None,
            parent: None,
            data_set: None,
            values: Vec::new(),
            children: Vec::new(),
            state: RowState::Detached,
            version: 1,
            edit: None,
            notify_suspended: 0,
            pending_changed: Vec::new(),
            deferred: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_attached(&self) -> bool {
        self.data_set.is_some()
    }

    /// Records a column changed while notifications are suspended.
    pub(crate) fn mark_pending(&mut self, column: ColumnId) {
        if !self.pending_changed.contains(&column) {
            self.pending_changed.push(column);
        }
    }

    /// Records an invalidation to replay when notifications resume.
    pub(crate) fn defer(&mut self, column: ColumnId) {
        if !self.deferred.contains(&column) {
            self.deferred.push(column);
        }
    }

    /// Drops model, values and children, keeping identity, the notification
    /// suspension depth and, if asked, the edit.
    pub(crate) fn clear(&mut self, keep_edit: bool) {
        self.model = None;
        self.parent = None;
        self.data_set = None;
        self.values.clear();
        self.children.clear();
        self.pending_changed.clear();
        self.deferred.clear();
        if keep_edit && self.edit.is_some() {
            self.state = RowState::Editing;
        } else {
            self.edit = None;
            self.state = RowState::Detached;
        }
    }
}
