//! Ordered row collections.

use alloc::vec::Vec;
use cambium_core::{DataSetId, ModelId, RowId};

/// An ordered collection of rows of one model.
///
/// The root data set has no parent row; every other data set belongs to one
/// row and holds that row's children of one child model.
#[derive(Clone, Debug)]
pub(crate) struct DataSet {
    pub(crate) id: DataSetId,
    pub(crate) model: ModelId,
    pub(crate) parent_row: Option<RowId>,
    pub(crate) rows: Vec<RowId>,
}

impl DataSet {
    pub(crate) fn new(id: DataSetId, model: ModelId, parent_row: Option<RowId>) -> Self {
        Self {
            id,
            model,
            parent_row,
            rows: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn position(&self, row: RowId) -> Option<usize> {
        self.rows.iter().position(|&r| r == row)
    }
}
