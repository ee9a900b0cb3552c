//! Model definition for Cambium schemas.

use crate::ids::{ColumnId, ModelId};
use alloc::string::String;
use alloc::vec::Vec;

/// A node in the schema tree describing one row shape.
///
/// The position of a child in `children` is also the index of the matching
/// child data set on every row of this model.
#[derive(Clone, Debug)]
pub struct Model {
    /// Model index in the schema.
    id: ModelId,
    /// Model name, unique within the schema.
    name: String,
    /// Parent model, None for the root.
    parent: Option<ModelId>,
    /// Distance from the root.
    depth: usize,
    /// Child models in declaration order.
    children: Vec<ModelId>,
    /// Declared columns in slot order.
    columns: Vec<ColumnId>,
}

impl Model {
    pub(crate) fn new(id: ModelId, name: String, parent: Option<ModelId>, depth: usize) -> Self {
        Self {
            id,
            name,
            parent,
            depth,
            children: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub(crate) fn push_child(&mut self, child: ModelId) {
        self.children.push(child);
    }

    pub(crate) fn push_column(&mut self, column: ColumnId) -> usize {
        self.columns.push(column);
        self.columns.len() - 1
    }

    #[inline]
    pub fn id(&self) -> ModelId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<ModelId> {
        self.parent
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn children(&self) -> &[ModelId] {
        &self.children
    }

    #[inline]
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Returns the child-data-set index of `child`, if it is a direct child.
    pub fn child_index(&self, child: ModelId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_children_and_columns() {
        let mut model = Model::new(0, "order".into(), None, 0);
        model.push_child(1);
        model.push_child(4);
        assert_eq!(model.push_column(0), 0);
        assert_eq!(model.push_column(2), 1);

        assert!(model.is_root());
        assert_eq!(model.child_index(4), Some(1));
        assert_eq!(model.child_index(2), None);
        assert_eq!(model.columns(), &[0, 2]);
    }
}
