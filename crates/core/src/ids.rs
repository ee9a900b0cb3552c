//! Identifier types shared by the schema, the data tree and the event layer.

/// Index of a model in its schema.
pub type ModelId = usize;

/// Index of a column in its schema. Column ids are unique across all models.
pub type ColumnId = usize;

/// Stable identity of a row inside one data tree.
pub type RowId = u64;

/// Identity of a data set inside one data tree.
pub type DataSetId = u64;

/// Monotonic id source owned by a single data tree.
///
/// Ids are never reused, so a stale id can be told apart from a live one.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Creates an allocator that starts at 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next unused id.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Returns the id the next call to `next_id` will produce.
    pub fn peek(&self) -> u64 {
        self.next
    }
}
