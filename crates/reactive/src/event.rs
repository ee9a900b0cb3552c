//! Change events raised by a data tree.
//!
//! An `EventBatch` collects events raised while notifications are held and
//! coalesces consecutive value changes of the same row into one event.

use alloc::vec::Vec;
use cambium_core::{ColumnId, DataSetId, RowId};

/// Discriminant of a [`DataEvent`], used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ValueChanged,
    RowInserted,
    RowRemoved,
}

/// A change to a data tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataEvent {
    /// Stored values of `row` changed.
    ValueChanged { row: RowId, columns: Vec<ColumnId> },
    /// `row` became visible at `index` of `data_set`.
    RowInserted {
        data_set: DataSetId,
        row: RowId,
        index: usize,
    },
    /// `row` was taken out of `data_set`; `index` is its position before removal.
    RowRemoved {
        data_set: DataSetId,
        row: RowId,
        index: usize,
    },
}

impl DataEvent {
    /// Creates a value-changed event for a single column.
    pub fn value_changed(row: RowId, column: ColumnId) -> Self {
        DataEvent::ValueChanged {
            row,
            columns: alloc::vec![column],
        }
    }

    /// Returns the row this event is about.
    pub fn row(&self) -> RowId {
        match self {
            DataEvent::ValueChanged { row, .. }
            | DataEvent::RowInserted { row, .. }
            | DataEvent::RowRemoved { row, .. } => *row,
        }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            DataEvent::ValueChanged { .. } => EventKind::ValueChanged,
            DataEvent::RowInserted { .. } => EventKind::RowInserted,
            DataEvent::RowRemoved { .. } => EventKind::RowRemoved,
        }
    }
}

/// An ordered batch of pending events.
#[derive(Clone, Debug, Default)]
pub struct EventBatch {
    events: Vec<DataEvent>,
}

impl EventBatch {
    /// Creates a new empty batch.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    ///
    /// A value change directly following a value change of the same row is
    /// merged into it.
    pub fn push(&mut self, event: DataEvent) {
        if let DataEvent::ValueChanged { row, columns } = &event {
            if let Some(DataEvent::ValueChanged {
                row: last_row,
                columns: last_columns,
            }) = self.events.last_mut()
            {
                if last_row == row {
                    for column in columns {
                        if !last_columns.contains(column) {
                            last_columns.push(*column);
                        }
                    }
                    return;
                }
            }
        }
        self.events.push(event);
    }

    /// Returns true if there are no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns the events in order.
    #[inline]
    pub fn events(&self) -> &[DataEvent] {
        &self.events
    }

    /// Takes every event out of the batch.
    pub fn drain(&mut self) -> Vec<DataEvent> {
        core::mem::take(&mut self.events)
    }

    /// Merges another batch into this one.
    pub fn merge(&mut self, other: EventBatch) {
        for event in other.events {
            self.push(event);
        }
    }

    /// Clears all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
