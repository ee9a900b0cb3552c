//! Invalidation and recompute engine.
//!
//! Value changes and structural changes are classified against the
//! dependency registry into (column, row) invalidations. They are queued in
//! dependency order and recomputed when the outermost computation bracket
//! closes. Writes made by a recompute may queue more work; the flush runs
//! until the queue is empty.

use crate::tree::DataTree;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use cambium_core::schema::Column;
use cambium_core::{ColumnId, Error, ModelId, Result, RowId, Value};
use cambium_reactive::DataEvent;
use core::cmp::Ordering;

impl DataTree {
    /// Opens a computation bracket.
    ///
    /// Invalidations are queued and listener events held until the matching
    /// outermost [`resume_computation`](Self::resume_computation).
    pub fn suspend_computation(&mut self) {
        self.suspend_count += 1;
        self.notifier.hold();
    }

    /// Closes a computation bracket, flushing when it was the outermost one.
    pub fn resume_computation(&mut self) -> Result<()> {
        if self.suspend_count == 0 {
            return Err(Error::UnbalancedSuspension);
        }
        self.suspend_count -= 1;
        if self.suspend_count == 0 && !self.flushing {
            self.flush();
        }
        let delivered = self.notifier.release();
        if delivered > 0 {
            tracing::trace!(target: "cambium_data::engine", delivered, "events delivered");
        }
        Ok(())
    }

    /// Returns true while a computation bracket is open.
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspend_count > 0
    }

    #[inline]
    pub fn suspension_depth(&self) -> usize {
        self.suspend_count
    }

    /// Number of columns with queued rows.
    #[inline]
    pub fn pending_invalidations(&self) -> usize {
        self.queue.len()
    }

    /// Runs `f` inside a computation bracket, closing it on error too.
    pub(crate) fn bracket<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.suspend_computation();
        let result = f(self);
        let resumed = self.resume_computation();
        let value = result?;
        resumed?;
        Ok(value)
    }

    /// Invalidates every expression reading `column` for the rows affected by
    /// a change on `row`.
    pub fn on_value_changed(&mut self, row: RowId, column: ColumnId) -> Result<()> {
        if !self.node(row)?.is_attached() {
            return Err(Error::RowDetached { row });
        }
        self.bracket(|tree| {
            tree.classify(row, column);
            Ok(())
        })
    }

    /// Classifies the direct dependents of `column` by level relative to `row`.
    pub(crate) fn classify(&mut self, row: RowId, column: ColumnId) {
        let schema = Rc::clone(&self.schema);
        let model = match self.rows.get(&row).and_then(|node| node.model) {
            Some(model) => model,
            None => return,
        };
        let depth = match schema.model(model) {
            Some(m) => m.depth(),
            None => return,
        };

        for &dependent in schema.direct_dependents(column) {
            let col = match schema.column(dependent) {
                Some(col) if col.is_stored() => col,
                _ => continue,
            };
            let target_depth = match schema.model(col.model()) {
                Some(m) => m.depth(),
                None => continue,
            };
            match target_depth.cmp(&depth) {
                Ordering::Equal => self.invalidate(dependent, row),
                Ordering::Less => {
                    if let Some(ancestor) = self.ancestor_at_depth(row, target_depth) {
                        self.invalidate(dependent, ancestor);
                    }
                }
                Ordering::Greater => {
                    if let Some(path) = schema.descent_path(model, col.model()) {
                        for descendant in self.descendants(row, &path) {
                            self.invalidate(dependent, descendant);
                        }
                    }
                }
            }
        }
    }

    /// Queues `row` for recomputation of `column`.
    ///
    /// While the row's notifications are suspended the invalidation is kept
    /// on the row and queued when they resume.
    pub(crate) fn invalidate(&mut self, column: ColumnId, row: RowId) {
        match self.rows.get_mut(&row) {
            Some(node) if node.notify_suspended > 0 => {
                node.defer(column);
                tracing::trace!(target: "cambium_data::engine", row, column, "row notifications suspended, invalidation deferred");
                return;
            }
            Some(_) => {}
            None => return,
        }
        let schema = Rc::clone(&self.schema);
        if self
            .queue
            .enqueue(column, row, |a, b| schema.depends_on(b, a))
        {
            self.stats.record_invalidation();
            tracing::trace!(target: "cambium_data::engine", row, column, "invalidated");
        }
    }

    /// Invalidates the ancestor-level aggregates fed by rows of `model`.
    pub(crate) fn invalidate_aggregates(&mut self, row: RowId, model: ModelId) {
        let schema = Rc::clone(&self.schema);
        for &column in schema.aggregate_columns(model) {
            let col = match schema.column(column) {
                Some(col) if col.is_stored() => col,
                _ => continue,
            };
            let depth = match schema.model(col.model()) {
                Some(m) => m.depth(),
                None => continue,
            };
            if let Some(ancestor) = self.ancestor_at_depth(row, depth) {
                self.invalidate(column, ancestor);
            }
        }
    }

    /// Drains the invalidation queue.
    fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.flushing = true;
        self.stats.record_flush();
        let mut recomputed = 0usize;
        let mut skipped = 0usize;
        while let Some((column, rows)) = self.queue.pop_front() {
            for row in rows {
                if !self.is_attached(row) {
                    self.stats.record_skipped_stale();
                    skipped += 1;
                    tracing::trace!(target: "cambium_data::engine", row, column, "skipping stale row");
                    continue;
                }
                self.recompute(column, row, true);
                recomputed += 1;
            }
        }
        self.flushing = false;
        tracing::debug!(target: "cambium_data::engine", recomputed, skipped, "flush complete");
    }

    /// Evaluates a stored expression for `row` and writes the result.
    ///
    /// Virtual expressions and concrete columns are left alone.
    pub(crate) fn recompute(&mut self, column: ColumnId, row: RowId, notify: bool) {
        let schema = Rc::clone(&self.schema);
        let col = match schema.column(column) {
            Some(col) if col.is_expression() && col.is_stored() => col,
            _ => return,
        };
        let value = self.evaluate_column(col, row).coerce(col.data_type());
        self.stats.record_recompute();
        self.store_value(row, col, value, notify);
    }

    /// Writes a stored value.
    ///
    /// With `notify` the write raises a value-changed event and classifies
    /// dependents, or is recorded for later if the row's notifications are
    /// suspended. Returns true if the value was written.
    pub(crate) fn store_value(&mut self, row: RowId, column: &Column, value: Value, notify: bool) -> bool {
        let skip_unchanged = self.options.skip_unchanged_writes;
        let node = match self.rows.get_mut(&row) {
            Some(node) => node,
            None => return false,
        };
        let slot = match node.values.get_mut(column.slot()) {
            Some(slot) => slot,
            None => return false,
        };
        if skip_unchanged && *slot == value {
            return false;
        }
        *slot = value;
        node.version += 1;
        if !notify || !node.is_attached() {
            return true;
        }
        if node.notify_suspended > 0 {
            node.mark_pending(column.id());
            return true;
        }
        self.emit(DataEvent::value_changed(row, column.id()));
        self.classify(row, column.id());
        true
    }

    pub(crate) fn emit(&mut self, event: DataEvent) {
        self.stats.record_event();
        self.notifier.emit(event);
    }

    /// Walks up from `row` to its ancestor at `depth`.
    pub(crate) fn ancestor_at_depth(&self, row: RowId, depth: usize) -> Option<RowId> {
        let mut current = row;
        let mut current_depth = self.depth_of(row)?;
        while current_depth > depth {
            current = self.rows.get(&current)?.parent?;
            current_depth -= 1;
        }
        if current_depth == depth {
            Some(current)
        } else {
            None
        }
    }

    /// Collects the rows reached from `row` by descending through `path`.
    pub(crate) fn descendants(&self, row: RowId, path: &[ModelId]) -> Vec<RowId> {
        let mut frontier = vec![row];
        for &model in path {
            let mut next = Vec::new();
            for &current in &frontier {
                if let Some(set) = self
                    .child_set_of(current, model)
                    .and_then(|id| self.data_sets.get(&id))
                {
                    next.extend_from_slice(&set.rows);
                }
            }
            frontier = next;
        }
        frontier
    }
}
