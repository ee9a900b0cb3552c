//! Event delivery with hold/release batching.
//!
//! A `Notifier` owns the listeners of one data tree. While at least one hold
//! is open, emitted events are collected in an [`EventBatch`]; releasing the
//! last hold delivers the batch in order.

use crate::event::{DataEvent, EventBatch, EventKind};
use crate::subscription::{SubscriptionId, SubscriptionManager};

/// Routes data tree events to subscribers.
pub struct Notifier {
    subscriptions: SubscriptionManager,
    pending: EventBatch,
    holds: usize,
    /// When false, `hold` is ignored and every event is delivered at once.
    batching: bool,
    delivered: u64,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Notifier {
    /// Creates a notifier.
    pub fn new(batching: bool) -> Self {
        Self {
            subscriptions: SubscriptionManager::new(),
            pending: EventBatch::new(),
            holds: 0,
            batching,
            delivered: 0,
        }
    }

    /// Registers a listener for every event.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        self.subscriptions.subscribe(callback)
    }

    /// Registers a listener for one kind of event.
    pub fn subscribe_kind<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        self.subscriptions.subscribe_kind(kind, callback)
    }

    /// Removes a listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// Returns true while events are being held.
    #[inline]
    pub fn is_held(&self) -> bool {
        self.holds > 0
    }

    /// Returns the events waiting for release.
    #[inline]
    pub fn pending(&self) -> &EventBatch {
        &self.pending
    }

    /// Total number of events delivered so far.
    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Opens a hold.
    pub fn hold(&mut self) {
        if self.batching {
            self.holds += 1;
        }
    }

    /// Closes a hold, delivering the pending batch when the last one closes.
    ///
    /// Returns the number of events delivered.
    pub fn release(&mut self) -> usize {
        if !self.batching || self.holds == 0 {
            return 0;
        }
        self.holds -= 1;
        if self.holds > 0 {
            return 0;
        }
        let events = self.pending.drain();
        for event in &events {
            self.dispatch(event);
        }
        events.len()
    }

    /// Emits an event, holding it if a hold is open.
    pub fn emit(&mut self, event: DataEvent) {
        if self.holds > 0 {
            self.pending.push(event);
        } else {
            self.dispatch(&event);
        }
    }

    /// Drops pending events without delivering them.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn dispatch(&mut self, event: &DataEvent) {
        self.delivered += 1;
        if !self.subscriptions.is_empty() {
            self.subscriptions.notify_all(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use cambium_core::RowId;
    use core::cell::RefCell;

    fn recorder(notifier: &mut Notifier) -> Rc<RefCell<Vec<DataEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        notifier.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_emit_without_hold_dispatches() {
        let mut notifier = Notifier::new(true);
        let seen = recorder(&mut notifier);

        notifier.emit(DataEvent::value_changed(1, 0));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(notifier.delivered(), 1);
    }

    #[test]
    fn test_nested_holds_release_once() {
        let mut notifier = Notifier::new(true);
        let seen = recorder(&mut notifier);

        notifier.hold();
        notifier.hold();
        notifier.emit(DataEvent::value_changed(1, 0));
        notifier.emit(DataEvent::value_changed(1, 1));
        notifier.emit(DataEvent::value_changed(2, 0));

        assert_eq!(notifier.release(), 0);
        assert!(seen.borrow().is_empty());
        assert_eq!(notifier.release(), 2);

        let rows: Vec<RowId> = seen.borrow().iter().map(|e| e.row()).collect();
        assert_eq!(rows, alloc::vec![1, 2]);
        assert!(!notifier.is_held());
    }

    #[test]
    fn test_unbatched_ignores_hold() {
        let mut notifier = Notifier::new(false);
        let seen = recorder(&mut notifier);

        notifier.hold();
        notifier.emit(DataEvent::value_changed(1, 0));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(notifier.release(), 0);
    }

    #[test]
    fn test_release_without_hold_is_noop() {
        let mut notifier = Notifier::default();
        assert_eq!(notifier.release(), 0);
        assert!(notifier.pending().is_empty());
    }

    #[test]
    fn test_discard_pending() {
        let mut notifier = Notifier::default();
        let seen = recorder(&mut notifier);
        notifier.hold();
        notifier.emit(DataEvent::value_changed(1, 0));
        notifier.discard_pending();
        notifier.release();
        assert!(seen.borrow().is_empty());
    }
}
