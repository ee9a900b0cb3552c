//! Subscription management for data tree events.
//!
//! This module provides subscription IDs and a manager for tracking
//! listeners interested in `DataEvent`s.

use crate::event::{DataEvent, EventKind};
use alloc::boxed::Box;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for event notifications.
pub type EventCallback = Box<dyn Fn(&DataEvent)>;

/// A subscription to data tree events.
pub struct Subscription {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on events
    callback: EventCallback,
    /// Only events of this kind are delivered, if set
    filter: Option<EventKind>,
}

impl Subscription {
    /// Creates a new subscription receiving every event.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&DataEvent) + 'static,
    {
        Self {
            id,
            callback: Box::new(callback),
            filter: None,
        }
    }

    /// Creates a subscription receiving only events of `kind`.
    pub fn filtered<F>(id: SubscriptionId, kind: EventKind, callback: F) -> Self
    where
        F: Fn(&DataEvent) + 'static,
    {
        let mut sub = Self::new(id, callback);
        sub.filter = Some(kind);
        sub
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true if this subscription wants `event`.
    #[inline]
    pub fn accepts(&self, event: &DataEvent) -> bool {
        self.filter.map_or(true, |kind| kind == event.kind())
    }

    /// Notifies this subscription of an event.
    pub fn notify(&self, event: &DataEvent) {
        if self.accepts(event) {
            (self.callback)(event);
        }
    }
}

/// Manages subscriptions of one data tree.
pub struct SubscriptionManager {
    /// Active subscriptions
    subscriptions: HashMap<SubscriptionId, Subscription>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to every event with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        let id = self.allocate_id();
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    /// Subscribes to events of one kind.
    pub fn subscribe_kind<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&DataEvent) + 'static,
    {
        let id = self.allocate_id();
        self.subscriptions
            .insert(id, Subscription::filtered(id, kind, callback));
        id
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Notifies all subscriptions of an event.
    pub fn notify_all(&self, event: &DataEvent) {
        for sub in self.subscriptions.values() {
            sub.notify(event);
        }
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
