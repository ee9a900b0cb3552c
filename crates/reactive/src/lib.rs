//! Cambium Reactive - Change events and subscriptions for Cambium data trees.
//!
//! A data tree reports every visible change as a [`DataEvent`]. Listeners
//! register through a [`Notifier`], which holds events while a computation
//! bracket is open and delivers them, coalesced, once it closes.
//!
//! # Core Concepts
//!
//! - `DataEvent`: a value change, row insertion or row removal
//! - `EventBatch`: ordered pending events, merging consecutive value changes of one row
//! - `SubscriptionManager`: tracks listener callbacks
//! - `Notifier`: hold/release batching on top of the subscriptions
//!
//! # Example
//!
//! ```rust
//! use cambium_reactive::{DataEvent, Notifier};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let mut notifier = Notifier::new(true);
//! let count = Rc::new(Cell::new(0));
//! let seen = count.clone();
//! notifier.subscribe(move |_| seen.set(seen.get() + 1));
//!
//! notifier.hold();
//! notifier.emit(DataEvent::value_changed(1, 0));
//! notifier.emit(DataEvent::value_changed(1, 1));
//! assert_eq!(count.get(), 0);
//!
//! notifier.release();
//! assert_eq!(count.get(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod event;
pub mod notify;
pub mod subscription;

pub use event::{DataEvent, EventBatch, EventKind};
pub use notify::Notifier;
pub use subscription::{EventCallback, Subscription, SubscriptionId, SubscriptionManager};
