//! Cambium Data - Row tree and dependency-tracked computation engine.
//!
//! A [`DataTree`] holds the rows of one [`Schema`](cambium_core::schema::Schema):
//! nested, ordered data sets mirroring the model tree. Stored expression
//! columns are kept up to date as rows change:
//!
//! - a value change invalidates the expressions reading it, on the same row,
//!   on the ancestor holding an aggregate, or on every descendant reading a
//!   parent column
//! - inserting or removing a row invalidates the aggregates above it
//! - invalidations are queued in dependency order and recomputed when the
//!   outermost computation bracket closes
//!
//! Rows can be edited transactionally, moved within their data set and
//! backed up into a [`RowSnapshot`].
//!
//! # Example
//!
//! ```rust
//! use cambium_core::schema::{Expr, SchemaBuilder};
//! use cambium_core::{DataType, Value};
//! use cambium_data::DataTree;
//! use std::rc::Rc;
//!
//! let mut builder = SchemaBuilder::new("order").unwrap();
//! let line = builder.add_child_model(builder.root(), "line").unwrap();
//! let qty = builder.add_column(line, "qty", DataType::Int64).unwrap();
//! let total = builder
//!     .add_expression(builder.root(), "total", DataType::Int64, Expr::sum(qty))
//!     .unwrap();
//!
//! let mut tree = DataTree::new(Rc::new(builder.build().unwrap()));
//! let order = tree.append_row(tree.root_data_set()).unwrap();
//! let lines = tree.child_data_set(order, line).unwrap();
//!
//! tree.suspend_computation();
//! for n in 1..=3 {
//!     let row = tree.append_row(lines).unwrap();
//!     tree.set_value(row, qty, Value::Int64(n)).unwrap();
//! }
//! tree.resume_computation().unwrap();
//!
//! assert_eq!(tree.get_value(order, total).unwrap(), Value::Int64(6));
//! assert_eq!(tree.stats().recomputes(), 2);
//! ```

#![no_std]

extern crate alloc;

mod data_set;
mod edit;
mod engine;
mod eval;
mod options;
mod queue;
mod relocate;
mod row;
mod stats;
mod tree;

pub use options::DataTreeOptions;
pub use relocate::RowSnapshot;
pub use row::RowState;
pub use stats::EngineStats;
pub use tree::DataTree;

pub use cambium_reactive::{DataEvent, EventKind, SubscriptionId};
