//! Cambium Core - Core types, schema definitions and dependency registry.
//!
//! This crate provides the foundational types for the Cambium computed-value store:
//!
//! - `DataType`: Supported data types (Boolean, Int32, Int64, Float64, String, DateTime, Bytes)
//! - `Value`: Runtime values held by row cells
//! - `schema`: Model tree, columns, expressions and the `DependencyRegistry`
//! - `Error`: Error types for schema registration and row operations
//!
//! # Example
//!
//! ```rust
//! use cambium_core::schema::{Expr, SchemaBuilder};
//! use cambium_core::DataType;
//!
//! let mut builder = SchemaBuilder::new("order").unwrap();
//! let line = builder.add_child_model(builder.root(), "line").unwrap();
//! let qty = builder.add_column(line, "qty", DataType::Int64).unwrap();
//! let total = builder
//!     .add_expression(builder.root(), "total", DataType::Int64, Expr::sum(qty))
//!     .unwrap();
//! let schema = builder.build().unwrap();
//!
//! assert_eq!(schema.direct_dependents(qty), &[total]);
//! assert_eq!(schema.aggregate_columns(line), &[total]);
//! ```

#![no_std]

extern crate alloc;

mod error;
mod ids;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result};
pub use ids::{ColumnId, DataSetId, IdAllocator, ModelId, RowId};
pub use types::DataType;
pub use value::Value;
