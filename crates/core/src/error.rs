//! Error types for Cambium.

use crate::types::DataType;
use crate::ids::{ColumnId, DataSetId, RowId};
use alloc::string::String;
use core::fmt;

/// Result type alias for Cambium operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for schema registration and row operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Type mismatch error.
    TypeMismatch {
        expected: DataType,
        got: DataType,
    },
    /// Null written into a non-nullable column.
    NullConstraint {
        column: String,
    },
    /// Invalid schema definition.
    InvalidSchema {
        message: String,
    },
    /// Model not found.
    ModelNotFound {
        name: String,
    },
    /// Column not found.
    ColumnNotFound {
        model: String,
        column: String,
    },
    /// An expression column depends on itself, directly or transitively.
    CircularComputation {
        column: String,
    },
    /// Edit call that does not match the row's edit state.
    InvalidEditState {
        message: String,
    },
    /// `resume_computation` without a matching `suspend_computation`.
    UnbalancedSuspension,
    /// Row id unknown to the tree.
    RowNotFound {
        row: RowId,
    },
    /// Row exists but is not attached to a data set.
    RowDetached {
        row: RowId,
    },
    /// Data set id unknown to the tree.
    DataSetNotFound {
        data_set: DataSetId,
    },
    /// Position outside of a data set.
    IndexOutOfRange {
        index: isize,
        len: usize,
    },
    /// Direct write into an expression column.
    ReadOnlyColumn {
        column: ColumnId,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {:?}, got {:?}", expected, got)
            }
            Error::NullConstraint { column } => {
                write!(f, "Null constraint violation on column: {}", column)
            }
            Error::InvalidSchema { message } => write!(f, "Invalid schema: {}", message),
            Error::ModelNotFound { name } => write!(f, "Model not found: {}", name),
            Error::ColumnNotFound { model, column } => {
                write!(f, "Column {} not found in model {}", column, model)
            }
            Error::CircularComputation { column } => {
                write!(f, "Circular computation detected on column: {}", column)
            }
            Error::InvalidEditState { message } => write!(f, "Invalid edit state: {}", message),
            Error::UnbalancedSuspension => {
                write!(f, "resume_computation called without a matching suspend_computation")
            }
            Error::RowNotFound { row } => write!(f, "Row not found: {}", row),
            Error::RowDetached { row } => write!(f, "Row {} is detached", row),
            Error::DataSetNotFound { data_set } => write!(f, "Data set not found: {}", data_set),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for data set of length {}", index, len)
            }
            Error::ReadOnlyColumn { column } => {
                write!(f, "Column {} is computed and cannot be written", column)
            }
            Error::InvalidOperation { message } => write!(f, "Invalid operation: {}", message),
        }
    }
}

impl Error {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates a null constraint error.
    pub fn null_constraint(column: impl Into<String>) -> Self {
        Error::NullConstraint {
            column: column.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a model not found error.
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Error::ModelNotFound { name: name.into() }
    }

    /// Creates a column not found error.
    pub fn column_not_found(model: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            model: model.into(),
            column: column.into(),
        }
    }

    /// Creates a circular computation error.
    pub fn circular_computation(column: impl Into<String>) -> Self {
        Error::CircularComputation {
            column: column.into(),
        }
    }

    /// Creates an invalid edit state error.
    pub fn invalid_edit_state(message: impl Into<String>) -> Self {
        Error::InvalidEditState {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::type_mismatch(DataType::Int32, DataType::String);
        assert!(err.to_string().contains("Type mismatch"));

        let err = Error::circular_computation("order.total");
        assert!(err.to_string().contains("order.total"));

        let err = Error::IndexOutOfRange { index: -1, len: 3 };
        assert!(err.to_string().contains("-1"));

        assert!(Error::UnbalancedSuspension.to_string().contains("resume_computation"));
    }

    #[test]
    fn test_error_constructors() {
        match Error::column_not_found("order", "qty") {
            Error::ColumnNotFound { model, column } => {
                assert_eq!(model, "order");
                assert_eq!(column, "qty");
            }
            _ => panic!("Wrong error type"),
        }

        assert_eq!(
            Error::invalid_edit_state("busy"),
            Error::InvalidEditState {
                message: "busy".into()
            }
        );
    }
}
