//! Expression AST for computed columns.
//!
//! An expression reads scalar values from its own row (or an ancestor row) and
//! aggregates over descendant rows. The base columns an expression reads are
//! derived from the tree itself, so they cannot drift from the formula.

use crate::ids::ColumnId;
use crate::value::Value;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

/// User-supplied scalar function used by [`Expr::Call`].
pub type ScalarFn = fn(&[Value]) -> Value;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// Aggregate functions over descendant rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Expression AST node.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Scalar read of a column on the evaluated row's model or one of its ancestors.
    Column(ColumnId),
    /// Aggregate over every descendant row that owns `column`.
    Aggregate { func: AggregateFunc, column: ColumnId },
    /// Binary operation.
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary operation.
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// First non-null argument.
    Coalesce(Vec<Expr>),
    /// Conditional; a Null condition selects `otherwise`.
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Call of a user-supplied scalar function.
    Call {
        name: String,
        func: ScalarFn,
        args: Vec<Expr>,
    },
}

/// Source of the values an expression reads.
///
/// The data layer implements this for a concrete row.
pub trait EvalContext {
    /// Returns the value of a scalar base column for the row being evaluated.
    fn scalar(&self, column: ColumnId) -> Value;

    /// Returns the aggregate of `column` over the evaluated row's descendants.
    fn aggregate(&self, func: AggregateFunc, column: ColumnId) -> Value;
}

impl Expr {
    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Creates a column reference expression.
    pub fn column(column: ColumnId) -> Self {
        Expr::Column(column)
    }

    /// Creates an aggregate expression.
    pub fn aggregate(func: AggregateFunc, column: ColumnId) -> Self {
        Expr::Aggregate { func, column }
    }

    /// SUM over descendant rows.
    pub fn sum(column: ColumnId) -> Self {
        Self::aggregate(AggregateFunc::Sum, column)
    }

    /// COUNT of non-null values over descendant rows.
    pub fn count(column: ColumnId) -> Self {
        Self::aggregate(AggregateFunc::Count, column)
    }

    /// AVG over descendant rows.
    pub fn avg(column: ColumnId) -> Self {
        Self::aggregate(AggregateFunc::Avg, column)
    }

    /// MIN over descendant rows.
    pub fn min(column: ColumnId) -> Self {
        Self::aggregate(AggregateFunc::Min, column)
    }

    /// MAX over descendant rows.
    pub fn max(column: ColumnId) -> Self {
        Self::aggregate(AggregateFunc::Max, column)
    }

    /// Creates a binary expression.
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Add, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Sub, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Mul, right)
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Div, right)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Eq, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Gt, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Lt, right)
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Or, right)
    }

    /// Creates a unary expression.
    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Self::unary(UnaryOp::Not, expr)
    }

    pub fn neg(expr: Expr) -> Self {
        Self::unary(UnaryOp::Neg, expr)
    }

    pub fn is_null(expr: Expr) -> Self {
        Self::unary(UnaryOp::IsNull, expr)
    }

    /// Creates a COALESCE expression.
    pub fn coalesce(args: Vec<Expr>) -> Self {
        Expr::Coalesce(args)
    }

    /// Creates a conditional expression.
    pub fn if_then_else(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Creates a call of a user-supplied scalar function.
    pub fn call(name: impl Into<String>, func: ScalarFn, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            func,
            args,
        }
    }

    /// Visits every column reference; the flag is true for aggregate references.
    pub fn visit_columns<F>(&self, f: &mut F)
    where
        F: FnMut(ColumnId, bool),
    {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(c) => f(*c, false),
            Expr::Aggregate { column, .. } => f(*column, true),
            Expr::BinaryOp { left, right, .. } => {
                left.visit_columns(f);
                right.visit_columns(f);
            }
            Expr::UnaryOp { expr, .. } => expr.visit_columns(f),
            Expr::Coalesce(args) | Expr::Call { args, .. } => {
                for arg in args {
                    arg.visit_columns(f);
                }
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                condition.visit_columns(f);
                then.visit_columns(f);
                otherwise.visit_columns(f);
            }
        }
    }

    /// Returns the distinct columns this expression reads, in order of appearance.
    pub fn base_columns(&self) -> Vec<ColumnId> {
        let mut columns = Vec::new();
        self.visit_columns(&mut |c, _| {
            if !columns.contains(&c) {
                columns.push(c);
            }
        });
        columns
    }

    /// Evaluates the expression against a context.
    pub fn evaluate<C: EvalContext + ?Sized>(&self, ctx: &C) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Column(c) => ctx.scalar(*c),
            Expr::Aggregate { func, column } => ctx.aggregate(*func, *column),
            Expr::BinaryOp { left, op, right } => {
                let l = left.evaluate(ctx);
                let r = right.evaluate(ctx);
                eval_binary_op(*op, &l, &r)
            }
            Expr::UnaryOp { op, expr } => eval_unary_op(*op, &expr.evaluate(ctx)),
            Expr::Coalesce(args) => args
                .iter()
                .map(|a| a.evaluate(ctx))
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null),
            Expr::If {
                condition,
                then,
                otherwise,
            } => match condition.evaluate(ctx) {
                Value::Boolean(true) => then.evaluate(ctx),
                _ => otherwise.evaluate(ctx),
            },
            Expr::Call { func, args, .. } => {
                let values: Vec<Value> = args.iter().map(|a| a.evaluate(ctx)).collect();
                func(&values)
            }
        }
    }
}

/// Applies a binary operator with SQL NULL semantics.
pub fn eval_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return match op {
            // NULL AND FALSE = FALSE, NULL OR TRUE = TRUE
            BinaryOp::And if matches!(left, Value::Boolean(false)) || matches!(right, Value::Boolean(false)) => {
                Value::Boolean(false)
            }
            BinaryOp::Or if matches!(left, Value::Boolean(true)) || matches!(right, Value::Boolean(true)) => {
                Value::Boolean(true)
            }
            _ => Value::Null,
        };
    }

    match op {
        BinaryOp::Eq => Value::Boolean(left == right),
        BinaryOp::Ne => Value::Boolean(left != right),
        BinaryOp::Lt => Value::Boolean(left < right),
        BinaryOp::Le => Value::Boolean(left <= right),
        BinaryOp::Gt => Value::Boolean(left > right),
        BinaryOp::Ge => Value::Boolean(left >= right),
        BinaryOp::And => Value::Boolean(
            matches!(left, Value::Boolean(true)) && matches!(right, Value::Boolean(true)),
        ),
        BinaryOp::Or => Value::Boolean(
            matches!(left, Value::Boolean(true)) || matches!(right, Value::Boolean(true)),
        ),
        BinaryOp::Add => eval_arithmetic(left, right, |a, b| a.checked_add(b), |a, b| a + b),
        BinaryOp::Sub => eval_arithmetic(left, right, |a, b| a.checked_sub(b), |a, b| a - b),
        BinaryOp::Mul => eval_arithmetic(left, right, |a, b| a.checked_mul(b), |a, b| a * b),
        BinaryOp::Div => match right.to_f64() {
            Some(r) if r == 0.0 => Value::Null,
            _ => eval_arithmetic(left, right, |a, b| a.checked_div(b), |a, b| a / b),
        },
        BinaryOp::Mod => eval_arithmetic(left, right, |a, b| a.checked_rem(b), |a, b| a % b),
    }
}

/// Integer operands stay integral (Int32 only when both sides are Int32);
/// anything involving a float is computed in f64. Overflow yields Null.
fn eval_arithmetic<I, F>(left: &Value, right: &Value, int_op: I, float_op: F) -> Value
where
    I: Fn(i64, i64) -> Option<i64>,
    F: Fn(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Int32(a), Value::Int32(b)) => int_op(*a as i64, *b as i64)
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int32)
            .unwrap_or(Value::Null),
        (Value::Int32(_) | Value::Int64(_), Value::Int32(_) | Value::Int64(_)) => {
            let a = integer_of(left);
            let b = integer_of(right);
            int_op(a, b).map(Value::Int64).unwrap_or(Value::Null)
        }
        _ => match (left.to_f64(), right.to_f64()) {
            (Some(a), Some(b)) => Value::Float64(float_op(a, b)),
            _ => Value::Null,
        },
    }
}

fn integer_of(value: &Value) -> i64 {
    match value {
        Value::Int32(v) => *v as i64,
        Value::Int64(v) => *v,
        _ => 0,
    }
}

/// Applies a unary operator.
pub fn eval_unary_op(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => match value {
            Value::Boolean(b) => Value::Boolean(!b),
            _ => Value::Null,
        },
        UnaryOp::Neg => match value {
            Value::Int32(i) => Value::Int32(i.wrapping_neg()),
            Value::Int64(i) => Value::Int64(i.wrapping_neg()),
            Value::Float64(f) => Value::Float64(-f),
            _ => Value::Null,
        },
        UnaryOp::IsNull => Value::Boolean(value.is_null()),
        UnaryOp::IsNotNull => Value::Boolean(!value.is_null()),
    }
}

/// Folds an aggregate over a sequence of values. Nulls are skipped.
///
/// SUM stays integral while every input is an integer; AVG is always Float64;
/// AVG, MIN and MAX of no values are Null, COUNT and SUM are 0.
pub fn eval_aggregate<'a, I>(func: AggregateFunc, values: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let values = values.into_iter().filter(|v| !v.is_null());
    match func {
        AggregateFunc::Count => Value::Int64(values.count() as i64),
        AggregateFunc::Sum => {
            let mut int_sum: i64 = 0;
            let mut float_sum: f64 = 0.0;
            let mut is_float = false;
            for v in values {
                match v {
                    Value::Int32(i) => int_sum = int_sum.wrapping_add(*i as i64),
                    Value::Int64(i) => int_sum = int_sum.wrapping_add(*i),
                    Value::Float64(f) => {
                        float_sum += f;
                        is_float = true;
                    }
                    _ => {}
                }
            }
            if is_float {
                Value::Float64(float_sum + int_sum as f64)
            } else {
                Value::Int64(int_sum)
            }
        }
        AggregateFunc::Avg => {
            let mut sum = 0.0;
            let mut count = 0usize;
            for v in values.filter_map(|v| v.to_f64()) {
                sum += v;
                count += 1;
            }
            if count == 0 {
                Value::Null
            } else {
                Value::Float64(sum / count as f64)
            }
        }
        AggregateFunc::Min => values.min().cloned().unwrap_or(Value::Null),
        AggregateFunc::Max => values.max().cloned().unwrap_or(Value::Null),
    }
}
