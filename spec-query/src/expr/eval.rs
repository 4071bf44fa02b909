//! In-process interpreter for expression trees
//!
//! Stores that keep their rows in memory evaluate predicates directly with
//! [`Interpreter`]. Evaluation is pure: the subject is only read.
//!
//! Semantics:
//! - member access on a missing field, or on `null`, yields `null`
//! - `=`/`!=` compare structurally, integers and floats by numeric value
//! - `<`, `<=`, `>`, `>=` with a `null` operand are `false`; other
//!   incompatible operand types are an error
//! - `null` is falsy in boolean position, non-boolean values are an error

use std::cmp::Ordering;

use thiserror::Error;

use super::node::{ArithOp, CompareOp, Expr, LogicalOp, ParamId};
use super::value::Value;

/// Errors raised while interpreting an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The tree references a parameter the predicate does not bind
    #[error("parameter {0} is not bound by this predicate")]
    UnboundParameter(ParamId),

    /// Ordering comparison between values that have no order
    #[error("cannot apply {op} to {lhs} and {rhs}")]
    Incomparable {
        op: CompareOp,
        lhs: &'static str,
        rhs: &'static str,
    },

    /// A boolean was required
    #[error("expected bool, found {0}")]
    NotBoolean(&'static str),

    /// Arithmetic on unsupported operand types
    #[error("cannot apply {op} to {lhs} and {rhs}")]
    Arithmetic {
        op: ArithOp,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("integer overflow evaluating {0}")]
    Overflow(ArithOp),

    #[error("division by zero")]
    DivisionByZero,

    /// Method name the interpreter does not know
    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),

    /// Wrong argument count for a known method
    #[error("method `{method}` takes {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// Known method applied to values it does not accept
    #[error("method `{method}` is not defined for {target}")]
    InvalidTarget {
        method: String,
        target: &'static str,
    },

    /// The subject has no document representation
    #[error("cannot serialize subject: {0}")]
    Serialization(String),
}

/// Evaluates expressions with one parameter bound to a subject value
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'a> {
    param: ParamId,
    subject: &'a Value,
}

impl<'a> Interpreter<'a> {
    #[must_use]
    pub const fn new(param: ParamId, subject: &'a Value) -> Self {
        Self { param, subject }
    }

    /// Evaluate `expr` to a value
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Param(id) if *id == self.param => Ok(self.subject.clone()),
            Expr::Param(id) => Err(EvalError::UnboundParameter(*id)),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Member { target, field } => {
                let target = self.eval(target)?;
                Ok(target.get(field).cloned().unwrap_or(Value::Null))
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                compare(*op, &lhs, &rhs).map(Value::Bool)
            }
            Expr::Logical { op, lhs, rhs } => {
                let left = self.eval_bool(lhs)?;
                let result = match (op, left) {
                    (LogicalOp::And, false) => false,
                    (LogicalOp::Or, true) => true,
                    _ => self.eval_bool(rhs)?,
                };
                Ok(Value::Bool(result))
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_bool(inner)?)),
            Expr::Arith { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                arith(*op, &lhs, &rhs)
            }
            Expr::Call {
                target,
                method,
                args,
            } => {
                let target = self.eval(target)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                call(&target, method, &args)
            }
        }
    }

    /// Evaluate `expr` in boolean position
    pub fn eval_bool(&self, expr: &Expr) -> Result<bool, EvalError> {
        truthy(&self.eval(expr)?)
    }
}

fn truthy(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvalError::NotBoolean(other.type_name())),
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let ordering = || {
        lhs.compare(rhs).ok_or(EvalError::Incomparable {
            op,
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        })
    };
    match op {
        CompareOp::Equal => Ok(lhs.loose_eq(rhs)),
        CompareOp::NotEqual => Ok(!lhs.loose_eq(rhs)),
        _ if lhs.is_null() || rhs.is_null() => Ok(false),
        CompareOp::GreaterThan => Ok(ordering()? == Ordering::Greater),
        CompareOp::GreaterThanOrEqual => Ok(ordering()? != Ordering::Less),
        CompareOp::LessThan => Ok(ordering()? == Ordering::Less),
        CompareOp::LessThanOrEqual => Ok(ordering()? != Ordering::Greater),
    }
}

fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                ArithOp::Add => a.checked_add(*b),
                ArithOp::Sub => a.checked_sub(*b),
                ArithOp::Mul => a.checked_mul(*b),
                ArithOp::Div if *b == 0 => return Err(EvalError::DivisionByZero),
                ArithOp::Div => a.checked_div(*b),
            };
            result.map(Value::Int).ok_or(EvalError::Overflow(op))
        }
        (Value::String(a), Value::String(b)) if op == ArithOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(Value::Float(match op {
                ArithOp::Add => x + y,
                ArithOp::Sub => x - y,
                ArithOp::Mul => x * y,
                ArithOp::Div if y == 0.0 => return Err(EvalError::DivisionByZero),
                ArithOp::Div => x / y,
            })),
            _ => Err(EvalError::Arithmetic {
                op,
                lhs: a.type_name(),
                rhs: b.type_name(),
            }),
        },
    }
}

fn expect_args(method: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::Arity {
            method: method.to_string(),
            expected,
            actual: args.len(),
        })
    }
}

fn call(target: &Value, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    let invalid = || EvalError::InvalidTarget {
        method: method.to_string(),
        target: target.type_name(),
    };

    match method {
        "contains" | "starts_with" | "ends_with" => {
            expect_args(method, args, 1)?;
            let needle = &args[0];
            match (target, needle) {
                (Value::Null, _) => Ok(Value::Null),
                (Value::List(items), _) if method == "contains" => {
                    Ok(Value::Bool(items.iter().any(|item| item.loose_eq(needle))))
                }
                (Value::String(haystack), Value::String(needle)) => Ok(Value::Bool(match method {
                    "contains" => haystack.contains(needle.as_str()),
                    "starts_with" => haystack.starts_with(needle.as_str()),
                    _ => haystack.ends_with(needle.as_str()),
                })),
                _ => Err(invalid()),
            }
        }
        "to_lowercase" | "to_uppercase" => {
            expect_args(method, args, 0)?;
            match target {
                Value::Null => Ok(Value::Null),
                Value::String(s) if method == "to_lowercase" => Ok(Value::String(s.to_lowercase())),
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                _ => Err(invalid()),
            }
        }
        "len" | "is_empty" => {
            expect_args(method, args, 0)?;
            let len = match target {
                Value::Null => return Ok(Value::Null),
                Value::String(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => return Err(invalid()),
            };
            if method == "len" {
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            } else {
                Ok(Value::Bool(len == 0))
            }
        }
        other => Err(EvalError::UnsupportedMethod(other.to_string())),
    }
}
