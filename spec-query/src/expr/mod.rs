//! Predicate expressions
//!
//! Filters are represented as trees ([`Expr`]) bound to a single parameter
//! ([`ParamId`]) and typed by the entity they test ([`Predicate<T>`]). Trees
//! stay inspectable after composition, which lets a store translate them and
//! lets the in-process [`Interpreter`] evaluate them.

mod combine;
mod eval;
mod node;
mod predicate;
mod rewrite;
mod value;

pub use combine::combine;
pub use eval::{EvalError, Interpreter};
pub use node::{ArithOp, CompareOp, Expr, IntoExpr, LogicalOp, ParamId};
pub use predicate::Predicate;
pub use rewrite::{replace_parameter, ExprRewriter, ParameterReplacer};
pub use value::Value;
